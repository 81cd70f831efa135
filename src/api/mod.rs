//! Orchestration API for dockhand commands.
//!
//! These functions hold the logic behind each CLI subcommand so that it is
//! available to library embedders too. They accept library-owned types (not
//! clap types) and never print to stdout or stderr; progress goes through
//! `tracing`.

use camino::Utf8PathBuf;
use tracing::info;

use crate::archive::{ContentProvider, FileEntry, build_context};
use crate::engine::{BuildOptions, EngineClient, ImageEngine, PullOptions, Transport};
use crate::error::Result;
use crate::image::ImageReference;
use crate::stream::{log_build_event, log_pull_event};

/// What `dockhand version` reports about the resolved engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSummary {
    /// `"local"` or `"remote"`.
    pub kind: &'static str,
    /// The probed API version of a remote engine.
    pub api_version: Option<String>,
    /// The remote engine's base URL.
    pub endpoint: Option<String>,
}

/// Summarise a resolved transport.
#[must_use]
pub fn describe_transport(transport: &Transport) -> TransportSummary {
    let endpoint = match transport {
        Transport::Local(_) => None,
        Transport::Remote(remote) => Some(remote.base_url().to_owned()),
    };
    TransportSummary {
        kind: transport.kind(),
        api_version: transport.api_version().map(String::from),
        endpoint,
    }
}

/// Pull `image`, logging progress, and return the number of events seen.
///
/// # Errors
///
/// Returns the client's pull errors, and `StreamError::RequestFailed` when
/// the engine reports a failure partway through the pull.
pub async fn pull_image<E: ImageEngine>(
    client: &EngineClient<E>,
    image: &ImageReference,
    options: &PullOptions,
) -> Result<usize> {
    let mut events = 0_usize;
    client
        .pull_with_options(image, options, |reference, event| {
            events += 1;
            log_pull_event(reference, event)
        })
        .await?;
    info!(image = %image, events, "pull finished");
    Ok(events)
}

/// Build an image from host `files`, each placed at the context root under
/// its own file name, and return the number of events seen.
///
/// The temporary build context is removed before this returns.
///
/// # Errors
///
/// Returns archive errors if a file cannot be added, the client's build
/// errors, and `StreamError::RequestFailed` when the engine reports a
/// failed build step.
pub async fn build_image<E: ImageEngine>(
    client: &EngineClient<E>,
    files: &[Utf8PathBuf],
    options: &BuildOptions,
) -> Result<usize> {
    let context = {
        let entries: Vec<FileEntry> = files.iter().cloned().map(FileEntry::at_basename).collect();
        let providers: Vec<&dyn ContentProvider> = entries
            .iter()
            .map(|entry| entry as &dyn ContentProvider)
            .collect();
        build_context(&providers)?
    };

    let mut events = 0_usize;
    client
        .build_archive(context.path(), options, |event| {
            events += 1;
            log_build_event(event)
        })
        .await?;
    info!(tags = ?options.tags, events, "build finished");
    Ok(events)
}
