//! Progress events emitted by the engine during pulls and builds.

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use crate::error::{Result, StreamError};
use crate::image::ImageReference;

/// One progress message from an image pull.
///
/// The engine repeats the same status for each layer update; every message
/// is delivered as received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullEvent {
    /// Human-readable status, such as `Downloading` or `Pull complete`.
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,

    /// Error text reported by the engine, empty when the step succeeded.
    #[serde(default, deserialize_with = "null_as_default")]
    pub error: String,

    /// Pre-rendered progress bar.
    #[serde(default, deserialize_with = "null_as_default")]
    pub progress: String,

    /// Byte counts for the current layer.
    #[serde(
        default,
        rename = "progressDetail",
        deserialize_with = "null_as_default"
    )]
    pub progress_detail: ProgressDetail,
}

/// Byte counters attached to a [`PullEvent`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressDetail {
    /// Bytes transferred so far.
    #[serde(default, deserialize_with = "null_as_default")]
    pub current: i64,

    /// Total bytes expected.
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: i64,
}

/// One log line from an image build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEvent {
    /// Output text, usually ending in a newline.
    #[serde(default, deserialize_with = "null_as_default")]
    pub stream: String,

    /// Error text reported by the engine, empty while the build succeeds.
    #[serde(default, deserialize_with = "null_as_default")]
    pub error: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Log a pull event's status and progress at `info`.
///
/// Events with neither a status nor a progress bar are ignored. Suitable
/// for passing straight to [`EngineClient::pull`](crate::engine::EngineClient::pull).
///
/// # Errors
///
/// Returns `StreamError::RequestFailed` carrying the engine's text when the
/// event reports an error, which ends the pull.
pub fn log_pull_event(image: &ImageReference, event: &PullEvent) -> Result<()> {
    if !event.error.is_empty() {
        warn!(image = %image.short_name(), error = %event.error, "engine reported a failed pull");
        return Err(reported_failure("pull", &event.error));
    }
    if event.status.is_empty() && event.progress.is_empty() {
        return Ok(());
    }
    let line = format!("{} {}", event.status, event.progress);
    info!(image = %image.short_name(), "{}", line.trim());
    Ok(())
}

/// Log a build event's output at `info`, skipping blank lines.
///
/// # Errors
///
/// Returns `StreamError::RequestFailed` carrying the engine's text when the
/// event reports an error, which ends the build.
pub fn log_build_event(event: &BuildEvent) -> Result<()> {
    if !event.error.is_empty() {
        warn!(error = %event.error, "engine reported a failed build");
        return Err(reported_failure("build", &event.error));
    }
    let output = event.stream.trim();
    if !output.is_empty() {
        info!("{output}");
    }
    Ok(())
}

fn reported_failure(operation: &str, message: &str) -> crate::error::DockhandError {
    StreamError::RequestFailed {
        operation: operation.to_owned(),
        message: message.to_owned(),
    }
    .into()
}
