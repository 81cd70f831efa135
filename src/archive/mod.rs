//! Build-context archives.
//!
//! [`build_context`] writes a tar archive to a temporary file by running a
//! sequence of [`ContentProvider`]s against it. The finished
//! [`BuildContext`] removes the file when dropped unless it is kept.

mod entries;

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tracing::debug;

pub use entries::{ContextArchive, DataEntry, FileEntry};

use crate::error::{ArchiveError, Result};

/// Something that can add entries to a build-context archive.
///
/// Closures of the form `Fn(&mut ContextArchive) -> io::Result<()>` are
/// providers too.
pub trait ContentProvider {
    /// Append this provider's entries.
    ///
    /// # Errors
    ///
    /// Returns the I/O error that stopped the provider. The archive is then
    /// abandoned.
    fn provide(&self, archive: &mut ContextArchive) -> io::Result<()>;
}

impl<F> ContentProvider for F
where
    F: Fn(&mut ContextArchive) -> io::Result<()>,
{
    fn provide(&self, archive: &mut ContextArchive) -> io::Result<()> {
        self(archive)
    }
}

/// A finished tar archive in a temporary file.
#[derive(Debug)]
pub struct BuildContext {
    path: TempPath,
}

impl BuildContext {
    /// Location of the archive on disk.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stop deleting the archive on drop and return its path.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::FinalizeFailed` if the file cannot be
    /// persisted.
    pub fn keep(self) -> Result<PathBuf> {
        self.path.keep().map_err(|e| {
            ArchiveError::FinalizeFailed {
                path: e.path.to_path_buf(),
                message: e.error.to_string(),
            }
            .into()
        })
    }
}

/// Write a tar archive from `providers`, in order, to a temporary file.
///
/// The first failing provider stops the build. On every error path the
/// archive writer is closed and the temporary file removed.
///
/// # Errors
///
/// Returns `ArchiveError::CreateFailed` if the temporary file cannot be
/// created, `ArchiveError::ProviderFailed` naming the first provider that
/// fails, and `ArchiveError::FinalizeFailed` if the archive cannot be
/// completed.
pub fn build_context(providers: &[&dyn ContentProvider]) -> Result<BuildContext> {
    build_context_in(&std::env::temp_dir(), providers)
}

fn build_context_in(dir: &Path, providers: &[&dyn ContentProvider]) -> Result<BuildContext> {
    let file = tempfile::Builder::new()
        .prefix("dockhand-context-")
        .suffix(".tar")
        .tempfile_in(dir)
        .map_err(|e| ArchiveError::CreateFailed {
            message: e.to_string(),
        })?;
    let (handle, path) = file.into_parts();
    let mut archive = ContextArchive::new(handle);

    for (index, provider) in providers.iter().enumerate() {
        provider
            .provide(&mut archive)
            .map_err(|e| ArchiveError::ProviderFailed {
                index,
                message: e.to_string(),
            })?;
    }

    let finalize_failed = |e: io::Error| ArchiveError::FinalizeFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let written = archive.finish().map_err(finalize_failed)?;
    written.sync_all().map_err(finalize_failed)?;
    drop(written);

    debug!(path = %path.display(), providers = providers.len(), "build context written");
    Ok(BuildContext { path })
}
