//! Tar entry writers used by content providers.

use std::fs::File;
use std::io::{self, Read};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::Metadata;
use cap_std::fs_utf8::Dir;
use tar::{Builder, EntryType, Header};

use super::ContentProvider;

const DEFAULT_FILE_MODE: u32 = 0o644;

/// An open build-context archive that providers append entries to.
pub struct ContextArchive {
    builder: Builder<File>,
}

impl std::fmt::Debug for ContextArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextArchive").finish_non_exhaustive()
    }
}

impl ContextArchive {
    pub(super) fn new(file: File) -> Self {
        Self {
            builder: Builder::new(file),
        }
    }

    /// Append `size` bytes read from `reader` as a regular file `name`.
    ///
    /// # Errors
    ///
    /// Returns any error from reading `reader` or writing the archive,
    /// including when `reader` holds fewer than `size` bytes.
    pub fn append_reader<R: Read>(
        &mut self,
        name: &str,
        size: u64,
        mode: u32,
        reader: R,
    ) -> io::Result<()> {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(size);
        header.set_mode(mode);
        header.set_cksum();

        self.builder
            .append_data(&mut header, normalize_archive_path(name), reader)
    }

    /// Append in-memory `data` as a regular file `name` with mode `0644`.
    ///
    /// # Errors
    ///
    /// Returns any error from writing the archive.
    pub fn append_bytes(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        let size = u64::try_from(data.len()).unwrap_or(u64::MAX);
        self.append_reader(name, size, DEFAULT_FILE_MODE, data)
    }

    /// Append the host file at `source` under `name`.
    ///
    /// The file is opened through a capability on its parent directory. On
    /// Unix its permission bits are preserved.
    ///
    /// # Errors
    ///
    /// Returns any error from opening or reading `source`, or from writing
    /// the archive.
    pub fn append_file(&mut self, name: &str, source: &Utf8Path) -> io::Result<()> {
        let parent = source
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let file_name = source.file_name().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{source}' does not name a file"),
            )
        })?;

        let dir = Dir::open_ambient_dir(parent, ambient_authority())?;
        let metadata = dir.metadata(file_name)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{source}' is not a regular file"),
            ));
        }
        let file = dir.open(file_name)?;

        self.append_reader(
            name,
            metadata.len(),
            metadata_mode(&metadata, DEFAULT_FILE_MODE),
            file,
        )
    }

    pub(super) fn finish(self) -> io::Result<File> {
        self.builder.into_inner()
    }
}

/// A host file placed in the archive under a chosen name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    source: Utf8PathBuf,
    archive_name: String,
}

impl FileEntry {
    /// Copy `source` into the archive as `archive_name`.
    #[must_use]
    pub fn new(source: impl Into<Utf8PathBuf>, archive_name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            archive_name: archive_name.into(),
        }
    }

    /// Copy `source` into the archive root under its own file name.
    ///
    /// Paths without a file name fall back to the full path.
    #[must_use]
    pub fn at_basename(path: impl Into<Utf8PathBuf>) -> Self {
        let source = path.into();
        let archive_name = source.file_name().unwrap_or(source.as_str()).to_owned();
        Self {
            source,
            archive_name,
        }
    }

    /// The name this entry takes inside the archive.
    #[must_use]
    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }
}

impl ContentProvider for FileEntry {
    fn provide(&self, archive: &mut ContextArchive) -> io::Result<()> {
        archive.append_file(&self.archive_name, &self.source)
    }
}

/// In-memory bytes placed in the archive as a regular file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEntry {
    archive_name: String,
    data: Vec<u8>,
}

impl DataEntry {
    /// Store `data` in the archive as `archive_name`.
    #[must_use]
    pub fn new(archive_name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            archive_name: archive_name.into(),
            data: data.into(),
        }
    }
}

impl ContentProvider for DataEntry {
    fn provide(&self, archive: &mut ContextArchive) -> io::Result<()> {
        archive.append_bytes(&self.archive_name, &self.data)
    }
}

fn normalize_archive_path(name: &str) -> String {
    name.replace('\\', "/")
}

#[cfg(unix)]
fn metadata_mode(metadata: &Metadata, _fallback: u32) -> u32 {
    use cap_std::fs::PermissionsExt;

    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn metadata_mode(_metadata: &Metadata, fallback: u32) -> u32 {
    fallback
}
