//! Cloning an existing archive for further appends.
//!
//! The source is copied byte for byte, its timestamps are carried over and
//! the copy is reopened with the writer matching its detected container.

use std::fs;
use std::path::Path;

use filetime::FileTime;

use crate::format::detect::detect_format;
use crate::write::{ArchiveWriter, open_append};
use crate::{CompressionMethod, ContainerFormat, Error, Result};

/// Copies archives and reopens the copy in append mode.
#[derive(Debug, Default)]
pub struct ArchiveCloner;

impl ArchiveCloner {
    /// Clones `source` to `dest` and returns a writer appending to `dest`.
    ///
    /// Zip copies keep the compression of their first member, 7z copies use
    /// LZMA2 for new members and tar copies are continued uncompressed.
    ///
    /// # Errors
    ///
    /// See [`ArchiveCloner::clone_with`].
    pub fn clone(source: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<Box<dyn ArchiveWriter>> {
        Self::clone_with(source, dest, None)
    }

    /// Clones `source` to `dest`, steering new zip and 7z members to
    /// `compression` when it is given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CloneSourceInvalid`] if `source` is not a recognised
    /// or well-formed archive, [`Error::Validation`] if `source` and `dest`
    /// are the same file and [`Error::Io`] if the copy fails. The
    /// destination is removed before any error after the copy is returned.
    pub fn clone_with(
        source: impl AsRef<Path>,
        dest: impl AsRef<Path>,
        compression: Option<CompressionMethod>,
    ) -> Result<Box<dyn ArchiveWriter>> {
        let source = source.as_ref();
        let dest = dest.as_ref();

        let format = detect_format(source)?
            .ok_or_else(|| Error::clone_source(source, "unrecognised archive container"))?;
        if same_file(source, dest) {
            return Err(Error::Validation(format!(
                "clone destination {} is the source archive",
                dest.display()
            )));
        }
        let compression = match format {
            ContainerFormat::Tar => {
                if compression.is_some() {
                    log::warn!("tar clones are continued uncompressed; ignoring compression");
                }
                None
            }
            ContainerFormat::Zip | ContainerFormat::SevenZip => compression,
        };

        match copy_and_open(source, dest, format, compression) {
            Ok(writer) => {
                log::info!(
                    "cloned {} ({format}) to {}, appending with {}",
                    source.display(),
                    dest.display(),
                    writer.compression()
                );
                Ok(writer)
            }
            Err(err) => {
                match fs::remove_file(dest) {
                    Err(remove_err) if remove_err.kind() != std::io::ErrorKind::NotFound => {
                        log::warn!("failed to remove {}: {remove_err}", dest.display());
                    }
                    _ => {}
                }
                Err(match err {
                    Error::InvalidFormat(reason) => Error::clone_source(source, reason),
                    other => other,
                })
            }
        }
    }
}

fn copy_and_open(
    source: &Path,
    dest: &Path,
    format: ContainerFormat,
    compression: Option<CompressionMethod>,
) -> Result<Box<dyn ArchiveWriter>> {
    let copied = fs::copy(source, dest)?;
    log::debug!("copied {copied} bytes from {}", source.display());

    let metadata = fs::metadata(source)?;
    filetime::set_file_times(
        dest,
        FileTime::from_last_access_time(&metadata),
        FileTime::from_last_modification_time(&metadata),
    )?;

    open_append(dest, format, compression)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
