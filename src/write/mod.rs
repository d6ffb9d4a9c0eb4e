//! The archive writer abstraction and its three backends.
//!
//! Every backend implements [`ArchiveWriter`]: entries are added one at a
//! time through [`ArchiveWriter::add_entry`] and the archive is finalised by
//! a single consuming [`ArchiveWriter::close`]. Backends are picked once, at
//! open time:
//!
//! ```rust,no_run
//! use archslip::{ContainerFormat, CompressionMethod, EntryDescriptor, OpenMode};
//!
//! let mut writer = archslip::open(
//!     "payload.tar.gz",
//!     ContainerFormat::Tar,
//!     CompressionMethod::Deflate,
//!     OpenMode::Write,
//! )?;
//! writer.add(&EntryDescriptor::regular("../../../tmp/owned", b"hi".to_vec()))?;
//! writer.add(&EntryDescriptor::symlink("innocent", "/etc/passwd"))?;
//! let summary = writer.close()?;
//! println!("wrote {} entries", summary.entries_written);
//! # Ok::<(), archslip::Error>(())
//! ```

mod sevenz;
mod tar;
mod zip;

pub use sevenz::{SevenZipEntry, SevenZipWriter, read_sevenz_entries, read_sevenz_entry_data};
pub use tar::{TarEntry, TarWriter, read_tar_entries};
pub use zip::{
    CentralDirectory, CentralRecord, EndOfCentralDirectory, ZipWriter, read_central_directory,
    read_zip_entry_data,
};

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Cursor, Seek, Write};
use std::path::Path;

use crate::{
    ArchiveType, CompressionCatalog, CompressionMethod, ContainerFormat, EntryDescriptor,
    EntryHeader, Error, Result, Timestamp,
};

/// How [`open`] treats the backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create the file, truncating any existing content.
    Write,
    /// Reuse an existing archive and add entries after its members.
    Append,
}

/// Result of finalising an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    /// Container written.
    pub format: ContainerFormat,
    /// Compression applied to new entries.
    pub compression: CompressionMethod,
    /// Entries added through this writer (symlinks included).
    pub entries_written: usize,
    /// Symlink entries among them.
    pub symlinks_written: usize,
    /// Every member name in archive order, preserved members first.
    pub members: Vec<String>,
    /// Final archive size in bytes.
    pub archive_size: u64,
}

/// Capability set shared by the zip, tar and 7z writers.
pub trait ArchiveWriter {
    /// Returns the container being written.
    fn format(&self) -> ContainerFormat;

    /// Returns the compression applied to new entries.
    fn compression(&self) -> CompressionMethod;

    /// Builds the metadata record for an entry.
    ///
    /// A missing timestamp becomes the current time. Future and past
    /// instants are accepted as given.
    fn make_entry_header(&self, name: &str, timestamp: Option<Timestamp>) -> EntryHeader {
        EntryHeader::new(name, timestamp)
    }

    /// Writes one entry.
    ///
    /// For regular entries `content` is the member payload. For symlinks it
    /// is the link target.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`](crate::Error::Encoding) if the codec or
    /// header encoding fails; the writer is then poisoned and later calls
    /// return [`Error::WriterAborted`](crate::Error::WriterAborted).
    fn add_entry(&mut self, header: EntryHeader, content: &[u8], as_symlink: bool) -> Result<()>;

    /// Writes an entry described by an [`EntryDescriptor`].
    fn add(&mut self, entry: &EntryDescriptor) -> Result<()> {
        let mut header = self.make_entry_header(&entry.name, entry.timestamp);
        header.mode = entry.mode;
        self.add_entry(header, &entry.content, entry.is_symlink())
    }

    /// Returns every member name written so far, preserved members first.
    fn list_members(&self) -> Vec<String>;

    /// Writes the footer or directory and releases the backing file.
    fn close(self: Box<Self>) -> Result<WriteSummary>;
}

/// Opens a writer on `path`.
///
/// `archive_type` accepts either an [`ArchiveType`] (the zip aliases all
/// open a zip writer) or a [`ContainerFormat`]. Unsupported compression
/// requests fall back to the container default.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if the file cannot be opened and,
/// in append mode, [`Error::InvalidFormat`](crate::Error::InvalidFormat) if
/// the existing file is not a well-formed archive of `format`.
pub fn open(
    path: impl AsRef<Path>,
    archive_type: impl Into<ArchiveType>,
    compression: CompressionMethod,
    mode: OpenMode,
) -> Result<Box<dyn ArchiveWriter>> {
    let path = path.as_ref();
    let format = archive_type.into().container();
    let compression = CompressionCatalog::resolve(format, compression);
    log::debug!(
        "opening {} ({format}, {compression}, {mode:?})",
        path.display()
    );
    let writer: Box<dyn ArchiveWriter> = match mode {
        OpenMode::Write => {
            let sink = BufWriter::new(File::create(path)?);
            match format {
                ContainerFormat::Zip => Box::new(ZipWriter::new(sink, compression)?),
                ContainerFormat::Tar => Box::new(TarWriter::new(sink, compression)?),
                ContainerFormat::SevenZip => Box::new(SevenZipWriter::new(sink, compression)?),
            }
        }
        OpenMode::Append => open_append(path, format, Some(compression))?,
    };
    Ok(writer)
}

/// Opens an existing archive for appending.
///
/// With `compression` set to `None`, zip archives keep the method of their
/// first member and 7z archives use LZMA2. Tar archives are always
/// continued uncompressed.
pub(crate) fn open_append(
    path: &Path,
    format: ContainerFormat,
    compression: Option<CompressionMethod>,
) -> Result<Box<dyn ArchiveWriter>> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    let writer: Box<dyn ArchiveWriter> = match format {
        ContainerFormat::Zip => Box::new(ZipWriter::open_append(file, compression)?),
        ContainerFormat::Tar => Box::new(TarWriter::open_append(file)?),
        ContainerFormat::SevenZip => Box::new(SevenZipWriter::open_append(file, compression)?),
    };
    Ok(writer)
}

/// A seekable sink that can drop stale bytes past the final write position.
///
/// Appending can leave the new archive shorter than the old one (a smaller
/// 7z header, a shorter tar trailer), so the writers truncate on close.
pub trait ArchiveSink: Write + Seek {
    /// Flushes, truncates at the current position and returns it.
    fn truncate_here(&mut self) -> io::Result<u64>;
}

impl ArchiveSink for File {
    fn truncate_here(&mut self) -> io::Result<u64> {
        self.flush()?;
        let pos = self.stream_position()?;
        self.set_len(pos)?;
        Ok(pos)
    }
}

impl ArchiveSink for BufWriter<File> {
    fn truncate_here(&mut self) -> io::Result<u64> {
        self.flush()?;
        let pos = self.stream_position()?;
        self.get_ref().set_len(pos)?;
        Ok(pos)
    }
}

impl ArchiveSink for Cursor<Vec<u8>> {
    fn truncate_here(&mut self) -> io::Result<u64> {
        let pos = self.position();
        self.get_mut().truncate(pos as usize);
        Ok(pos)
    }
}

/// Poisoning state shared by the writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriterState {
    AcceptingEntries,
    Aborted,
}

impl WriterState {
    pub(crate) fn ensure_accepting(self) -> Result<()> {
        match self {
            WriterState::AcceptingEntries => Ok(()),
            WriterState::Aborted => Err(Error::WriterAborted),
        }
    }
}

/// Wraps a codec or header failure for `entry`.
///
/// Missing codecs and unsupported features keep their own variants.
pub(crate) fn entry_failure(entry: &str, err: Error) -> Error {
    match err {
        Error::CodecUnavailable { .. } | Error::UnsupportedFeature { .. } | Error::Encoding { .. } => {
            err
        }
        other => Error::encoding(entry, other),
    }
}

/// Member names and counters kept by every writer.
#[derive(Debug, Clone, Default)]
pub(crate) struct MemberLog {
    names: Vec<String>,
    entries_written: usize,
    symlinks_written: usize,
}

impl MemberLog {
    pub(crate) fn with_existing(names: Vec<String>) -> Self {
        Self {
            names,
            ..Default::default()
        }
    }

    pub(crate) fn record(&mut self, name: &str, as_symlink: bool) {
        self.names.push(name.to_string());
        self.entries_written += 1;
        if as_symlink {
            self.symlinks_written += 1;
        }
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.names.clone()
    }

    pub(crate) fn summary(
        self,
        format: ContainerFormat,
        compression: CompressionMethod,
        archive_size: u64,
    ) -> WriteSummary {
        log::info!(
            "finalised {format} archive: {} new entries ({} symlinks), {} members, {archive_size} bytes",
            self.entries_written,
            self.symlinks_written,
            self.names.len()
        );
        WriteSummary {
            format,
            compression,
            entries_written: self.entries_written,
            symlinks_written: self.symlinks_written,
            members: self.names,
            archive_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_falls_back_to_default_compression() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.zip");
        let writer = open(
            &path,
            ContainerFormat::Zip,
            CompressionMethod::Lzma2,
            OpenMode::Write,
        )
        .unwrap();
        assert_eq!(writer.compression(), CompressionMethod::Deflate);
        assert_eq!(writer.format(), ContainerFormat::Zip);
        writer.close().unwrap();
    }

    #[test]
    fn test_append_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = match open(
            dir.path().join("missing.tar"),
            ContainerFormat::Tar,
            CompressionMethod::None,
            OpenMode::Append,
        ) {
            Err(err) => err,
            Ok(_) => panic!("opened a missing archive"),
        };
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_cursor_sink_truncates() {
        let mut sink = Cursor::new(vec![1u8, 2, 3, 4]);
        sink.set_position(2);
        assert_eq!(sink.truncate_here().unwrap(), 2);
        assert_eq!(sink.into_inner(), vec![1, 2]);
    }

    #[test]
    fn test_member_log_counts() {
        let mut log = MemberLog::with_existing(vec!["old".into()]);
        log.record("a", false);
        log.record("b", true);
        assert_eq!(log.names(), vec!["old", "a", "b"]);
        let summary = log.summary(ContainerFormat::Tar, CompressionMethod::None, 10);
        assert_eq!(summary.entries_written, 2);
        assert_eq!(summary.symlinks_written, 1);
        assert_eq!(summary.members.len(), 3);
    }

    #[test]
    fn test_aborted_state() {
        assert!(WriterState::AcceptingEntries.ensure_accepting().is_ok());
        assert!(matches!(
            WriterState::Aborted.ensure_accepting(),
            Err(Error::WriterAborted)
        ));
    }
}
