//! Tar writer.
//!
//! Headers are ustar with PAX extensions. Compression wraps the whole tar
//! stream (gzip, bzip2 or xz) rather than individual members, so appending
//! is only possible on plain archives.

mod header;

pub use header::TarEntry;

use std::io::{self, BufReader, Read, SeekFrom, Write};

use header::{BLOCK_SIZE, RECORD_SIZE, TYPE_REGULAR, TYPE_SYMLINK, UstarHeader, padding};

use super::{ArchiveSink, ArchiveWriter, MemberLog, WriteSummary, WriterState, entry_failure};
use crate::catalog::TarWrapper;
use crate::codec::CodecOptions;
use crate::entry::unix_mode;
use crate::{
    CompressionCatalog, CompressionMethod, ContainerFormat, EntryHeader, Error, Result,
};

/// Owner name forced onto symlink headers.
const SYMLINK_OWNER: &str = "root";

/// The output stream, optionally behind a compressor.
enum TarSink<W: Write> {
    Plain(W),
    #[cfg(feature = "deflate")]
    Gzip(flate2::write::GzEncoder<W>),
    #[cfg(feature = "bzip2")]
    Bzip2(bzip2::write::BzEncoder<W>),
    #[cfg(feature = "xz")]
    Xz(xz2::write::XzEncoder<W>),
}

impl<W: Write> TarSink<W> {
    #[allow(unused_variables)]
    fn new(sink: W, compression: CompressionMethod, options: &CodecOptions) -> Result<Self> {
        match compression.tar_wrapper() {
            Some(TarWrapper::None) | None => Ok(TarSink::Plain(sink)),
            #[cfg(feature = "deflate")]
            Some(TarWrapper::Gzip) => Ok(TarSink::Gzip(flate2::write::GzEncoder::new(
                sink,
                flate2::Compression::new(options.deflate_level.min(9)),
            ))),
            #[cfg(feature = "bzip2")]
            Some(TarWrapper::Bzip2) => Ok(TarSink::Bzip2(bzip2::write::BzEncoder::new(
                sink,
                bzip2::Compression::new(options.bzip2_level.clamp(1, 9)),
            ))),
            #[cfg(feature = "xz")]
            Some(TarWrapper::Xz) => Ok(TarSink::Xz(xz2::write::XzEncoder::new(
                sink,
                options.lzma_preset.min(9),
            ))),
            #[allow(unreachable_patterns)]
            _ => Err(Error::CodecUnavailable {
                method: compression,
            }),
        }
    }

    fn finish(self) -> io::Result<W> {
        match self {
            TarSink::Plain(w) => Ok(w),
            #[cfg(feature = "deflate")]
            TarSink::Gzip(w) => w.finish(),
            #[cfg(feature = "bzip2")]
            TarSink::Bzip2(w) => w.finish(),
            #[cfg(feature = "xz")]
            TarSink::Xz(w) => w.finish(),
        }
    }
}

impl<W: Write> Write for TarSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TarSink::Plain(w) => w.write(buf),
            #[cfg(feature = "deflate")]
            TarSink::Gzip(w) => w.write(buf),
            #[cfg(feature = "bzip2")]
            TarSink::Bzip2(w) => w.write(buf),
            #[cfg(feature = "xz")]
            TarSink::Xz(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TarSink::Plain(w) => w.flush(),
            #[cfg(feature = "deflate")]
            TarSink::Gzip(w) => w.flush(),
            #[cfg(feature = "bzip2")]
            TarSink::Bzip2(w) => w.flush(),
            #[cfg(feature = "xz")]
            TarSink::Xz(w) => w.flush(),
        }
    }
}

/// Writes a tar archive, optionally compressed, to a seekable sink.
pub struct TarWriter<W: ArchiveSink> {
    sink: TarSink<W>,
    compression: CompressionMethod,
    /// Uncompressed tar bytes written so far, including preserved members.
    position: u64,
    members: MemberLog,
    state: WriterState,
}

impl<W: ArchiveSink> TarWriter<W> {
    /// Starts a new archive.
    ///
    /// `compression` selects the outer stream: none, gzip (deflate), bzip2
    /// or xz (lzma). Other methods fall back to gzip.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CodecUnavailable`] if the wrapper's codec is
    /// compiled out.
    pub fn new(sink: W, compression: CompressionMethod) -> Result<Self> {
        Self::with_options(sink, compression, &CodecOptions::default())
    }

    /// Starts a new archive with explicit codec tuning.
    pub fn with_options(
        sink: W,
        compression: CompressionMethod,
        options: &CodecOptions,
    ) -> Result<Self> {
        let compression = CompressionCatalog::resolve(ContainerFormat::Tar, compression);
        Ok(Self {
            sink: TarSink::new(sink, compression, options)?,
            compression,
            position: 0,
            members: MemberLog::default(),
            state: WriterState::AcceptingEntries,
        })
    }

    /// Writes the end-of-archive marker, pads the final record and returns
    /// the sink.
    pub fn finish_into_inner(mut self) -> Result<(WriteSummary, W)> {
        self.state.ensure_accepting()?;
        let end = self.position + 2 * BLOCK_SIZE as u64;
        let padded = end.div_ceil(RECORD_SIZE) * RECORD_SIZE;
        let trailer = vec![0u8; (padded - self.position) as usize];
        self.sink.write_all(&trailer)?;
        let mut sink = self.sink.finish()?;
        let archive_size = sink.truncate_here()?;
        let summary = self
            .members
            .summary(ContainerFormat::Tar, self.compression, archive_size);
        Ok((summary, sink))
    }

    fn write_entry(&mut self, header: &EntryHeader, content: &[u8], as_symlink: bool) -> Result<()> {
        let mode = header.unix_mode(as_symlink) & unix_mode::PERMISSIONS;
        let mtime = header.timestamp.as_tar_mtime();
        let ustar = if as_symlink {
            UstarHeader {
                name: header.name.as_bytes().to_vec(),
                mode,
                uid: 0,
                gid: 0,
                size: 0,
                mtime,
                typeflag: TYPE_SYMLINK,
                linkname: content.to_vec(),
                uname: SYMLINK_OWNER,
                gname: SYMLINK_OWNER,
            }
        } else {
            UstarHeader {
                name: header.name.as_bytes().to_vec(),
                mode,
                uid: 0,
                gid: 0,
                size: content.len() as u64,
                mtime,
                typeflag: TYPE_REGULAR,
                linkname: Vec::new(),
                uname: "",
                gname: "",
            }
        };

        let mut out = ustar.encode();
        if !as_symlink {
            out.extend_from_slice(content);
            out.resize(out.len() + padding(content.len() as u64), 0);
        }
        self.sink.write_all(&out)?;
        self.position += out.len() as u64;
        log::debug!(
            "tar: {} '{}' ({} bytes)",
            if as_symlink { "symlink" } else { "file" },
            header.name,
            ustar.size
        );
        Ok(())
    }
}

impl<W: ArchiveSink + Read> TarWriter<W> {
    /// Continues a plain tar archive after its last member.
    ///
    /// The old end-of-archive marker is overwritten and the archive stays
    /// uncompressed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if the headers cannot be walked.
    pub fn open_append(mut sink: W) -> Result<Self> {
        sink.seek(SeekFrom::Start(0))?;
        let scanned = header::scan(&mut BufReader::new(&mut sink), false)?;
        sink.seek(SeekFrom::Start(scanned.end_offset))?;
        let names = scanned.entries.into_iter().map(|e| e.name).collect::<Vec<_>>();
        log::debug!(
            "tar: appending after {} members at offset {}",
            names.len(),
            scanned.end_offset
        );
        Ok(Self {
            sink: TarSink::Plain(sink),
            compression: CompressionMethod::None,
            position: scanned.end_offset,
            members: MemberLog::with_existing(names),
            state: WriterState::AcceptingEntries,
        })
    }
}

impl<W: ArchiveSink> ArchiveWriter for TarWriter<W> {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Tar
    }

    fn compression(&self) -> CompressionMethod {
        self.compression
    }

    fn add_entry(&mut self, header: EntryHeader, content: &[u8], as_symlink: bool) -> Result<()> {
        self.state.ensure_accepting()?;
        match self.write_entry(&header, content, as_symlink) {
            Ok(()) => {
                self.members.record(&header.name, as_symlink);
                Ok(())
            }
            Err(err) => {
                self.state = WriterState::Aborted;
                Err(entry_failure(&header.name, err))
            }
        }
    }

    fn list_members(&self) -> Vec<String> {
        self.members.names()
    }

    fn close(self: Box<Self>) -> Result<WriteSummary> {
        let (summary, _sink) = (*self).finish_into_inner()?;
        Ok(summary)
    }
}

/// Lists the members of a plain tar stream, data included.
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] if the headers cannot be walked.
pub fn read_tar_entries<R: Read>(r: R) -> Result<Vec<TarEntry>> {
    let mut reader = BufReader::new(r);
    Ok(header::scan(&mut reader, true)?.entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::detect::detect_format_from_bytes;
    use crate::{EntryDescriptor, Timestamp};
    use std::io::Cursor;

    fn build(compression: CompressionMethod, entries: &[EntryDescriptor]) -> Vec<u8> {
        let mut writer = TarWriter::new(Cursor::new(Vec::new()), compression).unwrap();
        for entry in entries {
            writer.add(entry).unwrap();
        }
        let (_, sink) = writer.finish_into_inner().unwrap();
        sink.into_inner()
    }

    #[test]
    fn test_empty_archive_is_one_zero_record() {
        let bytes = build(CompressionMethod::None, &[]);
        assert_eq!(bytes.len(), RECORD_SIZE as usize);
        assert!(bytes.iter().all(|&b| b == 0));
        assert_eq!(detect_format_from_bytes(&bytes), Some(ContainerFormat::Tar));
    }

    #[test]
    fn test_regular_entry_fields() {
        let ts = Timestamp::from_unix_secs(1_234_567_890).unwrap();
        let bytes = build(
            CompressionMethod::None,
            &[EntryDescriptor::regular("../../x", b"hello".to_vec())
                .with_timestamp(ts)
                .with_mode(0o4755)],
        );
        let entries = read_tar_entries(Cursor::new(&bytes)).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.name, "../../x");
        assert_eq!(entry.entry_type, TYPE_REGULAR);
        assert_eq!(entry.mode, 0o4755);
        assert_eq!(entry.mtime, 1_234_567_890);
        assert_eq!((entry.uid, entry.gid), (0, 0));
        assert_eq!(entry.uname, "");
        assert_eq!(entry.data, b"hello");
    }

    #[test]
    fn test_symlink_has_no_data_and_root_owner() {
        let bytes = build(
            CompressionMethod::None,
            &[
                EntryDescriptor::symlink("evil.symlink", "/etc/shadow"),
                EntryDescriptor::regular("after", b"z".to_vec()),
            ],
        );
        let entries = read_tar_entries(Cursor::new(&bytes)).unwrap();
        let link = &entries[0];
        assert!(link.is_symlink());
        assert_eq!(link.link_name.as_deref(), Some("/etc/shadow"));
        assert_eq!(link.size, 0);
        assert_eq!(link.mode, 0o777);
        assert_eq!((link.uname.as_str(), link.gname.as_str()), ("root", "root"));
        // The next header directly follows the symlink header.
        assert_eq!(&bytes[BLOCK_SIZE..BLOCK_SIZE + 5], b"after");
    }

    #[test]
    fn test_long_symlink_target_uses_pax() {
        let target = format!("{}etc/passwd", "../".repeat(50));
        let bytes = build(
            CompressionMethod::None,
            &[EntryDescriptor::symlink("l", target.clone())],
        );
        let entries = read_tar_entries(Cursor::new(&bytes)).unwrap();
        assert_eq!(entries[0].link_name.as_deref(), Some(target.as_str()));
    }

    #[test]
    #[cfg(feature = "deflate")]
    fn test_gzip_wrapper() {
        let bytes = build(
            CompressionMethod::Deflate,
            &[EntryDescriptor::regular("a", b"abc".to_vec())],
        );
        assert_eq!(&bytes[..2], &[0x1F, 0x8B]);
        let entries = read_tar_entries(flate2::read::GzDecoder::new(Cursor::new(bytes))).unwrap();
        assert_eq!(entries[0].data, b"abc");
    }

    #[test]
    fn test_append_continues_after_last_member() {
        let original = build(
            CompressionMethod::None,
            &[EntryDescriptor::regular("first", b"1".to_vec())],
        );
        let mut writer = TarWriter::open_append(Cursor::new(original.clone())).unwrap();
        assert_eq!(writer.compression(), CompressionMethod::None);
        writer
            .add(&EntryDescriptor::symlink("second", "/tmp"))
            .unwrap();
        assert_eq!(writer.list_members(), vec!["first", "second"]);
        let (summary, sink) = writer.finish_into_inner().unwrap();
        assert_eq!(summary.entries_written, 1);

        let bytes = sink.into_inner();
        assert_eq!(bytes.len() as u64 % RECORD_SIZE, 0);
        assert_eq!(&bytes[..2 * BLOCK_SIZE], &original[..2 * BLOCK_SIZE]);
        let entries = read_tar_entries(Cursor::new(&bytes)).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn test_append_rejects_garbage() {
        let err = TarWriter::open_append(Cursor::new(vec![0x41u8; 600])).err().unwrap();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }
}
