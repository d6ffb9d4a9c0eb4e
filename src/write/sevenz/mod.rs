//! 7z writer.
//!
//! Every non-empty entry gets its own single-coder folder, so each member
//! can be decoded without touching its neighbours. Empty payloads are
//! recorded as empty-stream files. The header is written uncompressed after
//! the last packed stream and the signature header is patched on close.
//!
//! Appending parses the existing header (plain or LZMA-encoded), keeps its
//! folders and file records as found, writes new packed streams after the
//! old ones and replaces the header.

mod header;
mod parse;

use std::io::{Read, Seek, SeekFrom};

use header::{ArchiveModel, Coder, FileRecord};
use parse::StartHeader;

use super::{ArchiveSink, ArchiveWriter, MemberLog, WriteSummary, WriterState, entry_failure};
use crate::codec::{self, CodecOptions};
use crate::entry::unix_mode;
use crate::format::{SIGNATURE_HEADER_SIZE, attributes};
use crate::{
    CompressionCatalog, CompressionMethod, ContainerFormat, EntryHeader, Error, Result, Timestamp,
};

/// Writes 7z archives.
pub struct SevenZipWriter<W: ArchiveSink> {
    sink: W,
    compression: CompressionMethod,
    options: CodecOptions,
    model: ArchiveModel,
    members: MemberLog,
    state: WriterState,
}

impl<W: ArchiveSink> SevenZipWriter<W> {
    /// Starts a new archive at the beginning of `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the placeholder signature header cannot be
    /// written.
    pub fn new(mut sink: W, compression: CompressionMethod) -> Result<Self> {
        let compression = CompressionCatalog::resolve(ContainerFormat::SevenZip, compression);
        sink.seek(SeekFrom::Start(0))?;
        sink.write_all(&[0u8; SIGNATURE_HEADER_SIZE as usize])?;
        Ok(Self {
            sink,
            compression,
            options: CodecOptions::default(),
            model: ArchiveModel::default(),
            members: MemberLog::default(),
            state: WriterState::AcceptingEntries,
        })
    }

    /// Replaces the codec tuning applied to new entries.
    pub fn codec_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    /// Writes the header, patches the signature header and returns the
    /// summary with the sink.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriterAborted`] if an earlier entry failed and
    /// [`Error::Io`] on write failures.
    pub fn finish_into_inner(mut self) -> Result<(WriteSummary, W)> {
        self.state.ensure_accepting()?;
        let header_offset = self.model.packed_end()?;
        self.sink
            .seek(SeekFrom::Start(SIGNATURE_HEADER_SIZE + header_offset))?;

        let start = if self.model.files.is_empty() && self.model.folders.is_empty() {
            StartHeader {
                next_header_offset: 0,
                next_header_size: 0,
                next_header_crc: 0,
            }
        } else {
            let header = self.model.encode();
            self.sink.write_all(&header)?;
            StartHeader {
                next_header_offset: header_offset,
                next_header_size: header.len() as u64,
                next_header_crc: crc32fast::hash(&header),
            }
        };
        let end = self.sink.stream_position()?;
        self.sink.seek(SeekFrom::Start(0))?;
        self.sink.write_all(&start.encode())?;
        self.sink.seek(SeekFrom::Start(end))?;
        let archive_size = self.sink.truncate_here()?;

        let summary = self
            .members
            .summary(ContainerFormat::SevenZip, self.compression, archive_size);
        Ok((summary, self.sink))
    }

    fn write_entry(&mut self, header: &EntryHeader, content: &[u8], as_symlink: bool) -> Result<()> {
        let mode = header.unix_mode(as_symlink);
        let record = FileRecord {
            name: header.name.clone(),
            has_stream: !content.is_empty(),
            attributes: Some(attributes::ARCHIVE | attributes::UNIX_EXTENSION | (mode << 16)),
            mtime: Some(header.timestamp.as_filetime()),
            ..Default::default()
        };

        if record.has_stream {
            let method_id = self
                .compression
                .sevenz_method_id()
                .ok_or(Error::UnsupportedFeature {
                    feature: "7z compression method",
                })?;
            let packed = codec::compress(self.compression, content, &self.options)?;
            let properties = codec::coder_properties(self.compression, &self.options);
            self.sink.write_all(&packed)?;
            self.model.push_stream(
                Coder::simple(method_id, properties),
                packed.len() as u64,
                content.len() as u64,
                crc32fast::hash(content),
            );
        }
        log::debug!(
            "7z entry '{}' ({} bytes, symlink: {as_symlink})",
            record.name,
            content.len()
        );
        self.model.files.push(record);
        Ok(())
    }
}

impl<W: ArchiveSink + Read> SevenZipWriter<W> {
    /// Reopens an existing 7z archive for appending.
    ///
    /// New entries use `compression`, or LZMA2 when it is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if the archive cannot be parsed and
    /// [`Error::UnsupportedFeature`] for encrypted archives or coders the
    /// header decoder does not handle.
    pub fn open_append(mut sink: W, compression: Option<CompressionMethod>) -> Result<Self> {
        let model = parse::read_archive(&mut sink)?;
        let compression = match compression {
            Some(method) => CompressionCatalog::resolve(ContainerFormat::SevenZip, method),
            None => CompressionMethod::Lzma2,
        };
        let names: Vec<String> = model.files.iter().map(|f| f.name.clone()).collect();
        log::debug!(
            "appending to 7z archive with {} members ({} folders)",
            names.len(),
            model.folders.len()
        );
        sink.seek(SeekFrom::Start(SIGNATURE_HEADER_SIZE + model.packed_end()?))?;
        Ok(Self {
            sink,
            compression,
            options: CodecOptions::default(),
            model,
            members: MemberLog::with_existing(names),
            state: WriterState::AcceptingEntries,
        })
    }
}

impl<W: ArchiveSink> ArchiveWriter for SevenZipWriter<W> {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::SevenZip
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
        (*self).finish_into_inner().map(|(summary, _)| summary)
    }
}

/// A member as recorded in a 7z header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SevenZipEntry {
    /// Member name, verbatim.
    pub name: String,
    /// Windows attributes, with the Unix mode in the high 16 bits when
    /// [`attributes::UNIX_EXTENSION`] is set.
    pub attributes: Option<u32>,
    /// Modification time.
    pub mtime: Option<Timestamp>,
    /// Unpacked size.
    pub size: u64,
    /// `false` for empty files and directories.
    pub has_stream: bool,
    /// Directory flag from the empty-stream records.
    pub is_directory: bool,
    /// CRC-32 of the unpacked data, when recorded.
    pub crc: Option<u32>,
}

impl SevenZipEntry {
    /// Returns the Unix mode carried in the attributes, if any.
    pub fn unix_mode(&self) -> Option<u32> {
        self.attributes
            .filter(|a| a & attributes::UNIX_EXTENSION != 0)
            .map(|a| a >> 16)
    }

    /// Returns `true` when the Unix mode marks the entry as a symlink.
    pub fn is_symlink(&self) -> bool {
        self.unix_mode()
            .is_some_and(|m| m & unix_mode::S_IFMT == unix_mode::S_IFLNK)
    }
}

/// Lists the members of a 7z archive.
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] if the archive cannot be parsed.
pub fn read_sevenz_entries<R: Read + Seek>(r: &mut R) -> Result<Vec<SevenZipEntry>> {
    let model = parse::read_archive(r)?;
    let mut stream = 0;
    let entries = model
        .files
        .iter()
        .map(|file| {
            let (size, crc) = if file.has_stream {
                let found = (model.stream_sizes[stream], model.stream_crcs[stream]);
                stream += 1;
                found
            } else {
                (0, None)
            };
            SevenZipEntry {
                name: file.name.clone(),
                attributes: file.attributes,
                mtime: file.mtime.map(Timestamp::from_filetime),
                size,
                has_stream: file.has_stream,
                is_directory: file.is_dir,
                crc,
            }
        })
        .collect();
    Ok(entries)
}

/// Decodes the data of the member at `index`.
///
/// For symlinks the data is the link target.
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] for an out-of-range index or corrupt
/// data and [`Error::UnsupportedFeature`] for multi-coder folders.
pub fn read_sevenz_entry_data<R: Read + Seek>(r: &mut R, index: usize) -> Result<Vec<u8>> {
    let model = parse::read_archive(r)?;
    let file = model
        .files
        .get(index)
        .ok_or_else(|| Error::InvalidFormat(format!("no member at index {index}")))?;
    if !file.has_stream {
        return Ok(Vec::new());
    }
    let stream = model.files[..index].iter().filter(|f| f.has_stream).count();

    let mut first = 0usize;
    for (folder, &count) in model.streams_per_folder.iter().enumerate() {
        let count = count as usize;
        if stream < first + count {
            let data = parse::decode_folder(r, &model, folder)?;
            let offset: u64 = model.stream_sizes[first..stream].iter().sum();
            let size = model.stream_sizes[stream];
            let slice = data
                .get(offset as usize..(offset + size) as usize)
                .ok_or_else(|| Error::InvalidFormat("substream past folder end".into()))?;
            if let Some(expected) = model.stream_crcs[stream] {
                if crc32fast::hash(slice) != expected {
                    return Err(Error::InvalidFormat(format!(
                        "CRC mismatch for '{}'",
                        file.name
                    )));
                }
            }
            return Ok(slice.to_vec());
        }
        first += count;
    }
    Err(Error::InvalidFormat(format!(
        "no folder holds stream {stream}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_archive(compression: CompressionMethod, entries: &[(&str, &[u8], bool)]) -> Vec<u8> {
        let mut writer = SevenZipWriter::new(Cursor::new(Vec::new()), compression).unwrap();
        for (name, content, symlink) in entries {
            writer
                .add_entry(EntryHeader::new(*name, None), content, *symlink)
                .unwrap();
        }
        writer.finish_into_inner().unwrap().1.into_inner()
    }

    #[test]
    fn test_empty_archive_is_signature_only() {
        let bytes = write_archive(CompressionMethod::Copy, &[]);
        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[..6], crate::format::SIGNATURE);
        assert!(read_sevenz_entries(&mut Cursor::new(bytes)).unwrap().is_empty());
    }

    #[test]
    fn test_copy_entries_read_back() {
        let bytes = write_archive(
            CompressionMethod::Copy,
            &[
                ("../../etc/cron.d/x", b"payload", false),
                ("empty", b"", false),
                ("link", b"/etc/shadow", true),
            ],
        );
        let entries = read_sevenz_entries(&mut Cursor::new(bytes.clone())).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["../../etc/cron.d/x", "empty", "link"]);
        assert_eq!(entries[0].size, 7);
        assert!(!entries[1].has_stream);
        assert!(!entries[1].is_directory);
        assert!(entries[2].is_symlink());
        assert_eq!(entries[0].unix_mode(), Some(unix_mode::S_IFREG | 0o644));

        let mut cursor = Cursor::new(bytes);
        assert_eq!(read_sevenz_entry_data(&mut cursor, 0).unwrap(), b"payload");
        assert_eq!(read_sevenz_entry_data(&mut cursor, 1).unwrap(), b"");
        assert_eq!(read_sevenz_entry_data(&mut cursor, 2).unwrap(), b"/etc/shadow");
    }

    #[cfg(feature = "lzma2")]
    #[test]
    fn test_lzma2_entry_roundtrip() {
        let data = vec![b'A'; 4096];
        let bytes = write_archive(CompressionMethod::Lzma2, &[("big", &data, false)]);
        assert!(bytes.len() < 1024);
        assert_eq!(
            read_sevenz_entry_data(&mut Cursor::new(bytes), 0).unwrap(),
            data
        );
    }

    #[test]
    fn test_append_keeps_existing_members() {
        let original = write_archive(CompressionMethod::Copy, &[("first", b"one", false)]);
        let mut writer =
            SevenZipWriter::open_append(Cursor::new(original), Some(CompressionMethod::Copy))
                .unwrap();
        assert_eq!(writer.list_members(), vec!["first"]);
        writer
            .add_entry(EntryHeader::new("second", None), b"two", false)
            .unwrap();
        let (summary, sink) = writer.finish_into_inner().unwrap();
        assert_eq!(summary.entries_written, 1);
        assert_eq!(summary.members, vec!["first", "second"]);

        let bytes = sink.into_inner();
        assert_eq!(bytes.len() as u64, summary.archive_size);
        let mut cursor = Cursor::new(bytes);
        assert_eq!(read_sevenz_entry_data(&mut cursor, 0).unwrap(), b"one");
        assert_eq!(read_sevenz_entry_data(&mut cursor, 1).unwrap(), b"two");
    }

    #[test]
    fn test_append_default_compression_is_lzma2() {
        let original = write_archive(CompressionMethod::Copy, &[]);
        let writer = SevenZipWriter::open_append(Cursor::new(original), None).unwrap();
        assert_eq!(writer.compression(), CompressionMethod::Lzma2);
    }

    #[test]
    fn test_append_rejects_garbage() {
        let result = SevenZipWriter::open_append(Cursor::new(vec![0u8; 64]), None);
        assert!(matches!(result, Err(Error::InvalidFormat(_))));
    }

    #[test]
    fn test_duplicate_names_are_kept() {
        let bytes = write_archive(
            CompressionMethod::Copy,
            &[("dup", b"a", false), ("dup", b"b", false)],
        );
        let entries = read_sevenz_entries(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.name == "dup"));
    }

    #[test]
    fn test_fallback_compression() {
        let writer =
            SevenZipWriter::new(Cursor::new(Vec::new()), CompressionMethod::None).unwrap();
        assert_eq!(writer.compression(), CompressionMethod::Lzma2);
    }
}
