//! Zip writer.
//!
//! Entries are compressed in memory and written as local header plus data;
//! the central directory and end record are emitted on close. Appending
//! parses the existing central directory, keeps its records verbatim and
//! writes new entries over the old directory.

mod records;

pub use records::{CentralDirectory, CentralRecord, EndOfCentralDirectory, read_central_directory};

use std::io::{Read, Seek, SeekFrom};

use records::{FLAG_LZMA_EOS, FLAG_UTF8, HOST_UNIX, extended_timestamp, local_data_offset};

use super::{ArchiveSink, ArchiveWriter, MemberLog, WriteSummary, WriterState, entry_failure};
use crate::catalog::zip_method;
use crate::codec::{self, CodecOptions};
use crate::{
    CompressionCatalog, CompressionMethod, ContainerFormat, EntryHeader, Error, Result,
};

/// "Version made by" low byte: specification version 6.3.
const SPEC_VERSION: u16 = 63;

/// Zip LZMA data header: LZMA SDK version 9.20 and a 5-byte property size.
const LZMA_HEADER: [u8; 4] = [9, 20, 5, 0];

/// Writes a zip archive to a seekable sink.
pub struct ZipWriter<W: ArchiveSink> {
    sink: W,
    compression: CompressionMethod,
    options: CodecOptions,
    records: Vec<CentralRecord>,
    comment: Vec<u8>,
    offset: u64,
    members: MemberLog,
    state: WriterState,
}

impl<W: ArchiveSink> ZipWriter<W> {
    /// Starts a new archive at the current position of `sink`.
    ///
    /// Methods zip cannot store fall back to deflate.
    pub fn new(mut sink: W, compression: CompressionMethod) -> Result<Self> {
        let offset = sink.stream_position()?;
        Ok(Self {
            sink,
            compression: CompressionCatalog::resolve(ContainerFormat::Zip, compression),
            options: CodecOptions::default(),
            records: Vec::new(),
            comment: Vec::new(),
            offset,
            members: MemberLog::default(),
            state: WriterState::AcceptingEntries,
        })
    }

    /// Replaces the codec tuning.
    pub fn codec_options(mut self, options: CodecOptions) -> Self {
        self.options = options;
        self
    }

    /// Finalises the archive and returns the sink.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WriterAborted`] if an earlier entry failed and
    /// [`Error::UnsupportedFeature`] if the directory would need zip64.
    pub fn finish_into_inner(mut self) -> Result<(WriteSummary, W)> {
        self.state.ensure_accepting()?;
        let cd_offset = self.offset;
        let mut directory = Vec::new();
        for record in &self.records {
            record.write_central(&mut directory);
        }
        let entries = u16::try_from(self.records.len())
            .ok()
            .filter(|&n| n != u16::MAX)
            .ok_or(Error::UnsupportedFeature { feature: "zip64" })?;
        let end = EndOfCentralDirectory {
            disk_entries: entries,
            total_entries: entries,
            cd_size: zip32(directory.len() as u64)?,
            cd_offset: zip32(cd_offset)?,
            comment: std::mem::take(&mut self.comment),
            ..Default::default()
        };
        end.write(&mut directory);
        self.sink.write_all(&directory)?;
        let archive_size = self.sink.truncate_here()?;
        let summary = self
            .members
            .summary(ContainerFormat::Zip, self.compression, archive_size);
        Ok((summary, self.sink))
    }

    fn write_entry(&mut self, header: &EntryHeader, content: &[u8], as_symlink: bool) -> Result<()> {
        let name = header.name.as_bytes().to_vec();
        if name.len() > usize::from(u16::MAX) {
            return Err(Error::encoding(&header.name, "name longer than 65535 bytes"));
        }
        if self.records.len() >= usize::from(u16::MAX) - 1 {
            return Err(Error::UnsupportedFeature { feature: "zip64" });
        }

        let method = self.compression;
        let mut flags = if name.is_ascii() { 0 } else { FLAG_UTF8 };
        let data = match method {
            CompressionMethod::Lzma => {
                flags |= FLAG_LZMA_EOS;
                let props = codec::coder_properties(method, &self.options).unwrap_or_default();
                let stream = codec::compress(method, content, &self.options)?;
                let mut data = Vec::with_capacity(LZMA_HEADER.len() + props.len() + stream.len());
                data.extend_from_slice(&LZMA_HEADER);
                data.extend_from_slice(&props);
                data.extend_from_slice(&stream);
                data
            }
            _ => codec::compress(method, content, &self.options)?,
        };

        let record = CentralRecord {
            version_made_by: (HOST_UNIX << 8) | SPEC_VERSION,
            version_needed: version_needed(method),
            flags,
            method: method.zip_method_id().unwrap_or(zip_method::DEFLATE),
            modified: header.timestamp.to_dos(),
            crc32: crc32fast::hash(content),
            compressed_size: zip32(data.len() as u64)?,
            uncompressed_size: zip32(content.len() as u64)?,
            disk_start: 0,
            internal_attributes: 0,
            external_attributes: header.unix_mode(as_symlink) << 16,
            local_header_offset: zip32(self.offset)?,
            name,
            extra: extended_timestamp(header.timestamp.as_unix_u32()),
            comment: Vec::new(),
        };
        let mut local = Vec::new();
        record.write_local_header(&mut local);
        self.sink.write_all(&local)?;
        self.sink.write_all(&data)?;
        self.offset += (local.len() + data.len()) as u64;
        log::debug!(
            "zip: {} '{}' ({} -> {} bytes, {method})",
            if as_symlink { "symlink" } else { "file" },
            header.name,
            content.len(),
            data.len()
        );
        self.records.push(record);
        Ok(())
    }
}

impl<W: ArchiveSink + Read> ZipWriter<W> {
    /// Continues an existing archive.
    ///
    /// Existing records are preserved byte-for-byte. With `compression` set
    /// to `None` the method of the first member is reused, or deflate for an
    /// empty archive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidFormat`] if the central directory cannot be
    /// parsed and [`Error::UnsupportedFeature`] for zip64 archives.
    pub fn open_append(mut sink: W, compression: Option<CompressionMethod>) -> Result<Self> {
        let directory = read_central_directory(&mut sink)?;
        let compression = match compression {
            Some(method) => CompressionCatalog::resolve(ContainerFormat::Zip, method),
            None => directory
                .records
                .first()
                .and_then(|r| CompressionMethod::from_zip_method_id(r.method))
                .unwrap_or_else(|| CompressionCatalog::default_method(ContainerFormat::Zip)),
        };
        let offset = u64::from(directory.end.cd_offset);
        sink.seek(SeekFrom::Start(offset))?;
        let names = directory.records.iter().map(CentralRecord::name_lossy).collect();
        log::debug!(
            "zip: appending after {} members at offset {offset} ({compression})",
            directory.records.len()
        );
        Ok(Self {
            sink,
            compression,
            options: CodecOptions::default(),
            records: directory.records,
            comment: directory.end.comment,
            offset,
            members: MemberLog::with_existing(names),
            state: WriterState::AcceptingEntries,
        })
    }
}

impl<W: ArchiveSink> ArchiveWriter for ZipWriter<W> {
    fn format(&self) -> ContainerFormat {
        ContainerFormat::Zip
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

fn version_needed(method: CompressionMethod) -> u16 {
    match method {
        CompressionMethod::None => 10,
        CompressionMethod::Bzip2 => 46,
        CompressionMethod::Lzma => 63,
        _ => 20,
    }
}

fn zip32(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::UnsupportedFeature { feature: "zip64" })
}

/// Reads and decompresses the data of one zip member, checking its CRC.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFeature`] for methods this crate does not
/// write and [`Error::InvalidFormat`] for corrupt data.
pub fn read_zip_entry_data<R: Read + Seek>(r: &mut R, record: &CentralRecord) -> Result<Vec<u8>> {
    let start = local_data_offset(r, record)?;
    r.seek(SeekFrom::Start(start))?;
    let mut packed = vec![0u8; record.compressed_size as usize];
    r.read_exact(&mut packed)?;

    let method = CompressionMethod::from_zip_method_id(record.method).ok_or(
        Error::UnsupportedFeature {
            feature: "zip compression method",
        },
    )?;
    let size = u64::from(record.uncompressed_size);
    let data = match method {
        CompressionMethod::None => packed,
        CompressionMethod::Lzma => {
            let header_len = LZMA_HEADER.len();
            let props_len = packed
                .get(2..4)
                .map(|b| usize::from(u16::from_le_bytes([b[0], b[1]])))
                .ok_or_else(|| Error::InvalidFormat("truncated zip LZMA header".into()))?;
            let stream_at = header_len + props_len;
            if packed.len() < stream_at {
                return Err(Error::InvalidFormat("truncated zip LZMA header".into()));
            }
            codec::decompress(
                codec::method::LZMA,
                Some(&packed[header_len..stream_at]),
                &packed[stream_at..],
                size,
            )?
        }
        other => {
            let id = other.sevenz_method_id().ok_or(Error::UnsupportedFeature {
                feature: "zip compression method",
            })?;
            codec::decompress(id, None, &packed, size)?
        }
    };
    if crc32fast::hash(&data) != record.crc32 {
        return Err(Error::InvalidFormat(format!(
            "CRC mismatch in '{}'",
            record.name_lossy()
        )));
    }
    Ok(data)
}
