//! Zip header records: local file header, central directory record and the
//! end-of-central-directory record.

use std::io::{self, Read, Seek, SeekFrom};

use crate::entry::unix_mode;
use crate::timestamp::DosDateTime;
use crate::{Error, Result};

pub(crate) const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
pub(crate) const CENTRAL_HEADER_SIG: u32 = 0x0201_4b50;
pub(crate) const EOCD_SIG: u32 = 0x0605_4b50;
pub(crate) const ZIP64_LOCATOR_SIG: u32 = 0x0706_4b50;

pub(crate) const LOCAL_HEADER_LEN: usize = 30;
pub(crate) const CENTRAL_HEADER_LEN: usize = 46;
pub(crate) const EOCD_LEN: usize = 22;

/// Host system id for Unix in the high byte of "version made by".
pub(crate) const HOST_UNIX: u16 = 3;

/// General-purpose flag: an end-of-stream marker terminates LZMA data.
pub(crate) const FLAG_LZMA_EOS: u16 = 0x0002;
/// General-purpose flag: name and comment are UTF-8.
pub(crate) const FLAG_UTF8: u16 = 0x0800;

/// Extended timestamp extra field id ("UT").
pub(crate) const EXTRA_EXTENDED_TIMESTAMP: u16 = 0x5455;

/// One central directory record.
///
/// Records read from an existing archive are re-emitted byte-for-byte, so
/// every field is kept even when this crate never interprets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralRecord {
    /// Creator version; high byte is the host system.
    pub version_made_by: u16,
    /// Minimum version needed to extract.
    pub version_needed: u16,
    /// General-purpose bit flags.
    pub flags: u16,
    /// Compression method id.
    pub method: u16,
    /// Modification time in MS-DOS format.
    pub modified: DosDateTime,
    /// CRC-32 of the uncompressed data.
    pub crc32: u32,
    /// Stored size.
    pub compressed_size: u32,
    /// Original size.
    pub uncompressed_size: u32,
    /// Disk number where the entry starts.
    pub disk_start: u16,
    /// Internal attributes.
    pub internal_attributes: u16,
    /// External attributes; on Unix hosts the high 16 bits are `st_mode`.
    pub external_attributes: u32,
    /// Offset of the local header.
    pub local_header_offset: u32,
    /// Raw name bytes.
    pub name: Vec<u8>,
    /// Raw extra field.
    pub extra: Vec<u8>,
    /// Raw entry comment.
    pub comment: Vec<u8>,
}

impl CentralRecord {
    /// Returns the name, replacing invalid UTF-8.
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Returns the Unix mode when the record was made on a Unix host.
    pub fn unix_mode(&self) -> Option<u32> {
        (self.version_made_by >> 8 == HOST_UNIX).then_some(self.external_attributes >> 16)
    }

    /// Returns `true` if the external attributes mark a symlink.
    pub fn is_symlink(&self) -> bool {
        self.unix_mode()
            .is_some_and(|mode| mode & unix_mode::S_IFMT == unix_mode::S_IFLNK)
    }

    /// Appends the local file header for this record.
    pub(crate) fn write_local_header(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&LOCAL_HEADER_SIG.to_le_bytes());
        buf.extend_from_slice(&self.version_needed.to_le_bytes());
        self.write_shared_fields(buf);
        buf.extend_from_slice(&self.name);
        buf.extend_from_slice(&self.extra);
    }

    /// Appends the central directory record.
    pub(crate) fn write_central(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&CENTRAL_HEADER_SIG.to_le_bytes());
        buf.extend_from_slice(&self.version_made_by.to_le_bytes());
        buf.extend_from_slice(&self.version_needed.to_le_bytes());
        self.write_shared_fields(buf);
        buf.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.disk_start.to_le_bytes());
        buf.extend_from_slice(&self.internal_attributes.to_le_bytes());
        buf.extend_from_slice(&self.external_attributes.to_le_bytes());
        buf.extend_from_slice(&self.local_header_offset.to_le_bytes());
        buf.extend_from_slice(&self.name);
        buf.extend_from_slice(&self.extra);
        buf.extend_from_slice(&self.comment);
    }

    /// Flags through extra length, common to both header kinds.
    fn write_shared_fields(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.flags.to_le_bytes());
        buf.extend_from_slice(&self.method.to_le_bytes());
        buf.extend_from_slice(&self.modified.time.to_le_bytes());
        buf.extend_from_slice(&self.modified.date.to_le_bytes());
        buf.extend_from_slice(&self.crc32.to_le_bytes());
        buf.extend_from_slice(&self.compressed_size.to_le_bytes());
        buf.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        buf.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(self.extra.len() as u16).to_le_bytes());
    }

    /// Parses one central directory record.
    pub(crate) fn parse<R: Read>(r: &mut R) -> Result<Self> {
        let mut fixed = [0u8; CENTRAL_HEADER_LEN];
        r.read_exact(&mut fixed)?;
        let mut f = Fields(&fixed);
        if f.u32() != CENTRAL_HEADER_SIG {
            return Err(Error::InvalidFormat(
                "bad central directory record signature".into(),
            ));
        }
        let version_made_by = f.u16();
        let version_needed = f.u16();
        let flags = f.u16();
        let method = f.u16();
        let time = f.u16();
        let date = f.u16();
        let crc32 = f.u32();
        let compressed_size = f.u32();
        let uncompressed_size = f.u32();
        let name_len = f.u16() as usize;
        let extra_len = f.u16() as usize;
        let comment_len = f.u16() as usize;
        let disk_start = f.u16();
        let internal_attributes = f.u16();
        let external_attributes = f.u32();
        let local_header_offset = f.u32();
        Ok(Self {
            version_made_by,
            version_needed,
            flags,
            method,
            modified: DosDateTime { date, time },
            crc32,
            compressed_size,
            uncompressed_size,
            disk_start,
            internal_attributes,
            external_attributes,
            local_header_offset,
            name: read_vec(r, name_len)?,
            extra: read_vec(r, extra_len)?,
            comment: read_vec(r, comment_len)?,
        })
    }
}

/// End of central directory record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    /// Number of this disk.
    pub disk_number: u16,
    /// Disk where the central directory starts.
    pub cd_disk: u16,
    /// Records on this disk.
    pub disk_entries: u16,
    /// Records in total.
    pub total_entries: u16,
    /// Size of the central directory.
    pub cd_size: u32,
    /// Offset of the central directory.
    pub cd_offset: u32,
    /// Archive comment.
    pub comment: Vec<u8>,
}

impl EndOfCentralDirectory {
    pub(crate) fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&EOCD_SIG.to_le_bytes());
        buf.extend_from_slice(&self.disk_number.to_le_bytes());
        buf.extend_from_slice(&self.cd_disk.to_le_bytes());
        buf.extend_from_slice(&self.disk_entries.to_le_bytes());
        buf.extend_from_slice(&self.total_entries.to_le_bytes());
        buf.extend_from_slice(&self.cd_size.to_le_bytes());
        buf.extend_from_slice(&self.cd_offset.to_le_bytes());
        buf.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        buf.extend_from_slice(&self.comment);
    }

    fn parse(record: &[u8]) -> Self {
        let mut f = Fields(&record[4..]);
        let disk_number = f.u16();
        let cd_disk = f.u16();
        let disk_entries = f.u16();
        let total_entries = f.u16();
        let cd_size = f.u32();
        let cd_offset = f.u32();
        let comment_len = f.u16() as usize;
        let comment = record[EOCD_LEN..].iter().copied().take(comment_len).collect();
        Self {
            disk_number,
            cd_disk,
            disk_entries,
            total_entries,
            cd_size,
            cd_offset,
            comment,
        }
    }

    fn is_zip64(&self) -> bool {
        self.total_entries == u16::MAX || self.cd_size == u32::MAX || self.cd_offset == u32::MAX
    }
}

/// A parsed central directory.
#[derive(Debug, Clone)]
pub struct CentralDirectory {
    /// Records in directory order.
    pub records: Vec<CentralRecord>,
    /// The end record.
    pub end: EndOfCentralDirectory,
    /// Position of the end record.
    pub end_offset: u64,
}

/// Locates and parses the central directory of a zip archive.
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] if no end record is found or the
/// directory is inconsistent, and [`Error::UnsupportedFeature`] for zip64
/// and multi-disk archives.
pub fn read_central_directory<R: Read + Seek>(r: &mut R) -> Result<CentralDirectory> {
    let len = r.seek(SeekFrom::End(0))?;
    // Comment is at most 65535 bytes.
    let window = len.min((EOCD_LEN + u16::MAX as usize) as u64);
    r.seek(SeekFrom::Start(len - window))?;
    let tail = read_vec(r, window as usize)?;

    let not_found = || Error::InvalidFormat("end of central directory not found".into());
    if tail.len() < EOCD_LEN {
        return Err(not_found());
    }
    let sig = EOCD_SIG.to_le_bytes();
    let rel = (0..=tail.len() - EOCD_LEN)
        .rev()
        .find(|&i| {
            tail[i..i + 4] == sig
                && tail.len() - (i + EOCD_LEN)
                    == u16::from_le_bytes([tail[i + 20], tail[i + 21]]) as usize
        })
        .ok_or_else(not_found)?;
    let end_offset = len - window + rel as u64;
    let end = EndOfCentralDirectory::parse(&tail[rel..]);

    if end.is_zip64() || has_zip64_locator(&tail, rel) {
        return Err(Error::UnsupportedFeature { feature: "zip64" });
    }
    if end.disk_number != 0 || end.cd_disk != 0 || end.disk_entries != end.total_entries {
        return Err(Error::UnsupportedFeature {
            feature: "multi-disk zip",
        });
    }
    if u64::from(end.cd_offset) + u64::from(end.cd_size) != end_offset {
        return Err(Error::InvalidFormat(format!(
            "central directory at {} + {} does not end at {}",
            end.cd_offset, end.cd_size, end_offset
        )));
    }

    r.seek(SeekFrom::Start(u64::from(end.cd_offset)))?;
    let mut directory = io::Cursor::new(read_vec(r, end.cd_size as usize)?);
    let records = (0..end.total_entries)
        .map(|_| CentralRecord::parse(&mut directory))
        .collect::<Result<Vec<_>>>()?;
    log::debug!(
        "zip central directory: {} records at offset {}",
        records.len(),
        end.cd_offset
    );
    Ok(CentralDirectory {
        records,
        end,
        end_offset,
    })
}

fn has_zip64_locator(tail: &[u8], eocd: usize) -> bool {
    eocd >= 20 && tail[eocd - 20..eocd - 16] == ZIP64_LOCATOR_SIG.to_le_bytes()
}

/// Returns the offset of the entry data that follows a local header.
pub(crate) fn local_data_offset<R: Read + Seek>(r: &mut R, record: &CentralRecord) -> Result<u64> {
    let start = u64::from(record.local_header_offset);
    r.seek(SeekFrom::Start(start))?;
    let mut fixed = [0u8; LOCAL_HEADER_LEN];
    r.read_exact(&mut fixed)?;
    let mut f = Fields(&fixed);
    if f.u32() != LOCAL_HEADER_SIG {
        return Err(Error::InvalidFormat(format!(
            "no local header at offset {start}"
        )));
    }
    let name_len = u16::from_le_bytes([fixed[26], fixed[27]]);
    let extra_len = u16::from_le_bytes([fixed[28], fixed[29]]);
    Ok(start + LOCAL_HEADER_LEN as u64 + u64::from(name_len) + u64::from(extra_len))
}

/// Builds an extended timestamp extra field carrying only the mtime.
pub(crate) fn extended_timestamp(mtime: u32) -> Vec<u8> {
    let mut extra = Vec::with_capacity(9);
    extra.extend_from_slice(&EXTRA_EXTENDED_TIMESTAMP.to_le_bytes());
    extra.extend_from_slice(&5u16.to_le_bytes());
    extra.push(0x01);
    extra.extend_from_slice(&mtime.to_le_bytes());
    extra
}

fn read_vec<R: Read>(r: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Little-endian field cursor over a fixed-size record.
struct Fields<'a>(&'a [u8]);

impl Fields<'_> {
    fn u16(&mut self) -> u16 {
        let (head, rest) = self.0.split_at(2);
        self.0 = rest;
        u16::from_le_bytes([head[0], head[1]])
    }

    fn u32(&mut self) -> u32 {
        let (head, rest) = self.0.split_at(4);
        self.0 = rest;
        u32::from_le_bytes([head[0], head[1], head[2], head[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_record() -> CentralRecord {
        CentralRecord {
            version_made_by: (HOST_UNIX << 8) | 63,
            version_needed: 20,
            flags: 0,
            method: 8,
            modified: DosDateTime { date: 0x21, time: 0 },
            crc32: 0xDEAD_BEEF,
            compressed_size: 3,
            uncompressed_size: 5,
            disk_start: 0,
            internal_attributes: 0,
            external_attributes: 0o120777 << 16,
            local_header_offset: 0,
            name: b"../link".to_vec(),
            extra: extended_timestamp(0),
            comment: b"c".to_vec(),
        }
    }

    #[test]
    fn test_central_record_roundtrip() {
        let record = sample_record();
        let mut buf = Vec::new();
        record.write_central(&mut buf);
        assert_eq!(buf.len(), CENTRAL_HEADER_LEN + 7 + 9 + 1);
        let parsed = CentralRecord::parse(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(parsed, record);
        assert!(parsed.is_symlink());
    }

    #[test]
    fn test_non_unix_host_is_not_symlink() {
        let mut record = sample_record();
        record.version_made_by = 20;
        assert_eq!(record.unix_mode(), None);
        assert!(!record.is_symlink());
    }

    #[test]
    fn test_find_eocd_behind_comment() {
        let record = sample_record();
        let mut archive = Vec::new();
        record.write_local_header(&mut archive);
        archive.extend_from_slice(b"abc");
        let cd_offset = archive.len() as u32;
        record.write_central(&mut archive);
        let cd_size = archive.len() as u32 - cd_offset;
        EndOfCentralDirectory {
            disk_entries: 1,
            total_entries: 1,
            cd_size,
            cd_offset,
            comment: b"PK\x05\x06 fake signature in comment".to_vec(),
            ..Default::default()
        }
        .write(&mut archive);

        let directory = read_central_directory(&mut Cursor::new(&archive)).unwrap();
        assert_eq!(directory.records, vec![record.clone()]);
        assert_eq!(directory.end.comment, b"PK\x05\x06 fake signature in comment");
        let data_at = local_data_offset(&mut Cursor::new(&archive), &record).unwrap();
        assert_eq!(&archive[data_at as usize..data_at as usize + 3], b"abc");
    }

    #[test]
    fn test_missing_eocd() {
        let err = read_central_directory(&mut Cursor::new(b"PK\x03\x04 junk".to_vec())).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_zip64_rejected() {
        let mut archive = Vec::new();
        EndOfCentralDirectory {
            disk_entries: u16::MAX,
            total_entries: u16::MAX,
            cd_size: u32::MAX,
            cd_offset: u32::MAX,
            ..Default::default()
        }
        .write(&mut archive);
        let err = read_central_directory(&mut Cursor::new(archive)).unwrap_err();
        assert!(err.is_unsupported());
    }
}
