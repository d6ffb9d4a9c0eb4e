//! ustar header blocks, PAX extended records and the header scanner used
//! for appending and inspection.

use std::io::{self, Read};

use crate::format::detect::{header_checksum_matches, parse_octal};
use crate::{Error, Result};

pub(crate) const BLOCK_SIZE: usize = 512;

/// Blocking factor of 20 blocks, the record size GNU and BSD tar write.
pub(crate) const RECORD_SIZE: u64 = 10240;

pub(crate) const TYPE_REGULAR: u8 = b'0';
pub(crate) const TYPE_HARD_LINK: u8 = b'1';
pub(crate) const TYPE_SYMLINK: u8 = b'2';
const TYPE_PAX_LOCAL: u8 = b'x';
const TYPE_PAX_GLOBAL: u8 = b'g';
const TYPE_GNU_LONG_NAME: u8 = b'L';
const TYPE_GNU_LONG_LINK: u8 = b'K';

const NAME_LEN: usize = 100;
/// Largest value an 11-digit octal field holds.
const MAX_OCTAL_11: u64 = 0o777_7777_7777;

/// Fields of one ustar header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UstarHeader {
    pub name: Vec<u8>,
    pub mode: u32,
    pub uid: u64,
    pub gid: u64,
    pub size: u64,
    pub mtime: u64,
    pub typeflag: u8,
    pub linkname: Vec<u8>,
    pub uname: &'static str,
    pub gname: &'static str,
}

impl UstarHeader {
    /// Encodes the header, preceded by a PAX block when a field does not
    /// fit ustar.
    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut records = Vec::new();
        if needs_extension(&self.name) {
            records.extend(pax_record("path", &self.name));
        }
        if needs_extension(&self.linkname) {
            records.extend(pax_record("linkpath", &self.linkname));
        }
        if self.size > MAX_OCTAL_11 {
            records.extend(pax_record("size", self.size.to_string().as_bytes()));
        }
        if self.mtime > MAX_OCTAL_11 {
            records.extend(pax_record("mtime", self.mtime.to_string().as_bytes()));
        }

        let mut out = Vec::with_capacity(BLOCK_SIZE * 2);
        if !records.is_empty() {
            let mut pax_name = b"PaxHeaders/".to_vec();
            pax_name.extend_from_slice(&ascii_prefix(&self.name));
            let pax = UstarHeader {
                name: pax_name,
                mode: 0o644,
                uid: 0,
                gid: 0,
                size: records.len() as u64,
                mtime: self.mtime.min(MAX_OCTAL_11),
                typeflag: TYPE_PAX_LOCAL,
                linkname: Vec::new(),
                uname: "",
                gname: "",
            };
            out.extend_from_slice(&pax.block());
            out.extend_from_slice(&records);
            out.resize(out.len() + padding(records.len() as u64), 0);
        }
        out.extend_from_slice(&self.block());
        out
    }

    /// Encodes the bare 512-byte header; oversized fields are truncated.
    fn block(&self) -> [u8; BLOCK_SIZE] {
        let mut block = [0u8; BLOCK_SIZE];
        put_bytes(&mut block[0..100], &self.name);
        put_octal(&mut block[100..108], u64::from(self.mode));
        put_octal(&mut block[108..116], self.uid);
        put_octal(&mut block[116..124], self.gid);
        put_octal(&mut block[124..136], self.size.min(MAX_OCTAL_11));
        put_octal(&mut block[136..148], self.mtime.min(MAX_OCTAL_11));
        block[156] = self.typeflag;
        put_bytes(&mut block[157..257], &self.linkname);
        block[257..263].copy_from_slice(b"ustar\0");
        block[263..265].copy_from_slice(b"00");
        put_bytes(&mut block[265..297], self.uname.as_bytes());
        put_bytes(&mut block[297..329], self.gname.as_bytes());
        put_octal(&mut block[329..337], 0);
        put_octal(&mut block[337..345], 0);

        let checksum: u32 = block
            .iter()
            .enumerate()
            .map(|(i, &b)| if (148..156).contains(&i) { 32 } else { u32::from(b) })
            .sum();
        block[148..156].copy_from_slice(format!("{checksum:06o}\0 ").as_bytes());
        block
    }
}

fn needs_extension(field: &[u8]) -> bool {
    field.len() > NAME_LEN || !field.is_ascii()
}

/// Keeps the printable ASCII part of a name for the PAX block's own name.
fn ascii_prefix(name: &[u8]) -> Vec<u8> {
    name.iter()
        .copied()
        .filter(|b| b.is_ascii_graphic())
        .take(NAME_LEN - "PaxHeaders/".len())
        .collect()
}

/// Builds one `"<len> <key>=<value>\n"` record; `len` counts itself.
fn pax_record(key: &str, value: &[u8]) -> Vec<u8> {
    let body = key.len() + value.len() + 3;
    let mut len = body + body.to_string().len();
    if len.to_string().len() != body.to_string().len() {
        len = body + len.to_string().len();
    }
    let mut record = format!("{len} {key}=").into_bytes();
    record.extend_from_slice(value);
    record.push(b'\n');
    record
}

fn put_bytes(field: &mut [u8], value: &[u8]) {
    let n = value.len().min(field.len());
    field[..n].copy_from_slice(&value[..n]);
}

/// Writes a zero-padded octal number followed by a NUL terminator.
fn put_octal(field: &mut [u8], value: u64) {
    let width = field.len() - 1;
    let digits = format!("{value:0width$o}");
    put_bytes(&mut field[..width], digits.as_bytes());
}

/// Zero bytes needed after `len` bytes of data to reach a block boundary.
pub(crate) fn padding(len: u64) -> usize {
    ((BLOCK_SIZE as u64 - len % BLOCK_SIZE as u64) % BLOCK_SIZE as u64) as usize
}

/// One member as seen by the header scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarEntry {
    /// Member name after PAX and GNU long-name overrides.
    pub name: String,
    /// Link target of symlinks and hard links.
    pub link_name: Option<String>,
    /// Raw typeflag byte.
    pub entry_type: u8,
    /// Permission bits.
    pub mode: u32,
    /// Owner id.
    pub uid: u64,
    /// Group id.
    pub gid: u64,
    /// Owner name.
    pub uname: String,
    /// Group name.
    pub gname: String,
    /// Data size in bytes.
    pub size: u64,
    /// Modification time in Unix seconds.
    pub mtime: u64,
    /// Member data; empty unless the scan was asked to keep it.
    pub data: Vec<u8>,
}

impl TarEntry {
    /// Returns `true` for symlink members.
    pub fn is_symlink(&self) -> bool {
        self.entry_type == TYPE_SYMLINK
    }
}

/// Result of walking an archive up to its end-of-archive marker.
#[derive(Debug, Clone)]
pub(crate) struct TarScan {
    pub entries: Vec<TarEntry>,
    /// Offset of the first trailer block, or of EOF for an unterminated
    /// archive.
    pub end_offset: u64,
}

#[derive(Default)]
struct Overrides {
    path: Option<Vec<u8>>,
    linkpath: Option<Vec<u8>>,
    size: Option<u64>,
}

/// Walks the headers of a plain tar stream.
///
/// # Errors
///
/// Returns [`Error::InvalidFormat`] for bad checksums, truncated data or
/// unparsable numeric fields.
pub(crate) fn scan<R: Read>(r: &mut R, keep_data: bool) -> Result<TarScan> {
    let mut entries = Vec::new();
    let mut offset = 0u64;
    let mut pending = Overrides::default();
    loop {
        let mut block = [0u8; BLOCK_SIZE];
        let got = read_full(r, &mut block)?;
        if got == 0 {
            log::debug!("tar: no end-of-archive marker, {} members", entries.len());
            return Ok(TarScan {
                entries,
                end_offset: offset,
            });
        }
        if got < BLOCK_SIZE {
            return Err(Error::InvalidFormat(format!(
                "truncated tar header at offset {offset}"
            )));
        }
        if block.iter().all(|&b| b == 0) {
            log::debug!("tar: {} members, trailer at {offset}", entries.len());
            return Ok(TarScan {
                entries,
                end_offset: offset,
            });
        }
        if !header_checksum_matches(&block) {
            return Err(Error::InvalidFormat(format!(
                "bad tar header checksum at offset {offset}"
            )));
        }
        offset += BLOCK_SIZE as u64;

        let typeflag = block[156];
        let header_size = numeric(&block[124..136], "size", offset)?;
        let size = match typeflag {
            TYPE_PAX_LOCAL | TYPE_PAX_GLOBAL | TYPE_GNU_LONG_NAME | TYPE_GNU_LONG_LINK => {
                header_size
            }
            _ => pending.size.take().unwrap_or(header_size),
        };
        let stored = size + padding(size) as u64;
        let keep = keep_data
            || matches!(
                typeflag,
                TYPE_PAX_LOCAL | TYPE_GNU_LONG_NAME | TYPE_GNU_LONG_LINK
            );
        let data = if keep {
            let data = read_exact_vec(r, size, offset)?;
            skip(r, padding(size) as u64, offset)?;
            data
        } else {
            skip(r, stored, offset)?;
            Vec::new()
        };
        offset += stored;

        match typeflag {
            TYPE_PAX_LOCAL => {
                for (key, value) in parse_pax(&data) {
                    match key.as_str() {
                        "path" => pending.path = Some(value),
                        "linkpath" => pending.linkpath = Some(value),
                        "size" => {
                            pending.size = std::str::from_utf8(&value)
                                .ok()
                                .and_then(|s| s.parse().ok());
                        }
                        _ => {}
                    }
                }
            }
            TYPE_PAX_GLOBAL => {}
            TYPE_GNU_LONG_NAME => pending.path = Some(trim_nul(&data).to_vec()),
            TYPE_GNU_LONG_LINK => pending.linkpath = Some(trim_nul(&data).to_vec()),
            _ => {
                let name = pending.path.take().unwrap_or_else(|| header_name(&block));
                let link = pending
                    .linkpath
                    .take()
                    .unwrap_or_else(|| trim_nul(&block[157..257]).to_vec());
                let link_name = matches!(typeflag, TYPE_HARD_LINK | TYPE_SYMLINK)
                    .then(|| String::from_utf8_lossy(&link).into_owned());
                entries.push(TarEntry {
                    name: String::from_utf8_lossy(&name).into_owned(),
                    link_name,
                    entry_type: typeflag,
                    mode: numeric(&block[100..108], "mode", offset)? as u32,
                    uid: numeric(&block[108..116], "uid", offset)?,
                    gid: numeric(&block[116..124], "gid", offset)?,
                    uname: String::from_utf8_lossy(trim_nul(&block[265..297])).into_owned(),
                    gname: String::from_utf8_lossy(trim_nul(&block[297..329])).into_owned(),
                    size,
                    mtime: numeric(&block[136..148], "mtime", offset)?,
                    data,
                });
            }
        }
    }
}

/// Joins the ustar prefix and name fields.
fn header_name(block: &[u8]) -> Vec<u8> {
    let name = trim_nul(&block[0..100]);
    let prefix = trim_nul(&block[345..500]);
    if &block[257..262] == b"ustar" && !prefix.is_empty() {
        let mut full = prefix.to_vec();
        full.push(b'/');
        full.extend_from_slice(name);
        full
    } else {
        name.to_vec()
    }
}

fn trim_nul(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

/// Parses an octal field, or a GNU base-256 field when the high bit is set.
fn numeric(field: &[u8], what: &str, offset: u64) -> Result<u64> {
    if field[0] & 0x80 != 0 {
        let value = field[1..]
            .iter()
            .fold(u64::from(field[0] & 0x7F), |acc, &b| (acc << 8) | u64::from(b));
        return Ok(value);
    }
    if field.iter().all(|&b| b == 0 || b == b' ') {
        return Ok(0);
    }
    parse_octal(field).ok_or_else(|| {
        Error::InvalidFormat(format!("bad tar {what} field in header before offset {offset}"))
    })
}

fn parse_pax(data: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut records = Vec::new();
    let mut rest = data;
    while let Some(space) = rest.iter().position(|&b| b == b' ') {
        let Some(len) = std::str::from_utf8(&rest[..space])
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&len| len > space + 1 && len <= rest.len())
        else {
            break;
        };
        let record = &rest[space + 1..len];
        let record = record.strip_suffix(b"\n").unwrap_or(record);
        if let Some(eq) = record.iter().position(|&b| b == b'=') {
            records.push((
                String::from_utf8_lossy(&record[..eq]).into_owned(),
                record[eq + 1..].to_vec(),
            ));
        }
        rest = &rest[len..];
    }
    records
}

/// Reads until `buf` is full or EOF; returns the byte count.
fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn read_exact_vec<R: Read>(r: &mut R, len: u64, offset: u64) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    r.take(len).read_to_end(&mut data)?;
    if data.len() as u64 != len {
        return Err(Error::InvalidFormat(format!(
            "tar member data truncated after offset {offset}"
        )));
    }
    Ok(data)
}

fn skip<R: Read>(r: &mut R, len: u64, offset: u64) -> Result<()> {
    let skipped = io::copy(&mut r.take(len), &mut io::sink())?;
    if skipped != len {
        return Err(Error::InvalidFormat(format!(
            "tar member data truncated after offset {offset}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn regular(name: &[u8], size: u64) -> UstarHeader {
        UstarHeader {
            name: name.to_vec(),
            mode: 0o644,
            uid: 0,
            gid: 0,
            size,
            mtime: 1_600_000_000,
            typeflag: TYPE_REGULAR,
            linkname: Vec::new(),
            uname: "",
            gname: "",
        }
    }

    #[test]
    fn test_block_fields() {
        let block = regular(b"../etc/passwd", 5).block();
        assert_eq!(&block[0..13], b"../etc/passwd");
        assert_eq!(&block[100..108], b"0000644\0");
        assert_eq!(&block[124..136], b"00000000005\0");
        assert_eq!(&block[257..263], b"ustar\0");
        assert!(header_checksum_matches(&block));
    }

    #[test]
    fn test_pax_record_length_counts_itself() {
        let record = pax_record("path", b"abc");
        assert_eq!(record, b"12 path=abc\n");
        let record = pax_record("path", &[b'a'; 90]);
        assert_eq!(record.len(), 99);
        assert!(record.starts_with(b"99 "));
        // One more byte pushes the length prefix to three digits.
        let record = pax_record("path", &[b'a'; 91]);
        assert_eq!(record.len(), 101);
        assert!(record.starts_with(b"101 "));
    }

    #[test]
    fn test_short_ascii_name_has_no_pax() {
        assert_eq!(regular(b"short", 0).encode().len(), BLOCK_SIZE);
    }

    #[test]
    fn test_long_and_unicode_names_use_pax() {
        let long = [b"../".repeat(40), b"etc/shadow".to_vec()].concat();
        let encoded = regular(&long, 0).encode();
        assert_eq!(encoded[156], TYPE_PAX_LOCAL);
        let scanned = scan(&mut Cursor::new(&encoded), false).unwrap();
        assert_eq!(scanned.entries.len(), 1);
        assert_eq!(scanned.entries[0].name.as_bytes(), &long[..]);

        let unicode = "r\u{e9}sum\u{e9}".as_bytes();
        let encoded = regular(unicode, 0).encode();
        let scanned = scan(&mut Cursor::new(&encoded), false).unwrap();
        assert_eq!(scanned.entries[0].name, "r\u{e9}sum\u{e9}");
    }

    #[test]
    fn test_scan_stops_at_trailer() {
        let mut archive = regular(b"a", 3).encode();
        archive.extend_from_slice(b"abc");
        archive.resize(archive.len() + padding(3), 0);
        let trailer_at = archive.len() as u64;
        archive.resize(archive.len() + 2 * BLOCK_SIZE, 0);

        let scanned = scan(&mut Cursor::new(&archive), true).unwrap();
        assert_eq!(scanned.end_offset, trailer_at);
        assert_eq!(scanned.entries[0].data, b"abc");
    }

    #[test]
    fn test_scan_gnu_long_name() {
        let long = "x/".repeat(80);
        let mut archive = UstarHeader {
            typeflag: TYPE_GNU_LONG_NAME,
            ..regular(b"././@LongLink", long.len() as u64 + 1)
        }
        .block()
        .to_vec();
        archive.extend_from_slice(long.as_bytes());
        archive.push(0);
        archive.resize(archive.len() + padding(long.len() as u64 + 1), 0);
        archive.extend_from_slice(&regular(b"truncated", 0).block());

        let scanned = scan(&mut Cursor::new(&archive), false).unwrap();
        assert_eq!(scanned.entries[0].name, long);
        assert_eq!(scanned.end_offset, archive.len() as u64);
    }

    #[test]
    fn test_scan_rejects_bad_checksum() {
        let mut block = regular(b"a", 0).block();
        block[0] = b'b';
        let err = scan(&mut Cursor::new(block.to_vec()), false).unwrap_err();
        assert!(matches!(err, Error::InvalidFormat(_)));
    }

    #[test]
    fn test_base256_numeric() {
        let mut field = [0u8; 12];
        field[0] = 0x80;
        field[10] = 0x01;
        field[11] = 0x02;
        assert_eq!(numeric(&field, "size", 0).unwrap(), 0x0102);
    }
}
