//! Container detection by signature.
//!
//! Detection never looks at the file name. A `.zip` holding 7z bytes is a 7z
//! archive; a gzip-compressed tar is a gzip stream, not a tar archive.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::{ContainerFormat, Result};

/// Known leading signatures.
const SIGNATURES: &[(&[u8], ContainerFormat)] = &[
    // 7z: '7' 'z' 0xBC 0xAF 0x27 0x1C
    (super::SIGNATURE, ContainerFormat::SevenZip),
    // ZIP: local file header
    (b"PK\x03\x04", ContainerFormat::Zip),
    // ZIP: end of central directory of an empty archive
    (b"PK\x05\x06", ContainerFormat::Zip),
];

/// Offset of the ustar magic inside a tar header block.
const TAR_MAGIC_OFFSET: usize = 257;

/// Tar header block size.
const TAR_BLOCK: usize = 512;

/// Number of bytes read for sniffing.
const SNIFF_LEN: usize = 2 * TAR_BLOCK;

/// Detects the container format of the file at `path`.
///
/// Returns `Ok(None)` for anything that is not a zip, tar or 7z archive.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if the file cannot be read.
pub fn detect_format(path: impl AsRef<Path>) -> Result<Option<ContainerFormat>> {
    let mut head = Vec::with_capacity(SNIFF_LEN);
    File::open(path.as_ref())?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)?;
    Ok(detect_format_from_bytes(&head))
}

/// Detects the container format from the first bytes of a file.
///
/// Tar detection needs the first 512 bytes, and recognising an empty tar
/// archive needs 1024.
pub fn detect_format_from_bytes(head: &[u8]) -> Option<ContainerFormat> {
    if let Some((_, format)) = SIGNATURES.iter().find(|(sig, _)| head.starts_with(sig)) {
        return Some(*format);
    }
    if is_tar(head) {
        return Some(ContainerFormat::Tar);
    }
    None
}

fn is_tar(head: &[u8]) -> bool {
    let Some(block) = head.get(..TAR_BLOCK) else {
        return false;
    };
    if block.iter().all(|&b| b == 0) {
        // An archive with no members is just its end-of-archive marker.
        return head.len() >= 2 * TAR_BLOCK && head[TAR_BLOCK..2 * TAR_BLOCK].iter().all(|&b| b == 0);
    }
    if &block[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5] == b"ustar" {
        return true;
    }
    // Pre-POSIX tar has no magic, only a checksum.
    header_checksum_matches(block)
}

/// Checks the octal checksum field (bytes 148..156) of a tar header block.
pub(crate) fn header_checksum_matches(block: &[u8]) -> bool {
    let Some(stored) = parse_octal(&block[148..156]) else {
        return false;
    };
    let unsigned: u64 = block
        .iter()
        .enumerate()
        .map(|(i, &b)| if (148..156).contains(&i) { 32 } else { u64::from(b) })
        .sum();
    stored == unsigned
}

pub(crate) fn parse_octal(field: &[u8]) -> Option<u64> {
    let digits: Vec<u8> = field
        .iter()
        .copied()
        .skip_while(|&b| b == b' ')
        .take_while(|&b| (b'0'..=b'7').contains(&b))
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits
        .iter()
        .try_fold(0u64, |acc, &d| acc.checked_mul(8)?.checked_add(u64::from(d - b'0')))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sevenz_signature() {
        let head = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0x00, 0x04];
        assert_eq!(detect_format_from_bytes(&head), Some(ContainerFormat::SevenZip));
    }

    #[test]
    fn test_zip_signatures() {
        assert_eq!(detect_format_from_bytes(b"PK\x03\x04rest"), Some(ContainerFormat::Zip));
        let mut empty = b"PK\x05\x06".to_vec();
        empty.resize(22, 0);
        assert_eq!(detect_format_from_bytes(&empty), Some(ContainerFormat::Zip));
    }

    #[test]
    fn test_ustar_magic() {
        let mut block = vec![0u8; 512];
        block[0] = b'a';
        block[257..263].copy_from_slice(b"ustar\0");
        assert_eq!(detect_format_from_bytes(&block), Some(ContainerFormat::Tar));
    }

    #[test]
    fn test_empty_tar() {
        assert_eq!(detect_format_from_bytes(&[0u8; 1024]), Some(ContainerFormat::Tar));
        assert_eq!(detect_format_from_bytes(&[0u8; 600]), None);
    }

    #[test]
    fn test_v7_tar_by_checksum() {
        let mut block = vec![0u8; 512];
        block[..5].copy_from_slice(b"hello");
        let sum: u32 = block.iter().map(|&b| u32::from(b)).sum::<u32>() + 8 * 32;
        let field = format!("{sum:06o}\0 ");
        block[148..156].copy_from_slice(field.as_bytes());
        assert_eq!(detect_format_from_bytes(&block), Some(ContainerFormat::Tar));
    }

    #[test]
    fn test_compressed_streams_are_not_containers() {
        assert_eq!(detect_format_from_bytes(&[0x1F, 0x8B, 0x08, 0x00]), None);
        assert_eq!(detect_format_from_bytes(b"BZh91AY&SY"), None);
        assert_eq!(detect_format_from_bytes(b"plain text"), None);
    }
}
