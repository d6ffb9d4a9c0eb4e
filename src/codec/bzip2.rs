//! BZip2 via the `bzip2` crate.

use std::io::{self, Read, Write};

use bzip2::Compression;
use bzip2::read::BzDecoder;
use bzip2::write::BzEncoder;

/// Compresses `data` into a bzip2 stream.
pub fn compress(data: &[u8], level: u32) -> io::Result<Vec<u8>> {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::new(level.clamp(1, 9)));
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decodes a bzip2 stream.
pub fn decompress(packed: &[u8]) -> io::Result<Vec<u8>> {
    let mut output = Vec::new();
    BzDecoder::new(packed).read_to_end(&mut output)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let data = b"bzip2 block sorting".repeat(50);
        let packed = compress(&data, 9).unwrap();
        assert!(packed.starts_with(b"BZh9"));
        assert_eq!(decompress(&packed).unwrap(), data);
    }
}
