//! Zstandard via the `zstd` crate.

use std::io::{self, Write};

/// Compresses `data` into a single zstd frame.
pub fn compress(data: &[u8], level: i32) -> io::Result<Vec<u8>> {
    let mut encoder = zstd::stream::Encoder::new(Vec::new(), level)?;
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decodes every frame in `packed`.
pub fn decompress(packed: &[u8]) -> io::Result<Vec<u8>> {
    zstd::stream::decode_all(packed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let data = b"zstandard".repeat(64);
        let packed = compress(&data, 3).unwrap();
        assert_eq!(&packed[..4], &[0x28, 0xB5, 0x2F, 0xFD]);
        assert_eq!(decompress(&packed).unwrap(), data);
    }
}
