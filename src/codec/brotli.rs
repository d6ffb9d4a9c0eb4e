//! Brotli via the `brotli` crate.

use std::io::{self, Read, Write};

use brotli::enc::BrotliEncoderParams;
use brotli::{CompressorWriter, Decompressor};

const BUFFER_SIZE: usize = 4096;

/// Compresses `data` with the given quality and window size.
pub fn compress(data: &[u8], quality: u32, lg_window_size: u32) -> io::Result<Vec<u8>> {
    let params = BrotliEncoderParams {
        quality: quality.min(11) as i32,
        lgwin: lg_window_size.clamp(10, 24) as i32,
        ..Default::default()
    };
    let mut writer = CompressorWriter::with_params(Vec::new(), BUFFER_SIZE, &params);
    writer.write_all(data)?;
    Ok(writer.into_inner())
}

/// Decodes a brotli stream.
pub fn decompress(packed: &[u8]) -> io::Result<Vec<u8>> {
    let mut output = Vec::new();
    Decompressor::new(packed, BUFFER_SIZE).read_to_end(&mut output)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let data = b"brotli window".repeat(40);
        let packed = compress(&data, 11, 22).unwrap();
        assert_eq!(decompress(&packed).unwrap(), data);
    }
}
