//! Raw Deflate via `flate2`.

use std::io::{self, Read, Write};

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;

/// Compresses `data` into a raw Deflate stream.
pub fn compress(data: &[u8], level: u32) -> io::Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level.min(9)));
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decodes a raw Deflate stream.
pub fn decompress(packed: &[u8]) -> io::Result<Vec<u8>> {
    let mut output = Vec::new();
    DeflateDecoder::new(packed).read_to_end(&mut output)?;
    Ok(output)
}
