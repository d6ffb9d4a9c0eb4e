//! LZMA and LZMA2 via `lzma-rust2`.
//!
//! Both encoders write raw streams without the `.lzma` file header. The
//! LZMA stream always ends with an end-of-stream marker so zip readers that
//! honour general-purpose bit 1 can stop without knowing the size.

use std::io::{self, Read, Write};

fn codec_error(e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}

/// Compresses `data` into a raw LZMA stream with an end marker.
pub fn compress_lzma(data: &[u8], preset: u32) -> io::Result<Vec<u8>> {
    let options = lzma_rust2::LzmaOptions::with_preset(preset.min(9));
    let mut output = Vec::new();
    let mut writer =
        lzma_rust2::LzmaWriter::new_no_header(&mut output, &options, true).map_err(codec_error)?;
    writer.write_all(data)?;
    writer.finish().map_err(codec_error)?;
    Ok(output)
}

/// Returns the 5 LZMA property bytes for `preset`.
pub fn lzma_properties(preset: u32) -> [u8; 5] {
    let options = lzma_rust2::LzmaOptions::with_preset(preset.min(9));
    let dict = options.dict_size.to_le_bytes();
    [options.get_props(), dict[0], dict[1], dict[2], dict[3]]
}

/// Compresses `data` into a raw LZMA2 stream.
pub fn compress_lzma2(data: &[u8], preset: u32) -> io::Result<Vec<u8>> {
    let options = lzma_rust2::Lzma2Options::with_preset(preset.min(9));
    let mut output = Vec::new();
    let mut writer = lzma_rust2::Lzma2Writer::new(&mut output, options);
    writer.write_all(data)?;
    writer.finish().map_err(codec_error)?;
    Ok(output)
}

/// Returns the LZMA2 dictionary property byte for `preset`.
pub fn lzma2_properties(preset: u32) -> u8 {
    let options = lzma_rust2::Lzma2Options::with_preset(preset.min(9));
    encode_lzma2_dict_size(options.lzma_options.dict_size)
}

/// Decodes a raw LZMA stream of known size.
pub fn decompress_lzma(packed: &[u8], properties: &[u8], unpack_size: u64) -> io::Result<Vec<u8>> {
    let [props, d0, d1, d2, d3] = properties else {
        return Err(codec_error("LZMA properties must be 5 bytes"));
    };
    let dict_size = u32::from_le_bytes([*d0, *d1, *d2, *d3]);
    let mut reader =
        lzma_rust2::LzmaReader::new_with_props(packed, unpack_size, *props, dict_size, None)
            .map_err(codec_error)?;
    read_sized(&mut reader, unpack_size)
}

/// Decodes a raw LZMA2 stream of known size.
pub fn decompress_lzma2(packed: &[u8], properties: &[u8], unpack_size: u64) -> io::Result<Vec<u8>> {
    let &[prop] = properties else {
        return Err(codec_error("LZMA2 properties must be 1 byte"));
    };
    let dict_size = decode_lzma2_dict_size(prop)?;
    let mut reader = lzma_rust2::Lzma2Reader::new(packed, dict_size, None);
    read_sized(&mut reader, unpack_size)
}

fn read_sized<R: Read>(reader: &mut R, unpack_size: u64) -> io::Result<Vec<u8>> {
    let mut output = Vec::with_capacity(unpack_size.min(1 << 24) as usize);
    reader.take(unpack_size).read_to_end(&mut output)?;
    Ok(output)
}

/// Decodes the LZMA2 dictionary property byte.
///
/// Even values are `2^(p/2 + 12)`, odd values `3 * 2^(p/2 + 11)`, and 40
/// means 4 GiB - 1.
fn decode_lzma2_dict_size(prop: u8) -> io::Result<u32> {
    match prop {
        0..=39 => {
            let shift = u32::from(prop / 2) + 11;
            Ok((2 | u32::from(prop & 1)) << shift)
        }
        40 => Ok(u32::MAX),
        _ => Err(codec_error(format!("invalid LZMA2 dictionary property {prop}"))),
    }
}

/// Returns the smallest property byte whose dictionary holds `dict_size`.
pub fn encode_lzma2_dict_size(dict_size: u32) -> u8 {
    (0..40u8)
        .find(|&p| decode_lzma2_dict_size(p).is_ok_and(|size| size >= dict_size))
        .unwrap_or(40)
}
