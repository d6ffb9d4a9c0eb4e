//! PPMd variant H (7z flavour) via `ppmd-rust`.
//!
//! 7z records the unpacked size, so streams are written without an end
//! marker and decoding stops after exactly `unpack_size` bytes.

use std::io::{self, Read, Write};

use ppmd_rust::{PPMD7_MAX_MEM_SIZE, PPMD7_MAX_ORDER, PPMD7_MIN_MEM_SIZE, PPMD7_MIN_ORDER};
use ppmd_rust::{Ppmd7Decoder, Ppmd7Encoder};

fn codec_error(e: impl std::fmt::Debug) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, format!("{e:?}"))
}

fn check_params(order: u32, mem_size: u32) -> io::Result<()> {
    if !(PPMD7_MIN_ORDER..=PPMD7_MAX_ORDER).contains(&order) {
        return Err(codec_error(format!("PPMd order {order} out of range")));
    }
    if !(PPMD7_MIN_MEM_SIZE..=PPMD7_MAX_MEM_SIZE).contains(&mem_size) {
        return Err(codec_error(format!("PPMd memory size {mem_size} out of range")));
    }
    Ok(())
}

/// Compresses `data` with the given model order and memory size.
pub fn compress(data: &[u8], order: u32, mem_size: u32) -> io::Result<Vec<u8>> {
    check_params(order, mem_size)?;
    let mut output = Vec::new();
    let mut encoder = Ppmd7Encoder::new(&mut output, order, mem_size).map_err(codec_error)?;
    encoder.write_all(data)?;
    encoder.finish(false).map_err(codec_error)?;
    Ok(output)
}

/// Decodes `unpack_size` bytes using the 5-byte coder properties.
pub fn decompress(packed: &[u8], properties: &[u8], unpack_size: u64) -> io::Result<Vec<u8>> {
    let [order, m0, m1, m2, m3] = properties else {
        return Err(codec_error("PPMd properties must be 5 bytes"));
    };
    let order = u32::from(*order);
    let mem_size = u32::from_le_bytes([*m0, *m1, *m2, *m3]);
    check_params(order, mem_size)?;
    let decoder = Ppmd7Decoder::new(packed, order, mem_size).map_err(codec_error)?;
    let mut output = Vec::with_capacity(unpack_size.min(1 << 24) as usize);
    decoder.take(unpack_size).read_to_end(&mut output)?;
    Ok(output)
}
