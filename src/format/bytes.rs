//! Binary helpers for the 7z header encoding.
//!
//! 7z numbers use a prefix-length encoding: the count of leading one bits in
//! the first byte is the number of extra little-endian bytes that follow, and
//! the remaining low bits of the first byte are the most significant part.

use std::io::{self, Read};

/// Reads a 7z variable-length number.
pub fn read_number<R: Read>(r: &mut R) -> io::Result<u64> {
    let first = read_u8(r)?;
    let mut mask = 0x80u8;
    let mut value = 0u64;
    for i in 0..8 {
        if first & mask == 0 {
            let high = u64::from(first & (mask - 1));
            return Ok(value | (high << (8 * i)));
        }
        value |= u64::from(read_u8(r)?) << (8 * i);
        mask >>= 1;
    }
    Ok(value)
}

/// Appends a 7z variable-length number.
pub fn write_number(buf: &mut Vec<u8>, value: u64) {
    let mut first = 0u8;
    let mut mask = 0x80u8;
    let mut extra = 0usize;
    while extra < 8 {
        if value < 1u64 << (7 * (extra + 1)) {
            first |= (value >> (8 * extra)) as u8;
            break;
        }
        first |= mask;
        mask >>= 1;
        extra += 1;
    }
    buf.push(first);
    buf.extend_from_slice(&value.to_le_bytes()[..extra]);
}

/// Reads a number and checks it against `limit` before it is used as a count.
pub fn read_count<R: Read>(r: &mut R, limit: usize) -> io::Result<usize> {
    let value = read_number(r)?;
    if value > limit as u64 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("count {value} exceeds limit {limit}"),
        ));
    }
    Ok(value as usize)
}

/// Reads a single byte.
pub fn read_u8<R: Read>(r: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Reads a little-endian u32.
pub fn read_u32_le<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Reads a little-endian u64.
pub fn read_u64_le<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Reads `count` bytes.
pub fn read_bytes<R: Read>(r: &mut R, count: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    r.take(count as u64).read_to_end(&mut buf)?;
    if buf.len() != count {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    Ok(buf)
}

/// Reads a bit vector packed MSB-first.
pub fn read_bool_vector<R: Read>(r: &mut R, count: usize) -> io::Result<Vec<bool>> {
    let packed = read_bytes(r, count.div_ceil(8))?;
    Ok((0..count)
        .map(|i| packed[i / 8] & (0x80 >> (i % 8)) != 0)
        .collect())
}

/// Reads an "all defined" byte followed, if zero, by a bit vector.
pub fn read_all_or_bits<R: Read>(r: &mut R, count: usize) -> io::Result<Vec<bool>> {
    if read_u8(r)? != 0 {
        Ok(vec![true; count])
    } else {
        read_bool_vector(r, count)
    }
}

/// Appends a bit vector packed MSB-first.
pub fn write_bool_vector(buf: &mut Vec<u8>, bits: &[bool]) {
    let start = buf.len();
    buf.resize(start + bits.len().div_ceil(8), 0);
    for (i, _) in bits.iter().enumerate().filter(|(_, set)| **set) {
        buf[start + i / 8] |= 0x80 >> (i % 8);
    }
}

/// Appends an "all defined" marker, or a zero byte and the bit vector.
pub fn write_all_or_bits(buf: &mut Vec<u8>, bits: &[bool]) {
    if bits.iter().all(|&b| b) {
        buf.push(1);
    } else {
        buf.push(0);
        write_bool_vector(buf, bits);
    }
}
