//! Compression codec wrappers.
//!
//! The writers treat codecs as opaque byte transforms: a whole entry payload
//! goes in, a complete compressed stream comes out. Each codec lives behind
//! its cargo feature; asking for a compiled-out codec returns
//! [`Error::CodecUnavailable`].

#[cfg(feature = "lzma")]
pub mod lzma;

#[cfg(feature = "deflate")]
pub mod deflate;

#[cfg(feature = "bzip2")]
pub mod bzip2;

#[cfg(feature = "ppmd")]
pub mod ppmd;

#[cfg(feature = "zstd")]
pub mod zstd;

#[cfg(feature = "brotli")]
pub mod brotli;

use crate::{CompressionMethod, Error, Result};

/// 7z coder method ids.
pub mod method {
    /// Copy (no compression).
    pub const COPY: &[u8] = &[0x00];
    /// LZMA.
    pub const LZMA: &[u8] = &[0x03, 0x01, 0x01];
    /// LZMA2.
    pub const LZMA2: &[u8] = &[0x21];
    /// PPMd.
    pub const PPMD: &[u8] = &[0x03, 0x04, 0x01];
    /// Deflate.
    pub const DEFLATE: &[u8] = &[0x04, 0x01, 0x08];
    /// BZip2.
    pub const BZIP2: &[u8] = &[0x04, 0x02, 0x02];
    /// Zstandard (7-Zip ZS id).
    pub const ZSTD: &[u8] = &[0x04, 0xF7, 0x11, 0x01];
    /// Brotli (7-Zip ZS id).
    pub const BROTLI: &[u8] = &[0x04, 0xF7, 0x11, 0x02];
    /// 7zAES; recognised only to reject encrypted headers.
    pub const AES: &[u8] = &[0x06, 0xF1, 0x07, 0x01];
}

/// Tuning knobs for every codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecOptions {
    /// LZMA and LZMA2 preset (0-9).
    pub lzma_preset: u32,
    /// Deflate level (0-9).
    pub deflate_level: u32,
    /// BZip2 block size level (1-9).
    pub bzip2_level: u32,
    /// Zstandard level.
    pub zstd_level: i32,
    /// Brotli quality (0-11).
    pub brotli_quality: u32,
    /// Brotli window size as log2.
    pub brotli_window: u32,
    /// PPMd model order.
    pub ppmd_order: u32,
    /// PPMd model memory in bytes.
    pub ppmd_mem_size: u32,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            lzma_preset: 6,
            deflate_level: 6,
            bzip2_level: 9,
            zstd_level: 3,
            brotli_quality: 11,
            brotli_window: 22,
            ppmd_order: 6,
            ppmd_mem_size: 16 << 20,
        }
    }
}

/// Compresses a complete payload.
///
/// `None` and `Copy` return the data unchanged. LZMA output is a raw stream
/// with an end marker; its 5 property bytes come from [`coder_properties`].
///
/// # Errors
///
/// Returns [`Error::CodecUnavailable`] if the codec is compiled out and
/// [`Error::Io`] if the codec fails.
#[allow(unused_variables)]
pub fn compress(method: CompressionMethod, data: &[u8], options: &CodecOptions) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None | CompressionMethod::Copy => Ok(data.to_vec()),
        #[cfg(feature = "lzma")]
        CompressionMethod::Lzma => Ok(lzma::compress_lzma(data, options.lzma_preset)?),
        #[cfg(feature = "lzma")]
        CompressionMethod::Lzma2 => Ok(lzma::compress_lzma2(data, options.lzma_preset)?),
        #[cfg(feature = "deflate")]
        CompressionMethod::Deflate => Ok(deflate::compress(data, options.deflate_level)?),
        #[cfg(feature = "bzip2")]
        CompressionMethod::Bzip2 => Ok(bzip2::compress(data, options.bzip2_level)?),
        #[cfg(feature = "ppmd")]
        CompressionMethod::Ppmd => Ok(ppmd::compress(
            data,
            options.ppmd_order,
            options.ppmd_mem_size,
        )?),
        #[cfg(feature = "zstd")]
        CompressionMethod::Zstandard => Ok(zstd::compress(data, options.zstd_level)?),
        #[cfg(feature = "brotli")]
        CompressionMethod::Brotli => Ok(brotli::compress(
            data,
            options.brotli_quality,
            options.brotli_window,
        )?),
        #[allow(unreachable_patterns)]
        other => Err(Error::CodecUnavailable { method: other }),
    }
}

/// Returns the coder properties a 7z folder records for `method`.
///
/// LZMA carries 5 bytes (props byte and dictionary size), LZMA2 one
/// dictionary byte and PPMd 5 bytes (order and memory size). The other
/// methods carry none.
#[allow(unused_variables)]
pub fn coder_properties(method: CompressionMethod, options: &CodecOptions) -> Option<Vec<u8>> {
    match method {
        #[cfg(feature = "lzma")]
        CompressionMethod::Lzma => Some(lzma::lzma_properties(options.lzma_preset).to_vec()),
        #[cfg(feature = "lzma")]
        CompressionMethod::Lzma2 => Some(vec![lzma::lzma2_properties(options.lzma_preset)]),
        CompressionMethod::Ppmd => {
            let mut props = vec![options.ppmd_order as u8];
            props.extend_from_slice(&options.ppmd_mem_size.to_le_bytes());
            Some(props)
        }
        _ => None,
    }
}

/// Decompresses one single-coder 7z stream.
///
/// Used to decode encoded archive headers when appending and to read
/// entries back for inspection.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFeature`] for unknown or encrypting coders,
/// [`Error::CodecUnavailable`] for compiled-out codecs and [`Error::Io`] for
/// corrupt data.
#[allow(unused_variables)]
pub fn decompress(
    method_id: &[u8],
    properties: Option<&[u8]>,
    packed: &[u8],
    unpack_size: u64,
) -> Result<Vec<u8>> {
    let props = properties.unwrap_or_default();
    let data = match method_id {
        method::COPY => packed.to_vec(),
        #[cfg(feature = "lzma")]
        method::LZMA => lzma::decompress_lzma(packed, props, unpack_size)?,
        #[cfg(feature = "lzma")]
        method::LZMA2 => lzma::decompress_lzma2(packed, props, unpack_size)?,
        #[cfg(feature = "deflate")]
        method::DEFLATE => deflate::decompress(packed)?,
        #[cfg(feature = "bzip2")]
        method::BZIP2 => bzip2::decompress(packed)?,
        #[cfg(feature = "ppmd")]
        method::PPMD => ppmd::decompress(packed, props, unpack_size)?,
        #[cfg(feature = "zstd")]
        method::ZSTD => zstd::decompress(packed)?,
        #[cfg(feature = "brotli")]
        method::BROTLI => brotli::decompress(packed)?,
        method::AES => {
            return Err(Error::UnsupportedFeature {
                feature: "encrypted 7z streams",
            });
        }
        other => {
            return match method_from_id(other) {
                Some(method) => Err(Error::CodecUnavailable { method }),
                None => Err(Error::UnsupportedFeature {
                    feature: "7z coder method",
                }),
            };
        }
    };
    if data.len() as u64 != unpack_size {
        return Err(Error::InvalidFormat(format!(
            "decoded {} bytes, expected {}",
            data.len(),
            unpack_size
        )));
    }
    Ok(data)
}

/// Maps a 7z method id back to a compression method.
pub fn method_from_id(id: &[u8]) -> Option<CompressionMethod> {
    CompressionMethod::ALL
        .into_iter()
        .find(|m| m.sevenz_method_id() == Some(id))
}
