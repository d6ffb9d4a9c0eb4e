//! Container formats, compression methods and the rules that join them.
//!
//! Every container supports a fixed subset of [`CompressionMethod`]s. Asking
//! for anything outside that subset is answered with the container's default
//! rather than an invalid archive:
//!
//! ```rust
//! use archslip::{CompressionCatalog, CompressionMethod, ContainerFormat};
//!
//! let method = CompressionCatalog::resolve(ContainerFormat::Zip, CompressionMethod::Lzma2);
//! assert_eq!(method, CompressionMethod::Deflate);
//! ```

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Structural archive format, independent of member compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    /// PKWARE zip and its aliases (jar, war, apk, ipa).
    Zip,
    /// POSIX ustar with PAX extensions, optionally wrapped in a compressor.
    Tar,
    /// 7-Zip.
    SevenZip,
}

impl ContainerFormat {
    /// Returns the lowercase format name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::SevenZip => "7z",
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Archive type as requested by a caller.
///
/// The zip aliases share the zip container and differ only in the
/// conventional file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveType {
    /// `.zip`
    Zip,
    /// Java archive.
    Jar,
    /// Java web archive.
    War,
    /// Android package.
    Apk,
    /// iOS application archive.
    Ipa,
    /// `.tar`, optionally compressed.
    Tar,
    /// `.7z`
    SevenZip,
}

impl ArchiveType {
    /// All archive types, in display order.
    pub const ALL: [ArchiveType; 7] = [
        Self::Zip,
        Self::Tar,
        Self::SevenZip,
        Self::Jar,
        Self::War,
        Self::Apk,
        Self::Ipa,
    ];

    /// Returns the container this type is stored in.
    pub fn container(self) -> ContainerFormat {
        match self {
            Self::Zip | Self::Jar | Self::War | Self::Apk | Self::Ipa => ContainerFormat::Zip,
            Self::Tar => ContainerFormat::Tar,
            Self::SevenZip => ContainerFormat::SevenZip,
        }
    }

    /// Returns the lowercase type name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Jar => "jar",
            Self::War => "war",
            Self::Apk => "apk",
            Self::Ipa => "ipa",
            Self::Tar => "tar",
            Self::SevenZip => "7z",
        }
    }
}

impl From<ContainerFormat> for ArchiveType {
    fn from(format: ContainerFormat) -> Self {
        match format {
            ContainerFormat::Zip => Self::Zip,
            ContainerFormat::Tar => Self::Tar,
            ContainerFormat::SevenZip => Self::SevenZip,
        }
    }
}

impl fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArchiveType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .or_else(|| s.eq_ignore_ascii_case("sevenzip").then_some(Self::SevenZip))
            .ok_or_else(|| Error::Validation(format!("unknown archive type '{s}'")))
    }
}

/// Compression applied to archive members (or to the whole tar stream).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// Stored without compression (zip, tar).
    None,
    /// Deflate; gzip when wrapping a tar stream.
    Deflate,
    /// BZip2.
    Bzip2,
    /// LZMA; xz when wrapping a tar stream.
    Lzma,
    /// LZMA2 (7z only).
    Lzma2,
    /// PPMd variant H (7z only).
    Ppmd,
    /// Zstandard (7z only).
    Zstandard,
    /// Brotli (7z only).
    Brotli,
    /// 7z copy coder.
    Copy,
}

impl CompressionMethod {
    /// All methods, in display order.
    pub const ALL: [CompressionMethod; 9] = [
        Self::None,
        Self::Deflate,
        Self::Bzip2,
        Self::Lzma,
        Self::Lzma2,
        Self::Ppmd,
        Self::Zstandard,
        Self::Brotli,
        Self::Copy,
    ];

    /// Returns the lowercase method name.
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Deflate => "deflate",
            Self::Bzip2 => "bzip2",
            Self::Lzma => "lzma",
            Self::Lzma2 => "lzma2",
            Self::Ppmd => "ppmd",
            Self::Zstandard => "zstandard",
            Self::Brotli => "brotli",
            Self::Copy => "copy",
        }
    }

    /// Returns the zip method id for this compression, if zip can store it.
    pub fn zip_method_id(self) -> Option<u16> {
        match self {
            Self::None => Some(zip_method::STORED),
            Self::Deflate => Some(zip_method::DEFLATE),
            Self::Bzip2 => Some(zip_method::BZIP2),
            Self::Lzma => Some(zip_method::LZMA),
            _ => None,
        }
    }

    /// Maps a zip method id back to a compression method.
    pub fn from_zip_method_id(id: u16) -> Option<Self> {
        match id {
            zip_method::STORED => Some(Self::None),
            zip_method::DEFLATE => Some(Self::Deflate),
            zip_method::BZIP2 => Some(Self::Bzip2),
            zip_method::LZMA => Some(Self::Lzma),
            _ => None,
        }
    }

    /// Returns the 7z coder method id for this compression.
    pub fn sevenz_method_id(self) -> Option<&'static [u8]> {
        use crate::codec::method;
        match self {
            Self::Copy => Some(method::COPY),
            Self::Lzma => Some(method::LZMA),
            Self::Lzma2 => Some(method::LZMA2),
            Self::Deflate => Some(method::DEFLATE),
            Self::Bzip2 => Some(method::BZIP2),
            Self::Ppmd => Some(method::PPMD),
            Self::Zstandard => Some(method::ZSTD),
            Self::Brotli => Some(method::BROTLI),
            Self::None => None,
        }
    }

    /// Returns the stream wrapper a tar archive uses for this compression.
    pub fn tar_wrapper(self) -> Option<TarWrapper> {
        match self {
            Self::None => Some(TarWrapper::None),
            Self::Deflate => Some(TarWrapper::Gzip),
            Self::Bzip2 => Some(TarWrapper::Bzip2),
            Self::Lzma => Some(TarWrapper::Xz),
            _ => None,
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("zstd") {
            return Ok(Self::Zstandard);
        }
        Self::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Validation(format!("unknown compression method '{s}'")))
    }
}

/// Zip compression method ids.
pub mod zip_method {
    /// No compression.
    pub const STORED: u16 = 0;
    /// Deflate.
    pub const DEFLATE: u16 = 8;
    /// BZip2.
    pub const BZIP2: u16 = 12;
    /// LZMA with the 4-byte zip properties header.
    pub const LZMA: u16 = 14;
}

/// Outer compression stream around a tar archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TarWrapper {
    /// Plain tar.
    None,
    /// gzip (`.tar.gz`).
    Gzip,
    /// bzip2 (`.tar.bz2`).
    Bzip2,
    /// xz (`.tar.xz`).
    Xz,
}

const ZIP_METHODS: &[CompressionMethod] = &[
    CompressionMethod::None,
    CompressionMethod::Deflate,
    CompressionMethod::Bzip2,
    CompressionMethod::Lzma,
];

const TAR_METHODS: &[CompressionMethod] = ZIP_METHODS;

const SEVENZ_METHODS: &[CompressionMethod] = &[
    CompressionMethod::Lzma2,
    CompressionMethod::Lzma,
    CompressionMethod::Bzip2,
    CompressionMethod::Deflate,
    CompressionMethod::Ppmd,
    CompressionMethod::Zstandard,
    CompressionMethod::Brotli,
    CompressionMethod::Copy,
];

/// Static mapping between containers and compression methods.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressionCatalog;

impl CompressionCatalog {
    /// Returns the methods a container can carry.
    pub fn supported_methods(format: ContainerFormat) -> &'static [CompressionMethod] {
        match format {
            ContainerFormat::Zip => ZIP_METHODS,
            ContainerFormat::Tar => TAR_METHODS,
            ContainerFormat::SevenZip => SEVENZ_METHODS,
        }
    }

    /// Returns the method used when none (or an unsupported one) is requested.
    pub fn default_method(format: ContainerFormat) -> CompressionMethod {
        match format {
            ContainerFormat::Zip | ContainerFormat::Tar => CompressionMethod::Deflate,
            ContainerFormat::SevenZip => CompressionMethod::Lzma2,
        }
    }

    /// Returns `true` if `method` is valid for `format`.
    pub fn is_supported(format: ContainerFormat, method: CompressionMethod) -> bool {
        Self::supported_methods(format).contains(&method)
    }

    /// Checks a (format, method) pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedCompression`] if the container cannot
    /// carry the method.
    pub fn validate(format: ContainerFormat, method: CompressionMethod) -> Result<CompressionMethod> {
        if Self::is_supported(format, method) {
            Ok(method)
        } else {
            Err(Error::UnsupportedCompression { format, method })
        }
    }

    /// Returns `method` if valid for `format`, otherwise the format default.
    pub fn resolve(format: ContainerFormat, method: CompressionMethod) -> CompressionMethod {
        match Self::validate(format, method) {
            Ok(method) => method,
            Err(err) => {
                let fallback = Self::default_method(format);
                log::warn!("{err}; using {fallback}");
                fallback
            }
        }
    }

    /// Returns the conventional file extension, including the leading dot.
    ///
    /// `method` is expected to be already resolved for the archive type.
    pub fn extension(archive_type: ArchiveType, method: CompressionMethod) -> &'static str {
        match archive_type {
            ArchiveType::Tar => match method.tar_wrapper() {
                Some(TarWrapper::Gzip) => ".tar.gz",
                Some(TarWrapper::Bzip2) => ".tar.bz2",
                Some(TarWrapper::Xz) => ".tar.xz",
                Some(TarWrapper::None) | None => ".tar",
            },
            ArchiveType::Zip => match method {
                CompressionMethod::Bzip2 => ".bz2",
                CompressionMethod::Lzma => ".xz",
                _ => ".zip",
            },
            ArchiveType::SevenZip => ".7z",
            ArchiveType::Jar => ".jar",
            ArchiveType::War => ".war",
            ArchiveType::Apk => ".apk",
            ArchiveType::Ipa => ".ipa",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_supported() {
        for format in [
            ContainerFormat::Zip,
            ContainerFormat::Tar,
            ContainerFormat::SevenZip,
        ] {
            let default = CompressionCatalog::default_method(format);
            assert!(CompressionCatalog::is_supported(format, default));
        }
    }

    #[test]
    fn test_sevenz_supports_eight_methods() {
        let methods = CompressionCatalog::supported_methods(ContainerFormat::SevenZip);
        assert_eq!(methods.len(), 8);
        assert!(!methods.contains(&CompressionMethod::None));
    }

    #[test]
    fn test_resolve_falls_back() {
        assert_eq!(
            CompressionCatalog::resolve(ContainerFormat::Zip, CompressionMethod::Lzma2),
            CompressionMethod::Deflate
        );
        assert_eq!(
            CompressionCatalog::resolve(ContainerFormat::Tar, CompressionMethod::Ppmd),
            CompressionMethod::Deflate
        );
        assert_eq!(
            CompressionCatalog::resolve(ContainerFormat::SevenZip, CompressionMethod::None),
            CompressionMethod::Lzma2
        );
        assert_eq!(
            CompressionCatalog::resolve(ContainerFormat::Zip, CompressionMethod::Bzip2),
            CompressionMethod::Bzip2
        );
    }

    #[test]
    fn test_validate_reports_pair() {
        let err = CompressionCatalog::validate(ContainerFormat::Tar, CompressionMethod::Brotli)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedCompression {
                format: ContainerFormat::Tar,
                method: CompressionMethod::Brotli
            }
        ));
    }

    #[test]
    fn test_extensions() {
        use ArchiveType::*;
        use CompressionMethod as M;
        assert_eq!(CompressionCatalog::extension(Tar, M::None), ".tar");
        assert_eq!(CompressionCatalog::extension(Tar, M::Deflate), ".tar.gz");
        assert_eq!(CompressionCatalog::extension(Tar, M::Bzip2), ".tar.bz2");
        assert_eq!(CompressionCatalog::extension(Tar, M::Lzma), ".tar.xz");
        assert_eq!(CompressionCatalog::extension(Zip, M::None), ".zip");
        assert_eq!(CompressionCatalog::extension(Zip, M::Deflate), ".zip");
        assert_eq!(CompressionCatalog::extension(Zip, M::Bzip2), ".bz2");
        assert_eq!(CompressionCatalog::extension(Zip, M::Lzma), ".xz");
        assert_eq!(CompressionCatalog::extension(SevenZip, M::Ppmd), ".7z");
        assert_eq!(CompressionCatalog::extension(Apk, M::Deflate), ".apk");
    }

    #[test]
    fn test_zip_method_ids_roundtrip() {
        for &method in CompressionCatalog::supported_methods(ContainerFormat::Zip) {
            let id = method.zip_method_id().unwrap();
            assert_eq!(CompressionMethod::from_zip_method_id(id), Some(method));
        }
        assert_eq!(CompressionMethod::from_zip_method_id(99), None);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("7z".parse::<ArchiveType>().unwrap(), ArchiveType::SevenZip);
        assert_eq!("JAR".parse::<ArchiveType>().unwrap(), ArchiveType::Jar);
        assert_eq!(
            "zstd".parse::<CompressionMethod>().unwrap(),
            CompressionMethod::Zstandard
        );
        assert!("rar".parse::<ArchiveType>().unwrap_err().is_validation());
    }

    #[test]
    fn test_aliases_are_zip() {
        for t in [ArchiveType::Jar, ArchiveType::War, ArchiveType::Apk, ArchiveType::Ipa] {
            assert_eq!(t.container(), ContainerFormat::Zip);
        }
    }
}
