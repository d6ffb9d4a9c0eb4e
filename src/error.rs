//! Error types for payload archive construction.
//!
//! This module provides the [`Error`] enum which represents every way building
//! a payload archive can fail, along with a convenient [`Result<T>`] alias.
//!
//! # Propagation
//!
//! Only one condition heals itself: asking for a compression method the
//! container cannot carry. [`CompressionCatalog::resolve`] swallows
//! [`Error::UnsupportedCompression`] and substitutes the format default.
//! Every other error aborts the current operation and is returned as-is.
//!
//! ```rust,no_run
//! use archslip::{CompressionMethod, ContainerFormat, EntryDescriptor, Error, OpenMode};
//!
//! fn build(path: &str) -> archslip::Result<()> {
//!     let mut writer = archslip::open(path, ContainerFormat::Zip, CompressionMethod::Deflate, OpenMode::Write)?;
//!     writer.add(&EntryDescriptor::regular("../../evil.txt", b"pwned".to_vec()))?;
//!     match writer.close() {
//!         Ok(summary) => println!("{} entries", summary.entries_written),
//!         Err(Error::Io(e)) => eprintln!("disk error: {e}"),
//!         Err(e) => return Err(e),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! [`CompressionCatalog::resolve`]: crate::CompressionCatalog::resolve

use std::io;

use crate::catalog::{CompressionMethod, ContainerFormat};

/// The main error type for archive construction.
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | Configuration | [`UnsupportedCompression`][Self::UnsupportedCompression], [`Validation`][Self::Validation] | Bad caller input |
/// | Cloning | [`CloneSourceInvalid`][Self::CloneSourceInvalid], [`InvalidFormat`][Self::InvalidFormat] | Unrecognised or damaged source archive |
/// | Writing | [`Encoding`][Self::Encoding], [`WriterAborted`][Self::WriterAborted] | Codec or header failure |
/// | Compatibility | [`UnsupportedFeature`][Self::UnsupportedFeature], [`CodecUnavailable`][Self::CodecUnavailable] | Missing features |
/// | I/O | [`Io`][Self::Io] | File system operations |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred while reading or writing an archive file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested compression method cannot be stored in the container.
    ///
    /// Writers never return this directly; they resolve it to the format
    /// default and log a warning instead.
    #[error("compression {method} is not supported by {format} archives")]
    UnsupportedCompression {
        /// The container format that was requested.
        format: ContainerFormat,
        /// The compression method that was requested.
        method: CompressionMethod,
    },

    /// Required inputs are missing or contradictory.
    ///
    /// Raised before any archive file is created.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The clone source is not an archive this crate can append to.
    #[error("cannot clone {path}: {reason}")]
    CloneSourceInvalid {
        /// Path of the source archive.
        path: String,
        /// Why the source was rejected.
        reason: String,
    },

    /// A codec or header encoder failed while writing an entry.
    #[error("failed to encode entry '{entry}': {reason}")]
    Encoding {
        /// Name of the entry being written.
        entry: String,
        /// Description of the failure.
        reason: String,
    },

    /// An existing archive has an invalid structure.
    #[error("invalid archive structure: {0}")]
    InvalidFormat(String),

    /// The archive uses a feature this crate does not handle.
    #[error("unsupported feature: {feature}")]
    UnsupportedFeature {
        /// Description of the unsupported feature.
        feature: &'static str,
    },

    /// The codec for a compression method was disabled at compile time.
    #[error("codec for {method} is not compiled in")]
    CodecUnavailable {
        /// The method whose codec is missing.
        method: CompressionMethod,
    },

    /// The writer was poisoned by an earlier failure and refuses further work.
    #[error("writer aborted after an earlier failure")]
    WriterAborted,
}

impl Error {
    /// Builds an [`Error::Encoding`] for `entry` from any displayable cause.
    pub fn encoding(entry: &str, cause: impl std::fmt::Display) -> Self {
        Error::Encoding {
            entry: entry.to_string(),
            reason: cause.to_string(),
        }
    }

    /// Builds an [`Error::CloneSourceInvalid`] for `path`.
    pub fn clone_source(path: &std::path::Path, reason: impl Into<String>) -> Self {
        Error::CloneSourceInvalid {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error was raised by input validation.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }

    /// Returns `true` if a clone source was rejected.
    pub fn is_clone_source_invalid(&self) -> bool {
        matches!(self, Error::CloneSourceInvalid { .. })
    }

    /// Returns `true` if writing an entry failed or the writer is poisoned.
    pub fn is_encoding(&self) -> bool {
        matches!(self, Error::Encoding { .. } | Error::WriterAborted)
    }

    /// Returns `true` if this is an I/O error.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// Returns `true` if this error is related to unsupported features or codecs.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedCompression { .. }
                | Error::UnsupportedFeature { .. }
                | Error::CodecUnavailable { .. }
        )
    }
}

/// A specialized Result type for archive construction.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_from() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "read-only");
        let err: Error = io_err.into();
        assert!(err.is_io());
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_unsupported_compression_message() {
        let err = Error::UnsupportedCompression {
            format: ContainerFormat::Zip,
            method: CompressionMethod::Lzma2,
        };
        assert_eq!(
            err.to_string(),
            "compression lzma2 is not supported by zip archives"
        );
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_clone_source_helper() {
        let err = Error::clone_source(std::path::Path::new("/tmp/a.bin"), "unrecognized container");
        assert!(err.is_clone_source_invalid());
        assert_eq!(
            err.to_string(),
            "cannot clone /tmp/a.bin: unrecognized container"
        );
    }

    #[test]
    fn test_encoding_helper() {
        let err = Error::encoding("../x", "stream closed");
        assert!(err.is_encoding());
        assert!(err.to_string().contains("'../x'"));
        assert!(Error::WriterAborted.is_encoding());
    }

    #[test]
    fn test_validation() {
        let err = Error::Validation("nothing to write".into());
        assert!(err.is_validation());
        assert!(!err.is_io());
    }
}
