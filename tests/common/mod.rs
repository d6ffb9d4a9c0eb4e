//! Shared test utilities for integration tests.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test file
//! compiles as a separate crate and may only use a subset of these helpers.

#![allow(dead_code)]

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use archslip::{
    ArchiveType, CompressionMethod, EntryDescriptor, OpenMode, TarWrapper, WriteSummary,
};

/// Writes `entries` to `dir/name` and returns the path with the summary.
pub fn write_archive(
    dir: &Path,
    name: &str,
    archive_type: ArchiveType,
    compression: CompressionMethod,
    entries: &[EntryDescriptor],
) -> archslip::Result<(PathBuf, WriteSummary)> {
    let path = dir.join(name);
    let mut writer = archslip::open(&path, archive_type, compression, OpenMode::Write)?;
    for entry in entries {
        writer.add(entry)?;
    }
    let summary = writer.close()?;
    Ok((path, summary))
}

/// Reads a file and strips its tar compression wrapper, if any.
///
/// Requires the codec features matching `compression`.
pub fn read_unwrapped_tar(path: &Path, compression: CompressionMethod) -> Vec<u8> {
    let file = File::open(path).expect("open tar");
    let mut reader: Box<dyn Read> = match compression.tar_wrapper() {
        None | Some(TarWrapper::None) => Box::new(file),
        #[cfg(feature = "deflate")]
        Some(TarWrapper::Gzip) => Box::new(flate2::read::GzDecoder::new(file)),
        #[cfg(feature = "bzip2")]
        Some(TarWrapper::Bzip2) => Box::new(bzip2::read::BzDecoder::new(file)),
        #[cfg(feature = "xz")]
        Some(TarWrapper::Xz) => Box::new(xz2::read::XzDecoder::new(file)),
        #[allow(unreachable_patterns)]
        Some(other) => panic!("no decoder compiled in for {other:?}"),
    };
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).expect("decode tar wrapper");
    bytes
}

/// Every (archive type, declared method) pair.
pub fn all_pairs() -> Vec<(ArchiveType, CompressionMethod)> {
    let types = [
        ArchiveType::Zip,
        ArchiveType::Jar,
        ArchiveType::War,
        ArchiveType::Apk,
        ArchiveType::Ipa,
        ArchiveType::Tar,
        ArchiveType::SevenZip,
    ];
    types
        .into_iter()
        .flat_map(|t| {
            archslip::CompressionCatalog::supported_methods(t.container())
                .iter()
                .map(move |&m| (t, m))
        })
        .collect()
}
