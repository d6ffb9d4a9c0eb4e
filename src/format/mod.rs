//! On-disk format constants and container detection.
//!
//! The 7z property and attribute ids live here; zip and tar keep their
//! record layouts next to their writers.

pub mod bytes;
pub mod detect;

/// The 7z file signature: `'7' 'z' 0xBC 0xAF 0x27 0x1C`.
pub const SIGNATURE: &[u8; 6] = &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];

/// Size of the 7z signature header.
///
/// Signature (6), version (2), start header CRC (4), next header offset (8),
/// next header size (8), next header CRC (4).
pub const SIGNATURE_HEADER_SIZE: u64 = 32;

/// 7z format version written by this crate (major, minor).
pub const VERSION: [u8; 2] = [0, 4];

/// Property ids used in 7z headers.
pub mod property_id {
    /// End of a property list.
    pub const END: u8 = 0x00;
    /// Plain header.
    pub const HEADER: u8 = 0x01;
    /// Archive properties.
    pub const ARCHIVE_PROPERTIES: u8 = 0x02;
    /// Additional streams info.
    pub const ADDITIONAL_STREAMS_INFO: u8 = 0x03;
    /// Main streams info.
    pub const MAIN_STREAMS_INFO: u8 = 0x04;
    /// Files info.
    pub const FILES_INFO: u8 = 0x05;
    /// Pack info.
    pub const PACK_INFO: u8 = 0x06;
    /// Unpack info.
    pub const UNPACK_INFO: u8 = 0x07;
    /// Substreams info.
    pub const SUBSTREAMS_INFO: u8 = 0x08;
    /// Sizes.
    pub const SIZE: u8 = 0x09;
    /// CRC-32 digests.
    pub const CRC: u8 = 0x0A;
    /// Folder list.
    pub const FOLDER: u8 = 0x0B;
    /// Coder output sizes.
    pub const CODERS_UNPACK_SIZE: u8 = 0x0C;
    /// Substream counts per folder.
    pub const NUM_UNPACK_STREAM: u8 = 0x0D;
    /// Entries without a data stream.
    pub const EMPTY_STREAM: u8 = 0x0E;
    /// Empty entries that are files rather than directories.
    pub const EMPTY_FILE: u8 = 0x0F;
    /// Anti items.
    pub const ANTI: u8 = 0x10;
    /// UTF-16LE names.
    pub const NAME: u8 = 0x11;
    /// Creation times.
    pub const CTIME: u8 = 0x12;
    /// Access times.
    pub const ATIME: u8 = 0x13;
    /// Modification times.
    pub const MTIME: u8 = 0x14;
    /// Windows attributes (high 16 bits carry the Unix mode).
    pub const WIN_ATTRIBUTES: u8 = 0x15;
    /// Archive comment.
    pub const COMMENT: u8 = 0x16;
    /// Compressed header.
    pub const ENCODED_HEADER: u8 = 0x17;
    /// Start positions.
    pub const START_POS: u8 = 0x18;
    /// Padding.
    pub const DUMMY: u8 = 0x19;
}

/// 7z entry attribute bits.
pub mod attributes {
    /// Directory.
    pub const DIRECTORY: u32 = 0x10;
    /// Archive bit, set on every regular entry.
    pub const ARCHIVE: u32 = 0x20;
    /// Windows reparse point.
    pub const REPARSE_POINT: u32 = 0x400;
    /// The high 16 bits hold a Unix `st_mode`.
    pub const UNIX_EXTENSION: u32 = 0x8000;
}
