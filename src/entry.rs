//! Logical entry descriptions shared by every writer.

use crate::Timestamp;

/// Unix file-type and permission bits used in entry metadata.
pub mod unix_mode {
    /// File-type mask.
    pub const S_IFMT: u32 = 0o170000;
    /// Regular file.
    pub const S_IFREG: u32 = 0o100000;
    /// Symbolic link.
    pub const S_IFLNK: u32 = 0o120000;
    /// Permission bits including setuid, setgid and sticky.
    pub const PERMISSIONS: u32 = 0o7777;
    /// Default permissions of a regular entry.
    pub const DEFAULT_FILE: u32 = 0o644;
    /// Default permissions of a symlink entry.
    pub const DEFAULT_SYMLINK: u32 = 0o777;
}

/// Whether an entry is a regular file or a symbolic link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A file whose payload is the entry content.
    Regular,
    /// A symlink whose payload is the link target.
    Symlink,
}

/// A request to add one archive member.
///
/// `name` is written verbatim. Traversal sequences, absolute paths and
/// backslashes are kept exactly as given.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDescriptor {
    /// Member name.
    pub name: String,
    /// Regular file or symlink.
    pub kind: EntryKind,
    /// File bytes for regular entries, the link target for symlinks.
    pub content: Vec<u8>,
    /// Modification time; the current time when `None`.
    pub timestamp: Option<Timestamp>,
    /// Permission bits override.
    pub mode: Option<u32>,
}

impl EntryDescriptor {
    /// Describes a regular file.
    pub fn regular(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Regular,
            content: content.into(),
            timestamp: None,
            mode: None,
        }
    }

    /// Describes a symlink pointing at `target`.
    pub fn symlink(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Symlink,
            content: target.into().into_bytes(),
            timestamp: None,
            mode: None,
        }
    }

    /// Sets the modification time.
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the permission bits.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Returns `true` for symlink entries.
    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }
}

/// Normalised per-entry metadata handed to [`ArchiveWriter::add_entry`].
///
/// Produced by [`ArchiveWriter::make_entry_header`]; each writer turns it
/// into its native header record when the entry is added.
///
/// [`ArchiveWriter::add_entry`]: crate::ArchiveWriter::add_entry
/// [`ArchiveWriter::make_entry_header`]: crate::ArchiveWriter::make_entry_header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    /// Member name, unmodified.
    pub name: String,
    /// Modification time.
    pub timestamp: Timestamp,
    /// Permission bits override.
    pub mode: Option<u32>,
}

impl EntryHeader {
    /// Creates a header, stamping the current time when none is given.
    pub fn new(name: impl Into<String>, timestamp: Option<Timestamp>) -> Self {
        Self {
            name: name.into(),
            timestamp: timestamp.unwrap_or_else(Timestamp::now),
            mode: None,
        }
    }

    /// Sets the permission bits.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Returns the full Unix mode (type and permission bits) for this entry.
    pub fn unix_mode(&self, as_symlink: bool) -> u32 {
        let (file_type, default) = if as_symlink {
            (unix_mode::S_IFLNK, unix_mode::DEFAULT_SYMLINK)
        } else {
            (unix_mode::S_IFREG, unix_mode::DEFAULT_FILE)
        };
        file_type | (self.mode.unwrap_or(default) & unix_mode::PERMISSIONS)
    }
}
