//! Fuzz target for reopening arbitrary bytes in append mode.
//!
//! Cloning parses archives supplied by the user, so every backend's append
//! parser must reject malformed input without panicking or looping.
//!
//! Run with: cargo +nightly fuzz run append_parse

#![no_main]

use std::io::Cursor;

use archslip::write::{read_sevenz_entries, read_sevenz_entry_data, read_tar_entries};
use archslip::{ArchiveWriter, EntryDescriptor, SevenZipWriter, TarWriter, ZipWriter};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let link = EntryDescriptor::symlink("fuzz", "/etc/passwd");

    if let Ok(mut writer) = ZipWriter::open_append(Cursor::new(data.to_vec()), None) {
        let _ = writer.add(&link);
        let _ = writer.finish_into_inner();
    }

    if let Ok(mut writer) = TarWriter::open_append(Cursor::new(data.to_vec())) {
        let _ = writer.add(&link);
        let _ = writer.finish_into_inner();
    }
    let _ = read_tar_entries(data);

    if let Ok(mut writer) = SevenZipWriter::open_append(Cursor::new(data.to_vec()), None) {
        let _ = writer.add(&link);
        let _ = writer.finish_into_inner();
    }
    let mut cursor = Cursor::new(data);
    if let Ok(entries) = read_sevenz_entries(&mut cursor) {
        for index in 0..entries.len() {
            let _ = read_sevenz_entry_data(&mut cursor, index);
        }
    }
});
