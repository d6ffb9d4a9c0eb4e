//! Fuzz target for container detection.
//!
//! Run with: cargo +nightly fuzz run detect

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = archslip::detect_format_from_bytes(data);
});
