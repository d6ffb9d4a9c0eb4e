//! Output formatting for CLI operations.

use std::path::Path;

use archslip::WriteSummary;

/// Formats the verbose report printed after an archive is written.
pub fn format_summary(path: &Path, summary: &WriteSummary) -> String {
    let mut output = format!(
        "[*] Archive {} (type: {}, compression: {})\n",
        path.display(),
        summary.format,
        summary.compression
    );
    output.push_str("[*] Files added to the archive:\n");
    for name in &summary.members {
        output.push_str(name);
        output.push('\n');
    }
    output.push_str(&format!(
        "[+] Success! {} created ({} new entries, {} symlinks, {})\n",
        path.display(),
        summary.entries_written,
        summary.symlinks_written,
        humanize_bytes(summary.archive_size)
    ));
    output
}

/// Formats a byte count for humans.
pub fn humanize_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
