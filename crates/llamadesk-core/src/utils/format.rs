//! Human-readable formatting for sizes and rates.
//!
//! Units are decimal (1 KB = 1000 B) to match what model registries report.

/// Format a byte count as a human-readable size (e.g., "4.1 GB").
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    #[expect(
        clippy::cast_precision_loss,
        reason = "display only, sub-byte precision is irrelevant"
    )]
    let value = bytes as f64;

    let (scaled, unit) = if value >= 1_000_000_000_000.0 {
        (value / 1_000_000_000_000.0, "TB")
    } else if value >= 1_000_000_000.0 {
        (value / 1_000_000_000.0, "GB")
    } else if value >= 1_000_000.0 {
        (value / 1_000_000.0, "MB")
    } else if value >= 1_000.0 {
        (value / 1_000.0, "KB")
    } else {
        return format!("{bytes} B");
    };
    format!("{scaled:.1} {unit}")
}

/// Format a rate given in MB/s, switching to GB/s or KB/s where it reads better.
#[must_use]
pub fn format_megabytes_per_second(mbps: f64) -> String {
    if mbps >= 1_000.0 {
        format!("{:.1} GB/s", mbps / 1_000.0)
    } else if mbps >= 1.0 {
        format!("{mbps:.1} MB/s")
    } else {
        format!("{:.0} KB/s", mbps * 1_000.0)
    }
}
