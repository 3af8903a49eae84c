//! Small shared helpers.

pub mod format;

pub use format::{format_bytes, format_megabytes_per_second};
