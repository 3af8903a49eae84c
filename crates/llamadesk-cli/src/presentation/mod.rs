//! Terminal rendering.

pub mod progress;
