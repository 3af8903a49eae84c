//! Disk space port.

/// Free-space check used before large downloads.
///
/// Implementations that cannot determine free space should answer `true`
/// and let the backend report real exhaustion.
pub trait DiskSpacePort: Send + Sync {
    /// Whether `required_bytes` more bytes fit on the download volume.
    fn has_enough_space(&self, required_bytes: u64) -> bool;
}
