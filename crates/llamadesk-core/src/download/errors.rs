//! Download error taxonomy.
//!
//! Errors are serializable and hold no foreign error types, so adapters map
//! their transport errors into these variants at the boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Broad grouping of download failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// No or lost connectivity.
    Transport,
    /// Backend unreachable or returned an error.
    Backend,
    /// Not enough room on disk.
    Storage,
    /// Anything else.
    Unclassified,
}

/// Error type for a single model download.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadError {
    /// Reachability probe failed before the download started.
    #[error("No internet connection")]
    NoConnection,

    /// Connectivity dropped while the stream was open.
    #[error("Connection lost: {message}")]
    ConnectionLost { message: String },

    /// The backend on this machine refused the connection.
    #[error("Local backend unreachable at {url}")]
    LocalBackendUnreachable { url: String },

    /// A backend on another host refused the connection.
    #[error("Remote backend unreachable at {url}")]
    RemoteBackendUnreachable { url: String },

    /// The backend answered with a non-success HTTP status.
    #[error("Backend error (HTTP {status_code}): {message}")]
    Api { status_code: u16, message: String },

    /// Pre-flight check found too little free space.
    #[error("Insufficient disk space: {required_bytes} bytes required")]
    InsufficientDiskSpace { required_bytes: u64 },

    /// The disk filled up mid-download.
    #[error("Disk full during download")]
    DiskFull,

    /// The stream closed without the success marker.
    #[error("Download stream ended without confirmation")]
    EndedWithoutConfirmation,

    /// The download was cancelled.
    #[error("Download cancelled")]
    Cancelled,

    /// Uncategorized error, message preserved verbatim.
    #[error("{message}")]
    Other { message: String },
}

impl DownloadError {
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Self::ConnectionLost {
            message: message.into(),
        }
    }

    /// Create a backend-unreachable error, local or remote depending on `is_remote`.
    pub fn backend_unreachable(url: impl Into<String>, is_remote: bool) -> Self {
        let url = url.into();
        if is_remote {
            Self::RemoteBackendUnreachable { url }
        } else {
            Self::LocalBackendUnreachable { url }
        }
    }

    /// Create an API error with an HTTP status code.
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status_code,
            message: message.into(),
        }
    }

    pub const fn insufficient_disk_space(required_bytes: u64) -> Self {
        Self::InsufficientDiskSpace { required_bytes }
    }

    /// Create an uncategorized error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Check if this error represents a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Category of this error. `None` for cancellation, which is not a failure.
    #[must_use]
    pub const fn category(&self) -> Option<ErrorCategory> {
        match self {
            Self::NoConnection | Self::ConnectionLost { .. } => Some(ErrorCategory::Transport),
            Self::LocalBackendUnreachable { .. }
            | Self::RemoteBackendUnreachable { .. }
            | Self::Api { .. }
            | Self::EndedWithoutConfirmation => Some(ErrorCategory::Backend),
            Self::InsufficientDiskSpace { .. } | Self::DiskFull => Some(ErrorCategory::Storage),
            Self::Other { .. } => Some(ErrorCategory::Unclassified),
            Self::Cancelled => None,
        }
    }
}
