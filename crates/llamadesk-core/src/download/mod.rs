//! Download domain types.

mod errors;
mod request;

pub use errors::{DownloadError, ErrorCategory};
pub use request::{DownloadProgress, DownloadRequest, DownloadState, DownloadStatus};
