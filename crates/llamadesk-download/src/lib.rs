//! Model download queue for llamadesk.
//!
//! - `processor` - pull stream consumption, progress and failure mapping
//! - `queue` - `DownloadQueue`, the caller-facing API

// Re-export core types for convenience
pub use llamadesk_core::download::{
    DownloadError, DownloadProgress, DownloadRequest, DownloadState, DownloadStatus,
};
pub use llamadesk_core::work::{QueueConfig, QueueError};

mod processor;
mod queue;

pub use processor::{ModelPullProcessor, failure_status, message_for};
pub use queue::DownloadQueue;
