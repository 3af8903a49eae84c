//! Core domain types, the generic work queue and port definitions for llamadesk.
//!
//! Adapters (Ollama HTTP client, disk probe, CLI) depend on this crate; it
//! depends on none of them.

#![deny(unused_crate_dependencies)]

pub mod download;
pub mod paths;
pub mod ports;
pub mod settings;
pub mod speed;
pub mod utils;
pub mod work;

// Re-export commonly used types for convenience
pub use download::{
    DownloadError, DownloadProgress, DownloadRequest, DownloadState, DownloadStatus,
    ErrorCategory,
};
pub use paths::{ConfigError, config_dir, load_settings, save_settings, settings_path};
pub use ports::{
    AlwaysReachable, DiskSpacePort, EnglishCatalog, LocalizeError, LocalizerPort, MessageKey,
    ModelPullPort, NetworkReachabilityPort, PullChunk, PullStream,
};
pub use settings::{Settings, SettingsError, SettingsUpdate, validate_settings};
pub use speed::ThroughputEstimator;
pub use work::{
    BoundedWorkQueue, CancellationHandle, CancellationReason, QueueConfig, QueueError,
    WorkItem, WorkProcessor, run_with_deadline,
};
