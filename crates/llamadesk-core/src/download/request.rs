//! Observable model download request.
//!
//! A [`DownloadRequest`] is shared as `Arc` between the caller and the queue.
//! Its progress lives in a `watch` channel: the queue writes with
//! `send_modify`, any number of observers `subscribe`.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::speed::ThroughputEstimator;
use crate::work::{CancellationHandle, CancellationReason, WorkItem};

/// Lifecycle state of a download request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadState {
    /// Not submitted, or reset after a failure or cancellation.
    #[default]
    Downloadable,
    /// Waiting in the FIFO.
    Queued,
    /// Receiving progress chunks.
    Downloading,
    /// The backend confirmed success.
    Downloaded,
    /// Failed; the status carries a localized message.
    Failed,
    /// Reserved for pause/resume.
    Paused,
    /// The stream ended without the backend confirming success.
    Unconfirmed,
}

impl DownloadState {
    /// Get the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Downloadable => "downloadable",
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Downloaded => "downloaded",
            Self::Failed => "failed",
            Self::Paused => "paused",
            Self::Unconfirmed => "unconfirmed",
        }
    }

    /// Parse from string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "downloadable" => Some(Self::Downloadable),
            "queued" => Some(Self::Queued),
            "downloading" => Some(Self::Downloading),
            "downloaded" => Some(Self::Downloaded),
            "failed" => Some(Self::Failed),
            "paused" => Some(Self::Paused),
            "unconfirmed" => Some(Self::Unconfirmed),
            _ => None,
        }
    }

    /// Whether no further progress will happen without a resubmission.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Downloaded | Self::Failed | Self::Unconfirmed)
    }
}

impl fmt::Display for DownloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown download state: {s}"))
    }
}

/// State plus the localized message shown for failures.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadStatus {
    pub state: DownloadState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DownloadStatus {
    #[must_use]
    pub const fn new(state: DownloadState) -> Self {
        Self {
            state,
            message: None,
        }
    }

    /// A `Failed` status with a user-facing message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: DownloadState::Failed,
            message: Some(message.into()),
        }
    }

    /// An `Unconfirmed` status with a user-facing message.
    pub fn unconfirmed(message: impl Into<String>) -> Self {
        Self {
            state: DownloadState::Unconfirmed,
            message: Some(message.into()),
        }
    }
}

/// Observable fields of a request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub status: DownloadStatus,
    /// Bytes received for the current part.
    pub downloaded_bytes: u64,
    /// Size of the current part, once the backend reports it.
    pub total_bytes: Option<u64>,
    /// Number of distinct parts seen (layers with different totals).
    pub part_count: u32,
    /// Smoothed throughput in MB/s.
    pub speed_mbps: f64,
}

impl DownloadProgress {
    /// Fraction complete for the current part, if the total is known.
    #[must_use]
    #[expect(
        clippy::cast_precision_loss,
        reason = "progress ratio for display only"
    )]
    pub fn fraction(&self) -> Option<f64> {
        self.total_bytes
            .filter(|&total| total > 0)
            .map(|total| self.downloaded_bytes as f64 / total as f64)
    }
}

/// One model pull.
#[derive(Debug)]
pub struct DownloadRequest {
    model_name: String,
    cancellation: CancellationHandle,
    progress: watch::Sender<DownloadProgress>,
    estimator: Mutex<ThroughputEstimator>,
}

impl DownloadRequest {
    pub fn new(model_name: impl Into<String>) -> Self {
        let (progress, _) = watch::channel(DownloadProgress::default());
        Self {
            model_name: model_name.into(),
            cancellation: CancellationHandle::new(),
            progress,
            estimator: Mutex::new(ThroughputEstimator::new()),
        }
    }

    /// Convenience constructor returning the `Arc` the queue expects.
    pub fn shared(model_name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(model_name))
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Observe field changes.
    pub fn subscribe(&self) -> watch::Receiver<DownloadProgress> {
        self.progress.subscribe()
    }

    /// Snapshot of the current progress.
    pub fn progress(&self) -> DownloadProgress {
        self.progress.borrow().clone()
    }

    pub fn status(&self) -> DownloadStatus {
        self.progress.borrow().status.clone()
    }

    pub fn state(&self) -> DownloadState {
        self.progress.borrow().status.state
    }

    /// Mutate progress fields and notify observers once.
    pub fn update(&self, modify: impl FnOnce(&mut DownloadProgress)) {
        self.progress.send_modify(modify);
    }

    /// Replace the status.
    pub fn set_status(&self, status: DownloadStatus) {
        self.update(|p| p.status = status);
    }

    /// Feed the cumulative byte count into the estimator and return MB/s.
    pub fn record_speed(&self, cumulative_bytes: u64) -> f64 {
        self.estimator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .calculate_speed(cumulative_bytes)
    }

    /// Zero the reported speed and forget the estimator window.
    pub fn reset_speed(&self) {
        self.estimator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
        self.update(|p| p.speed_mbps = 0.0);
    }

    /// Mark the request as waiting in the queue, clearing any previous message.
    pub fn mark_queued(&self) {
        self.set_status(DownloadStatus::new(DownloadState::Queued));
    }

    /// Cancel this request only.
    ///
    /// Only a `Queued` or `Downloading` request has anything to cancel. In
    /// any other state this is a no-op, so the handle stays usable for the
    /// next submission.
    pub fn cancel(&self) {
        if !matches!(
            self.state(),
            DownloadState::Queued | DownloadState::Downloading
        ) {
            return;
        }
        WorkItem::cancel(self, CancellationReason::User);
    }

    /// Clear status and counters and renew the cancellation handle so the
    /// request can be enqueued again.
    pub fn reset(&self) {
        self.estimator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reset();
        self.cancellation.renew();
        self.progress.send_replace(DownloadProgress::default());
    }
}

impl WorkItem for DownloadRequest {
    fn cancellation(&self) -> &CancellationHandle {
        &self.cancellation
    }
}
