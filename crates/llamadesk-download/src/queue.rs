//! Download queue: the work engine bound to model pulls.

use std::sync::Arc;

use llamadesk_core::download::{DownloadRequest, DownloadStatus};
use llamadesk_core::settings::Settings;
use llamadesk_core::work::{BoundedWorkQueue, QueueConfig, QueueError};

use crate::processor::ModelPullProcessor;

/// Queue of model pulls with runtime-adjustable parallelism.
///
/// Requests are observable records: callers keep their `Arc` and
/// `subscribe()` to it rather than awaiting a result.
pub struct DownloadQueue {
    inner: BoundedWorkQueue<ModelPullProcessor>,
}

impl DownloadQueue {
    /// Create the queue. Must be called inside a tokio runtime.
    pub fn new(processor: ModelPullProcessor, config: QueueConfig) -> Self {
        tracing::debug!(
            target: "llamadesk.download",
            parallelism = config.max_parallelism,
            capacity = ?config.capacity,
            "Download queue created"
        );
        Self {
            inner: BoundedWorkQueue::new(processor, config),
        }
    }

    /// Create the queue with parallelism and capacity from settings.
    pub fn from_settings(processor: ModelPullProcessor, settings: &Settings) -> Self {
        let config = QueueConfig::default()
            .with_max_parallelism(settings.effective_max_parallel_downloads() as usize)
            .with_capacity(settings.max_queue_size.map(|n| n as usize));
        Self::new(processor, config)
    }

    /// Submit a request. It is marked `Queued` before it becomes visible to workers.
    ///
    /// On rejection the request keeps its previous status.
    pub fn enqueue(&self, request: Arc<DownloadRequest>) -> Result<(), QueueError> {
        let previous = request.status();
        request.mark_queued();

        if let Err(e) = self.inner.enqueue(Arc::clone(&request)) {
            request.set_status(previous);
            tracing::warn!(
                target: "llamadesk.download",
                model = %request.model_name(),
                error = %e,
                "Rejected download"
            );
            return Err(e);
        }

        tracing::info!(
            target: "llamadesk.download",
            model = %request.model_name(),
            queued = self.inner.queued_count(),
            "Queued download"
        );
        Ok(())
    }

    /// Change how many pulls run at once. Values below 1 are ignored.
    pub fn set_parallelism(&self, max_parallelism: usize) -> Result<(), QueueError> {
        self.inner.set_parallelism(max_parallelism)
    }

    pub fn parallelism(&self) -> usize {
        self.inner.parallelism()
    }

    /// Requests waiting to start, in FIFO order.
    pub fn queued_items(&self) -> Vec<Arc<DownloadRequest>> {
        self.inner.queued_items()
    }

    /// Pulls currently running.
    pub fn running_count(&self) -> usize {
        self.inner.running_count()
    }

    /// Cancel running pulls and drop queued ones.
    ///
    /// Dropped requests go back to `Downloadable` with a fresh cancellation
    /// handle, so they can be resubmitted.
    pub fn cancel_all(&self) -> Result<(), QueueError> {
        let discarded = self.inner.cancel_all()?;
        for request in &discarded {
            request.set_status(DownloadStatus::default());
        }
        tracing::info!(
            target: "llamadesk.download",
            discarded = discarded.len(),
            "Cancelled all downloads"
        );
        Ok(())
    }

    /// Shut the queue down, waiting for running pulls to observe cancellation.
    ///
    /// Requests that never started go back to `Downloadable`.
    pub async fn dispose(&self) -> Result<(), QueueError> {
        let dropped = self.inner.dispose().await?;
        for request in &dropped {
            request.set_status(DownloadStatus::default());
        }
        tracing::debug!(
            target: "llamadesk.download",
            dropped = dropped.len(),
            "Download queue disposed"
        );
        Ok(())
    }
}
