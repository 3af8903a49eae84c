//! Model pull processor.
//!
//! Implements the work engine hooks for [`DownloadRequest`]s: probe the
//! network, consume the backend's progress stream, and turn failures into
//! localized statuses.

mod messages;

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use llamadesk_core::download::{DownloadError, DownloadRequest, DownloadState, DownloadStatus};
use llamadesk_core::ports::{DiskSpacePort, LocalizerPort, ModelPullPort, NetworkReachabilityPort};
use llamadesk_core::work::{WorkItem, WorkProcessor};

pub use messages::{failure_status, message_for};

/// Drives one model pull per work item.
pub struct ModelPullProcessor {
    reachability: Arc<dyn NetworkReachabilityPort>,
    puller: Arc<dyn ModelPullPort>,
    localizer: Arc<dyn LocalizerPort>,
    disk_space: Option<Arc<dyn DiskSpacePort>>,
}

impl ModelPullProcessor {
    pub fn new(
        reachability: Arc<dyn NetworkReachabilityPort>,
        puller: Arc<dyn ModelPullPort>,
        localizer: Arc<dyn LocalizerPort>,
    ) -> Self {
        Self {
            reachability,
            puller,
            localizer,
            disk_space: None,
        }
    }

    /// Check free space whenever a new part announces its size.
    #[must_use]
    pub fn with_disk_space(mut self, disk_space: Arc<dyn DiskSpacePort>) -> Self {
        self.disk_space = Some(disk_space);
        self
    }

    /// Apply one byte-progress chunk to the request.
    fn apply_progress(
        &self,
        request: &DownloadRequest,
        last_total: &mut Option<u64>,
        completed: u64,
        total: u64,
    ) -> Result<(), DownloadError> {
        let new_part = last_total.is_some_and(|previous| previous != total);

        if *last_total != Some(total) {
            if let Some(disk) = &self.disk_space {
                let remaining = total.saturating_sub(completed);
                if !disk.has_enough_space(remaining) {
                    return Err(DownloadError::insufficient_disk_space(remaining));
                }
            }
        }
        *last_total = Some(total);

        let speed = request.record_speed(completed);
        request.update(|p| {
            if new_part {
                p.part_count += 1;
            }
            p.speed_mbps = speed;
            if matches!(
                p.status.state,
                DownloadState::Downloadable | DownloadState::Queued
            ) {
                p.status = DownloadStatus::new(DownloadState::Downloading);
            }
            p.total_bytes = Some(total);
            p.downloaded_bytes = completed.min(total);
        });
        Ok(())
    }
}

#[async_trait]
impl WorkProcessor for ModelPullProcessor {
    type Item = DownloadRequest;
    type Error = DownloadError;

    async fn process_item(
        &self,
        request: &Arc<DownloadRequest>,
        cancel: CancellationToken,
    ) -> Result<(), DownloadError> {
        let model = request.model_name();

        let reachable = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloadError::Cancelled),
            reachable = self.reachability.is_reachable() => reachable,
        };
        if !reachable {
            return Err(DownloadError::NoConnection);
        }

        request.update(|p| p.part_count = 1);
        tracing::info!(target: "llamadesk.download", model = %model, "Pull started");

        let mut stream = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloadError::Cancelled),
            stream = self.puller.pull(model, cancel.clone()) => stream?,
        };

        let mut last_total = None;
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DownloadError::Cancelled),
                next = stream.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            if let Some((completed, total)) = chunk.byte_progress() {
                self.apply_progress(request, &mut last_total, completed, total)?;
            } else if !chunk.status.is_empty() {
                tracing::trace!(
                    target: "llamadesk.download",
                    model = %model,
                    status = %chunk.status,
                    "Pull status"
                );
            }

            if chunk.is_success() {
                request.update(|p| {
                    p.status = DownloadStatus::new(DownloadState::Downloaded);
                    p.speed_mbps = 0.0;
                });
                tracing::info!(
                    target: "llamadesk.download",
                    model = %model,
                    parts = request.progress().part_count,
                    "Pull completed"
                );
                return Ok(());
            }
        }

        Err(DownloadError::EndedWithoutConfirmation)
    }

    fn on_item_started(&self, request: &Arc<DownloadRequest>) {
        tracing::debug!(
            target: "llamadesk.download",
            model = %request.model_name(),
            "Dequeued"
        );
    }

    fn on_item_cancelled(&self, request: &Arc<DownloadRequest>) {
        request.reset_speed();
        request.set_status(DownloadStatus::default());
        tracing::info!(
            target: "llamadesk.download",
            model = %request.model_name(),
            reason = %request.cancellation().reason(),
            "Pull cancelled"
        );
    }

    fn on_item_failed(&self, request: &Arc<DownloadRequest>, error: DownloadError) {
        if error.is_cancelled() {
            self.on_item_cancelled(request);
            return;
        }

        let status = failure_status(self.localizer.as_ref(), &error);
        request.reset_speed();
        request.set_status(status);
        tracing::warn!(
            target: "llamadesk.download",
            model = %request.model_name(),
            error = %error,
            "Pull failed"
        );
    }
}
