//! Model pull stream port.
//!
//! Abstracts the backend endpoint that streams pull progress. The Ollama
//! adapter lives in `llamadesk-ollama`.

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::download::DownloadError;

/// Status value the backend sends once the model is fully pulled.
pub const SUCCESS_STATUS: &str = "success";

/// One progress line from the backend.
///
/// Status-only lines ("pulling manifest", "verifying sha256 digest") carry
/// no byte counts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullChunk {
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<u64>,
}

impl PullChunk {
    /// A status-only chunk.
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Self::default()
        }
    }

    /// A byte-progress chunk.
    pub fn progress(status: impl Into<String>, completed: u64, total: u64) -> Self {
        Self {
            status: status.into(),
            digest: None,
            total: Some(total),
            completed: Some(completed),
        }
    }

    /// Whether this is the terminal success marker.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == SUCCESS_STATUS
    }

    /// `(completed, total)` when the chunk carries both.
    #[must_use]
    pub const fn byte_progress(&self) -> Option<(u64, u64)> {
        match (self.completed, self.total) {
            (Some(completed), Some(total)) => Some((completed, total)),
            _ => None,
        }
    }
}

/// Lazily produced, finite sequence of progress chunks.
pub type PullStream = BoxStream<'static, Result<PullChunk, DownloadError>>;

/// Port for starting a model pull on the backend.
#[async_trait]
pub trait ModelPullPort: Send + Sync {
    /// Open the progress stream for `model`.
    ///
    /// The stream ends when the backend closes it, whether or not a success
    /// marker was sent. `cancel` aborts connection setup; consumers also
    /// race it against every chunk.
    async fn pull(&self, model: &str, cancel: CancellationToken)
    -> Result<PullStream, DownloadError>;
}
