//! Cancellation primitives for queued work items.
//!
//! Every item owns a [`CancellationHandle`]. The engine links the handle's
//! current token with its own service-level token while the item runs, and
//! the handle is renewed after a cancellation so the same item can be
//! submitted again.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// Why an item was cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationReason {
    /// No cancellation recorded yet.
    #[default]
    Unknown,
    /// The user cancelled this specific item.
    User,
    /// The queue cancelled all in-flight work.
    Service,
    /// The queue is being disposed.
    Shutdown,
}

impl CancellationReason {
    /// Get the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::User => "user",
            Self::Service => "service",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct HandleState {
    token: CancellationToken,
    reason: CancellationReason,
}

/// Per-item cancellation handle.
///
/// Owned exclusively by its item. A cancelled token is never reused:
/// [`renew`](Self::renew) swaps in a fresh one.
#[derive(Debug)]
pub struct CancellationHandle {
    state: Mutex<HandleState>,
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationHandle {
    /// Create a handle with a fresh token and reason `Unknown`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HandleState {
                token: CancellationToken::new(),
                reason: CancellationReason::Unknown,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HandleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clone of the current token.
    pub fn token(&self) -> CancellationToken {
        self.lock().token.clone()
    }

    /// Record `reason` and cancel the current token.
    ///
    /// The first reason wins if the handle is cancelled more than once
    /// before being renewed.
    pub fn cancel(&self, reason: CancellationReason) {
        let mut state = self.lock();
        if !state.token.is_cancelled() {
            state.reason = reason;
        }
        state.token.cancel();
    }

    /// Replace the token with a fresh one and clear the reason.
    pub fn renew(&self) {
        let mut state = self.lock();
        state.token = CancellationToken::new();
        state.reason = CancellationReason::Unknown;
    }

    /// Reason recorded by the last cancellation.
    pub fn reason(&self) -> CancellationReason {
        self.lock().reason
    }

    /// Record a reason without touching the token.
    ///
    /// Used by the engine when cancellation came from the service scope.
    pub fn set_reason_if_unknown(&self, reason: CancellationReason) {
        let mut state = self.lock();
        if state.reason == CancellationReason::Unknown {
            state.reason = reason;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock().token.is_cancelled()
    }
}

/// A unit of work accepted by [`BoundedWorkQueue`](super::BoundedWorkQueue).
pub trait WorkItem: Send + Sync + 'static {
    /// The item's own cancellation handle.
    fn cancellation(&self) -> &CancellationHandle;

    /// Cancel only this item.
    fn cancel(&self, reason: CancellationReason) {
        self.cancellation().cancel(reason);
    }
}
