//! Deadline wrapper for long-running async operations.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use super::panic_message;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeadlineError {
    /// The deadline passed first. The operation keeps running in the background.
    #[error("Operation did not finish within {deadline:?}")]
    Elapsed { deadline: Duration },

    /// The operation panicked.
    #[error("Operation panicked: {0}")]
    Panicked(String),
}

/// Race `fut` against a timer.
///
/// The operation is spawned onto the runtime. If the timer wins the caller
/// gets [`DeadlineError::Elapsed`] and the task is abandoned, not aborted:
/// it runs to completion and its result is discarded. Use a
/// `CancellationToken` inside `fut` when it must actually stop.
pub async fn run_with_deadline<F, T>(deadline: Duration, fut: F) -> Result<T, DeadlineError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::spawn(fut);

    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_err)) => Err(DeadlineError::Panicked(panic_message(join_err))),
        Err(_) => {
            tracing::debug!(?deadline, "Deadline elapsed, abandoning operation");
            Err(DeadlineError::Elapsed { deadline })
        }
    }
}
