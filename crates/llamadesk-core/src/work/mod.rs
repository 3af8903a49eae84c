//! Generic cancellable work engine.
//!
//! [`BoundedWorkQueue`] runs [`WorkItem`]s through a [`WorkProcessor`] with a
//! runtime-adjustable parallelism ceiling. Domain queues (model downloads)
//! are built by implementing the processor hooks.

mod cancel;
mod deadline;
mod queue;

pub use cancel::{CancellationHandle, CancellationReason, WorkItem};
pub use deadline::{DeadlineError, run_with_deadline};
pub use queue::{
    BoundedWorkQueue, DEFAULT_MAX_PARALLELISM, QueueConfig, QueueError, WorkProcessor,
};

use tokio::task::JoinError;

/// Extract a readable message from a failed task.
fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
