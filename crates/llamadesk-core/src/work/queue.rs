//! Bounded-parallelism work queue.
//!
//! # Concurrency Model
//!
//! - A single long-lived scheduler task owns the worker registry (`JoinSet`)
//!   and is the only place items leave the FIFO, so at most one admission
//!   pass runs at a time
//! - `enqueue` and `set_parallelism` only push state and wake the scheduler
//!   through a `Notify`
//! - The FIFO and the service-level token share one lock, so `cancel_all`
//!   cannot race an item out of the FIFO with a stale token
//! - Each running item gets a joint token: a child of the service token that
//!   is also cancelled when the item's own handle fires

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use super::cancel::{CancellationReason, WorkItem};
use super::panic_message;

/// Default number of items processed concurrently.
pub const DEFAULT_MAX_PARALLELISM: usize = 2;

/// Errors returned by queue operations.
///
/// These are engine-level misuse or capacity errors, never per-item outcomes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueueError {
    /// The FIFO reached its configured capacity.
    #[error("Queue full: maximum {capacity} items allowed")]
    QueueFull { capacity: usize },

    /// The queue was disposed and can no longer be used.
    #[error("Queue has been disposed")]
    Disposed,

    /// The scheduler task panicked.
    #[error("Scheduler panicked: {0}")]
    SchedulerPanicked(String),
}

/// Configuration for a [`BoundedWorkQueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum number of items running at once (clamped to at least 1).
    pub max_parallelism: usize,
    /// Maximum number of not-yet-started items. `None` means unbounded.
    pub capacity: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            capacity: None,
        }
    }
}

impl QueueConfig {
    #[must_use]
    pub const fn with_max_parallelism(mut self, max_parallelism: usize) -> Self {
        self.max_parallelism = max_parallelism;
        self
    }

    #[must_use]
    pub const fn with_capacity(mut self, capacity: Option<usize>) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Domain logic plugged into a [`BoundedWorkQueue`].
///
/// `process_item` must honor `cancel` at its suspension points. The hooks
/// run on the worker task and must not panic.
#[async_trait]
pub trait WorkProcessor: Send + Sync + 'static {
    type Item: WorkItem;
    type Error: fmt::Display + Send + 'static;

    /// Run one item to completion.
    ///
    /// Returning `Err` while `cancel` is cancelled counts as a cancellation,
    /// not a failure.
    async fn process_item(
        &self,
        item: &Arc<Self::Item>,
        cancel: CancellationToken,
    ) -> Result<(), Self::Error>;

    /// Called by the scheduler when an item leaves the FIFO.
    fn on_item_started(&self, _item: &Arc<Self::Item>) {}

    /// Called after cancellation was observed, before the item's handle is renewed.
    fn on_item_cancelled(&self, _item: &Arc<Self::Item>) {}

    /// Called when `process_item` failed for any reason other than cancellation.
    fn on_item_failed(&self, _item: &Arc<Self::Item>, _error: Self::Error) {}
}

struct Pending<T> {
    items: VecDeque<Arc<T>>,
    service: CancellationToken,
}

struct Shared<T> {
    pending: Mutex<Pending<T>>,
    max_parallelism: AtomicUsize,
    running: AtomicUsize,
    capacity: Option<usize>,
    wake: Notify,
    shutdown: CancellationToken,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Pending<T>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pop the next item together with the service token it must run under.
    fn next(&self) -> Option<(Arc<T>, CancellationToken)> {
        let mut pending = self.lock();
        let item = pending.items.pop_front()?;
        Some((item, pending.service.clone()))
    }
}

/// Decrements the running counter when a worker ends, including by panic.
struct RunningGuard<'a>(&'a AtomicUsize);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// A FIFO queue drained by up to `max_parallelism` concurrent workers.
///
/// Every admitted item reaches exactly one outcome: completion, the
/// processor's cancelled hook, or its failed hook.
pub struct BoundedWorkQueue<P: WorkProcessor> {
    shared: Arc<Shared<P::Item>>,
    processor: Arc<P>,
    scheduler: Mutex<Option<JoinHandle<()>>>,
}

impl<P: WorkProcessor> BoundedWorkQueue<P> {
    /// Create the queue and start its scheduler.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(processor: P, config: QueueConfig) -> Self {
        let processor = Arc::new(processor);
        let shared = Arc::new(Shared {
            pending: Mutex::new(Pending {
                items: VecDeque::new(),
                service: CancellationToken::new(),
            }),
            max_parallelism: AtomicUsize::new(config.max_parallelism.max(1)),
            running: AtomicUsize::new(0),
            capacity: config.capacity,
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
        });

        let scheduler = tokio::spawn(run_scheduler(
            Arc::clone(&shared),
            Arc::clone(&processor),
        ));

        Self {
            shared,
            processor,
            scheduler: Mutex::new(Some(scheduler)),
        }
    }

    /// The processor driving this queue.
    pub fn processor(&self) -> &Arc<P> {
        &self.processor
    }

    fn ensure_open(&self) -> Result<(), QueueError> {
        if self.shared.shutdown.is_cancelled() {
            return Err(QueueError::Disposed);
        }
        Ok(())
    }

    /// Append an item to the FIFO and wake the scheduler.
    ///
    /// Never waits for the item to start. An item whose handle is already
    /// cancelled is accepted and reaches the cancelled hook when it runs.
    pub fn enqueue(&self, item: Arc<P::Item>) -> Result<(), QueueError> {
        self.ensure_open()?;
        {
            let mut pending = self.shared.lock();
            if let Some(capacity) = self.shared.capacity {
                if pending.items.len() >= capacity {
                    return Err(QueueError::QueueFull { capacity });
                }
            }
            pending.items.push_back(item);
        }
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Change the concurrency ceiling. Values below 1 are ignored.
    ///
    /// Running items are never preempted when the ceiling shrinks.
    pub fn set_parallelism(&self, max_parallelism: usize) -> Result<(), QueueError> {
        self.ensure_open()?;
        if max_parallelism < 1 {
            tracing::debug!(
                target: "llamadesk.queue",
                requested = max_parallelism,
                "Ignoring parallelism below 1"
            );
            return Ok(());
        }
        let previous = self
            .shared
            .max_parallelism
            .swap(max_parallelism, Ordering::AcqRel);
        tracing::debug!(
            target: "llamadesk.queue",
            previous,
            parallelism = max_parallelism,
            "Parallelism changed"
        );
        self.shared.wake.notify_one();
        Ok(())
    }

    /// Current concurrency ceiling.
    pub fn parallelism(&self) -> usize {
        self.shared.max_parallelism.load(Ordering::Acquire)
    }

    /// Number of items currently executing.
    pub fn running_count(&self) -> usize {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Number of items waiting in the FIFO.
    pub fn queued_count(&self) -> usize {
        self.shared.lock().items.len()
    }

    /// Snapshot of the not-yet-started items in FIFO order.
    pub fn queued_items(&self) -> Vec<Arc<P::Item>> {
        self.shared.lock().items.iter().cloned().collect()
    }

    /// Cancel every running item and discard every queued one.
    ///
    /// Discarded items never start and no hook runs for them. Their handles
    /// are renewed and they are returned so the caller can reset them. A
    /// fresh service token is installed, so the queue stays usable.
    pub fn cancel_all(&self) -> Result<Vec<Arc<P::Item>>, QueueError> {
        self.ensure_open()?;
        let (discarded, previous) = {
            let mut pending = self.shared.lock();
            let discarded: Vec<_> = pending.items.drain(..).collect();
            let previous = std::mem::replace(&mut pending.service, CancellationToken::new());
            (discarded, previous)
        };
        previous.cancel();
        renew_all(&discarded);

        tracing::info!(
            target: "llamadesk.queue",
            discarded = discarded.len(),
            running = self.running_count(),
            "Cancelled all work"
        );
        Ok(discarded)
    }

    /// Stop the scheduler, cancel running items and wait for them.
    ///
    /// Queued items are dropped without running, their handles renewed, and
    /// returned in FIFO order. Any later call returns [`QueueError::Disposed`].
    pub async fn dispose(&self) -> Result<Vec<Arc<P::Item>>, QueueError> {
        let handle = self
            .scheduler
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(handle) = handle else {
            return Err(QueueError::Disposed);
        };

        self.shared.shutdown.cancel();
        let dropped: Vec<_> = self.shared.lock().items.drain(..).collect();
        renew_all(&dropped);
        tracing::debug!(
            target: "llamadesk.queue",
            dropped = dropped.len(),
            "Disposing queue"
        );

        handle.await.map_err(scheduler_error)?;
        Ok(dropped)
    }
}

impl<P: WorkProcessor> Drop for BoundedWorkQueue<P> {
    fn drop(&mut self) {
        self.shared.shutdown.cancel();
    }
}

fn renew_all<T: WorkItem>(items: &[Arc<T>]) {
    for item in items {
        item.cancellation().renew();
    }
}

fn scheduler_error(err: JoinError) -> QueueError {
    if err.is_panic() {
        QueueError::SchedulerPanicked(panic_message(err))
    } else {
        QueueError::Disposed
    }
}

fn reap(result: Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!(
                target: "llamadesk.queue",
                panic = %panic_message(e),
                "Worker panicked"
            );
        }
    }
}

/// Admission loop. Runs until shutdown.
async fn run_scheduler<P: WorkProcessor>(shared: Arc<Shared<P::Item>>, processor: Arc<P>) {
    let mut workers: JoinSet<()> = JoinSet::new();

    loop {
        while let Some(result) = workers.try_join_next() {
            reap(result);
        }
        if shared.shutdown.is_cancelled() {
            break;
        }

        let ceiling = shared.max_parallelism.load(Ordering::Acquire);
        let admitted = if workers.len() < ceiling {
            shared.next()
        } else {
            None
        };

        if let Some((item, service)) = admitted {
            processor.on_item_started(&item);
            shared.running.fetch_add(1, Ordering::AcqRel);
            workers.spawn(run_item(
                Arc::clone(&shared),
                Arc::clone(&processor),
                item,
                service,
            ));
            continue;
        }

        // At the ceiling or out of work: wait for a worker to finish or a wake-up.
        tokio::select! {
            biased;
            () = shared.shutdown.cancelled() => break,
            Some(result) = workers.join_next() => reap(result),
            () = shared.wake.notified() => {}
        }
    }

    let service = shared.lock().service.clone();
    service.cancel();
    let in_flight = workers.len();
    while let Some(result) = workers.join_next().await {
        reap(result);
    }
    tracing::debug!(target: "llamadesk.queue", in_flight, "Scheduler stopped");
}

/// Execute one item and route it to exactly one outcome.
async fn run_item<P: WorkProcessor>(
    shared: Arc<Shared<P::Item>>,
    processor: Arc<P>,
    item: Arc<P::Item>,
    service: CancellationToken,
) {
    let _running = RunningGuard(&shared.running);
    let handle = item.cancellation();
    let item_token = handle.token();
    let joint = service.child_token();
    if item_token.is_cancelled() {
        joint.cancel();
    }

    let result = {
        let mut work = processor.process_item(&item, joint.clone());
        tokio::select! {
            biased;
            () = item_token.cancelled(), if !joint.is_cancelled() => {
                joint.cancel();
                work.await
            }
            result = &mut work => result,
        }
    };

    match result {
        Ok(()) => {
            tracing::trace!(target: "llamadesk.queue", "Item completed");
            // A cancel that lost the race against completion.
            if item_token.is_cancelled() {
                handle.renew();
            }
        }
        Err(_) if joint.is_cancelled() => {
            if !item_token.is_cancelled() {
                let reason = if shared.shutdown.is_cancelled() {
                    CancellationReason::Shutdown
                } else {
                    CancellationReason::Service
                };
                handle.set_reason_if_unknown(reason);
            }
            tracing::debug!(
                target: "llamadesk.queue",
                reason = %handle.reason(),
                "Item cancelled"
            );
            processor.on_item_cancelled(&item);
            handle.renew();
        }
        Err(e) => {
            tracing::debug!(target: "llamadesk.queue", error = %e, "Item failed");
            processor.on_item_failed(&item, e);
            if item_token.is_cancelled() {
                handle.renew();
            }
        }
    }
}
