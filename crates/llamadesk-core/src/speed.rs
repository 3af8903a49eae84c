//! Sliding-window throughput estimation.
//!
//! Progress chunks arrive at an irregular cadence, so the rate is computed
//! from the byte delta across a time window rather than between consecutive
//! samples. Sampling every 100 ms or every 2 s converges to the same value.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

/// Default span of history used for the rate.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

/// Decimal megabyte, matching `format_bytes_per_second`.
const BYTES_PER_MB: f64 = 1_000_000.0;

/// Converts a cumulative byte counter into a rate in MB/s.
#[derive(Debug, Clone)]
pub struct ThroughputEstimator {
    samples: VecDeque<(Instant, u64)>,
    window: Duration,
    last_speed: f64,
}

impl Default for ThroughputEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl ThroughputEstimator {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Create an estimator with a custom window.
    #[must_use]
    pub const fn with_window(window: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            window,
            last_speed: 0.0,
        }
    }

    /// Record `cumulative_bytes` at the current instant and return the rate in MB/s.
    pub fn calculate_speed(&mut self, cumulative_bytes: u64) -> f64 {
        self.calculate_speed_at(Instant::now(), cumulative_bytes)
    }

    /// Same as [`calculate_speed`](Self::calculate_speed) with an explicit timestamp.
    pub fn calculate_speed_at(&mut self, now: Instant, cumulative_bytes: u64) -> f64 {
        if let Some(&(last_time, last_bytes)) = self.samples.back() {
            if cumulative_bytes < last_bytes {
                // Counter went backwards: start a new baseline.
                self.samples.clear();
                self.samples.push_back((now, cumulative_bytes));
                self.last_speed = 0.0;
                return 0.0;
            }
            if now <= last_time {
                return self.last_speed;
            }
        }

        self.samples.push_back((now, cumulative_bytes));

        // Keep one baseline sample at or just beyond the window edge.
        while self.samples.len() > 2
            && self
                .samples
                .get(1)
                .is_some_and(|&(t, _)| now.duration_since(t) >= self.window)
        {
            self.samples.pop_front();
        }

        let Some(&(first_time, first_bytes)) = self.samples.front() else {
            return self.last_speed;
        };
        if self.samples.len() < 2 {
            return self.last_speed;
        }

        let elapsed = now.duration_since(first_time).as_secs_f64();
        #[expect(
            clippy::cast_precision_loss,
            reason = "byte counts stay far below 2^52, precision loss is irrelevant for display"
        )]
        let delta = cumulative_bytes.saturating_sub(first_bytes) as f64;

        self.last_speed = delta / elapsed / BYTES_PER_MB;
        self.last_speed
    }

    /// Most recent estimate without recording a sample.
    #[must_use]
    pub const fn last_speed(&self) -> f64 {
        self.last_speed
    }

    /// Forget all samples. The next call behaves like a fresh estimator.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.last_speed = 0.0;
    }
}
