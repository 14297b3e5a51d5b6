//! Worker pool metrics

use crate::core::Outcome;
use crate::errors::TaskFailure;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counters and timings collected by a worker pool
pub struct PoolMetrics {
    submitted: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    panicked: AtomicU64,

    /// Run time totals of finished tasks, in nanoseconds
    timed: AtomicU64,
    total_nanos: AtomicU64,
    max_nanos: AtomicU64,

    start_time: Instant,
}

impl PoolMetrics {
    pub fn new() -> Self {
        Self {
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            timed: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            max_nanos: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_submitted(&self, count: usize) {
        self.submitted.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record a finished task
    pub fn record_outcome<T>(&self, outcome: &Outcome<T>, duration: Duration) {
        match outcome {
            Outcome::Completed(_) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            Outcome::Failed(failure) => self.record_failure(failure),
        }
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.timed.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);
    }

    /// Record a task that never ran to completion, e.g. dropped from the queue
    pub fn record_failure(&self, failure: &TaskFailure) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        match failure {
            TaskFailure::Cancelled => {
                self.cancelled.fetch_add(1, Ordering::Relaxed);
            }
            TaskFailure::Panicked(_) => {
                self.panicked.fetch_add(1, Ordering::Relaxed);
            }
            TaskFailure::Error(_) => {}
        }
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let timed = self.timed.load(Ordering::Relaxed);
        let mean_nanos = if timed == 0 {
            0.0
        } else {
            self.total_nanos.load(Ordering::Relaxed) as f64 / timed as f64
        };
        let max_nanos = self.max_nanos.load(Ordering::Relaxed) as f64;

        MetricsSnapshot {
            uptime_ms: self.uptime().as_millis() as u64,
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            mean_task_ms: mean_nanos / 1_000_000.0,
            max_task_ms: max_nanos / 1_000_000.0,
        }
    }
}

impl Default for PoolMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of `PoolMetrics`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_ms: u64,
    pub submitted: u64,
    pub completed: u64,
    /// Includes cancelled and panicked tasks
    pub failed: u64,
    pub cancelled: u64,
    pub panicked: u64,
    pub mean_task_ms: f64,
    pub max_task_ms: f64,
}

impl MetricsSnapshot {
    /// Tasks submitted but not yet accounted for
    pub fn in_flight(&self) -> u64 {
        self.submitted.saturating_sub(self.completed + self.failed)
    }
}
