//! Operation metrics
//!
//! Tracks operation counts, failures, and a rolling average duration for one
//! coordinator instance. The circuit breaker derives its open/closed state
//! from snapshots of these counters.

use parking_lot::Mutex;
use std::time::Duration;

/// Point-in-time view of coordinator metrics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Operations that reached the Running state
    pub total_operations: u64,
    /// Operations that completed successfully
    pub successful_operations: u64,
    /// Operations that failed (timeouts, builder errors, lock timeouts)
    pub timeout_errors: u64,
    /// Two-point moving average of operation duration
    pub average_duration_ms: u64,
    /// Operations currently in the Running state
    pub active_operations: u64,
    /// Stale swap locks force-cleared by a waiter
    pub recovered_deadlocks: u64,
}

impl MetricsSnapshot {
    /// Fraction of operations that failed (0.0 when nothing has run)
    #[inline]
    #[must_use]
    pub fn failure_ratio(&self) -> f64 {
        if self.total_operations == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            self.timeout_errors as f64 / self.total_operations as f64
        }
    }
}

#[derive(Debug, Default)]
struct MetricsInner {
    total_operations: u64,
    successful_operations: u64,
    timeout_errors: u64,
    average_duration_ms: u64,
    active_operations: u64,
}

/// Records operation outcomes for one coordinator
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    inner: Mutex<MetricsInner>,
}

impl MetricsRecorder {
    /// Create new recorder with zeroed counters
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished operation
    ///
    /// Failures of every kind land in `timeout_errors`; the counter name is
    /// kept because the breaker thresholds are specified against it.
    pub fn record(&self, success: bool, duration: Duration) {
        let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        let mut inner = self.inner.lock();

        inner.total_operations += 1;
        if success {
            inner.successful_operations += 1;
        } else {
            inner.timeout_errors += 1;
        }
        inner.average_duration_ms = if inner.average_duration_ms == 0 {
            duration_ms
        } else {
            (inner.average_duration_ms + duration_ms) / 2
        };
    }

    /// Mark an operation as entering the Running state
    #[inline]
    pub fn operation_started(&self) {
        self.inner.lock().active_operations += 1;
    }

    /// Mark an operation as leaving the Running state
    #[inline]
    pub fn operation_finished(&self) {
        let mut inner = self.inner.lock();
        inner.active_operations = inner.active_operations.saturating_sub(1);
    }

    /// Take a snapshot of the counters
    ///
    /// `recovered_deadlocks` is owned by the swap lock; the coordinator
    /// fills it in when assembling its public snapshot.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock();
        MetricsSnapshot {
            total_operations: inner.total_operations,
            successful_operations: inner.successful_operations,
            timeout_errors: inner.timeout_errors,
            average_duration_ms: inner.average_duration_ms,
            active_operations: inner.active_operations,
            recovered_deadlocks: 0,
        }
    }
}
