//! Circuit breaker
//!
//! Protects the builder and the surface from runaway failure cascades. The
//! breaker holds no state of its own: open/closed is derived from a
//! [`MetricsSnapshot`] each time it is consulted, so it recovers on its own
//! as successful operations dilute the failure ratio.
//!
//! The ratio is computed over cumulative counters rather than a sliding
//! window, so the breaker can flap under bursty failure patterns.

use crate::metrics::MetricsSnapshot;

/// Breaker state derived from a metrics snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally
    Closed,
    /// Requests are rejected before the builder or the queue are touched
    Open,
}

/// Failure-rate circuit breaker
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreaker {
    min_samples: u64,
    failure_ratio: f64,
}

impl CircuitBreaker {
    /// Create breaker with the given thresholds
    #[inline]
    #[must_use]
    pub fn new(min_samples: u64, failure_ratio: f64) -> Self {
        Self {
            min_samples,
            failure_ratio,
        }
    }

    /// Derive the breaker state from a snapshot
    #[must_use]
    pub fn state(&self, snapshot: &MetricsSnapshot) -> CircuitState {
        if snapshot.timeout_errors >= self.min_samples
            && snapshot.failure_ratio() > self.failure_ratio
        {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    /// Check whether the breaker is open for this snapshot
    #[inline]
    #[must_use]
    pub fn is_open(&self, snapshot: &MetricsSnapshot) -> bool {
        self.state(snapshot) == CircuitState::Open
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(3, 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(failures: u64, total: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            total_operations: total,
            successful_operations: total - failures,
            timeout_errors: failures,
            ..MetricsSnapshot::default()
        }
    }

    #[test]
    fn closed_with_no_operations() {
        let breaker = CircuitBreaker::default();
        assert_eq!(breaker.state(&MetricsSnapshot::default()), CircuitState::Closed);
    }

    #[test]
    fn closed_below_min_samples_even_at_full_failure() {
        let breaker = CircuitBreaker::new(3, 0.5);
        // 2 failures out of 2: ratio 1.0 but under the sample floor
        assert!(!breaker.is_open(&snapshot(2, 2)));
    }

    #[test]
    fn opens_past_samples_and_ratio() {
        let breaker = CircuitBreaker::new(3, 0.5);
        // 4 failures out of 5: ratio 0.8, samples 4 >= 3
        assert!(breaker.is_open(&snapshot(4, 5)));
    }

    #[test]
    fn ratio_at_threshold_stays_closed() {
        let breaker = CircuitBreaker::new(3, 0.5);
        // exactly 0.5 is not *above* the threshold
        assert!(!breaker.is_open(&snapshot(4, 8)));
    }

    #[test]
    fn recovers_as_successes_dilute_the_ratio() {
        let breaker = CircuitBreaker::new(3, 0.5);
        assert!(breaker.is_open(&snapshot(4, 5)));

        // same failures, more successes: 4/10 = 0.4
        assert!(!breaker.is_open(&snapshot(4, 10)));
    }
}
