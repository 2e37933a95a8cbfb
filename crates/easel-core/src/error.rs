//! Error types for build coordination
//!
//! Provides the unified failure taxonomy for:
//! - Signature computation failures
//! - Operation timeouts
//! - Builder failures
//! - Swap lock acquisition timeouts
//! - Circuit breaker rejections
//! - Admission queue backpressure
//!
//! Every error here is `Clone`: an operation-level failure is delivered
//! identically to the owning caller and to every caller joined on the same
//! in-flight operation.

use easel_artifact::SignatureError;

/// Main coordinator error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoordinatorError {
    /// Request content could not be fingerprinted; nothing was mutated
    #[error("signature computation failed: {0}")]
    Signature(#[from] SignatureError),

    /// Operation exceeded its TTL
    #[error("operation timed out after {elapsed_ms}ms (ttl {ttl_ms}ms)")]
    Timeout {
        /// Wall-clock time spent before the timer fired
        elapsed_ms: u64,
        /// The TTL that was exceeded
        ttl_ms: u64,
    },

    /// The external builder failed
    #[error("build failed: {0}")]
    Build(String),

    /// Surface swap lock was unobtainable
    #[error("swap lock error: {0}")]
    Lock(#[from] SwapLockError),

    /// Circuit breaker rejected the request before any work started
    #[error("circuit open: {timeout_errors} failures over {total_operations} operations")]
    CircuitOpen {
        /// Failed operations observed by the breaker
        timeout_errors: u64,
        /// Total operations observed by the breaker
        total_operations: u64,
    },

    /// Admission queue rejected the request
    #[error("admission error: {0}")]
    Admission(#[from] AdmissionError),

    /// A joined wait outlived its bound while the owner kept running
    #[error("joined wait lapsed after {waited_ms}ms")]
    JoinLapsed {
        /// Time spent waiting on the owning operation
        waited_ms: u64,
    },
}

impl CoordinatorError {
    /// Check if the caller may reasonably retry
    ///
    /// Retries are never automatic; this only classifies.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Build(_) | Self::Lock(_) | Self::JoinLapsed { .. }
        )
    }

    /// Check if the request was rejected before any builder work started
    #[inline]
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::Admission(_))
    }
}

/// Swap lock errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum SwapLockError {
    /// Lock unobtainable within the wait bound, even after the staleness check
    #[error("swap lock unobtainable after {waited_ms}ms")]
    AcquireTimeout {
        /// Time spent waiting before giving up
        waited_ms: u64,
    },
}

/// Admission queue errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdmissionError {
    /// Too many requests already waiting for a concurrency slot
    #[error("admission queue full (max pending: {max_pending})")]
    QueueFull {
        /// Configured pending bound
        max_pending: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinator_error_display() {
        let err = CoordinatorError::Timeout {
            elapsed_ms: 100,
            ttl_ms: 100,
        };
        assert!(err.to_string().contains("timed out after 100ms"));

        let err = CoordinatorError::CircuitOpen {
            timeout_errors: 4,
            total_operations: 5,
        };
        assert!(err.to_string().contains("circuit open"));
    }

    #[test]
    fn coordinator_error_is_retryable() {
        assert!(CoordinatorError::Build("renderer crashed".to_string()).is_retryable());
        assert!(CoordinatorError::Timeout {
            elapsed_ms: 1,
            ttl_ms: 1
        }
        .is_retryable());
        assert!(!CoordinatorError::CircuitOpen {
            timeout_errors: 3,
            total_operations: 4
        }
        .is_retryable());
    }

    #[test]
    fn coordinator_error_is_rejection() {
        assert!(CoordinatorError::from(AdmissionError::QueueFull { max_pending: 50 }).is_rejection());
        assert!(!CoordinatorError::Build("x".to_string()).is_rejection());
    }

    #[test]
    fn lock_error_converts() {
        let err: CoordinatorError = SwapLockError::AcquireTimeout { waited_ms: 10_000 }.into();
        assert!(matches!(err, CoordinatorError::Lock(_)));
        assert!(err.is_retryable());
    }
}
