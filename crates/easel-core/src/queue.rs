//! Bounded-concurrency admission queue
//!
//! FIFO admission control for build operations: at most `max_concurrent`
//! permits exist, waiters are granted in arrival order, and a bounded
//! pending count rejects overload instead of growing without limit. A
//! failing operation releases its permit exactly like a successful one, so
//! admission never stalls behind failures.

use crate::error::AdmissionError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// FIFO admission queue with bounded concurrency and bounded backlog
#[derive(Debug)]
pub struct OperationQueue {
    slots: Arc<Semaphore>,
    max_pending: usize,
    pending: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
}

impl OperationQueue {
    /// Create queue with `max_concurrent` slots and a `max_pending` backlog
    #[inline]
    #[must_use]
    pub fn new(max_concurrent: usize, max_pending: usize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(max_concurrent)),
            max_pending,
            pending: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait for a concurrency slot
    ///
    /// Suspends until a slot frees up; grants are FIFO in arrival order.
    /// The returned permit holds the slot until dropped.
    ///
    /// # Errors
    /// Returns [`AdmissionError::QueueFull`] when `max_pending` requests are
    /// already waiting.
    pub async fn admit(&self) -> Result<AdmissionPermit, AdmissionError> {
        let waiting = self.pending.fetch_add(1, Ordering::SeqCst);
        if waiting >= self.max_pending {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(AdmissionError::QueueFull {
                max_pending: self.max_pending,
            });
        }

        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .expect("admission semaphore is never closed");

        self.pending.fetch_sub(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(AdmissionPermit {
            _permit: permit,
            active: Arc::clone(&self.active),
        })
    }

    /// Operations currently holding a slot
    #[inline]
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Requests currently waiting for a slot
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// A granted concurrency slot; releases on drop
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    active: Arc<AtomicUsize>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
