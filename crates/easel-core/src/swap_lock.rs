//! Exclusive swap lock
//!
//! Mutual exclusion around surface mutation, with a staleness escape: a
//! holder that has been sitting on the lock longer than the stale threshold
//! is presumed crashed, and a waiter may force-clear the lock and proceed.
//! Every force-clear is recorded as a recovered deadlock, never silently
//! absorbed.
//!
//! Waiters park on a [`Notify`] and additionally wake on an exponential
//! backoff schedule (doubling base with jitter, capped), so the staleness
//! check runs even when a holder vanishes without notifying.

use crate::error::SwapLockError;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

const BACKOFF_BASE: Duration = Duration::from_millis(10);
const BACKOFF_CAP: Duration = Duration::from_millis(1_000);

#[derive(Debug, Default)]
struct LockState {
    held: bool,
    holder_acquired_at: Option<Instant>,
    // Incremented on every successful claim; lets a guard detect that its
    // lock was force-cleared and re-claimed while it was still alive.
    epoch: u64,
}

/// Mutex over surface mutation with staleness detection
#[derive(Debug)]
pub struct ExclusiveSwapLock {
    state: Mutex<LockState>,
    notify: Notify,
    stale_threshold: Duration,
    recovered_deadlocks: AtomicU64,
}

impl ExclusiveSwapLock {
    /// Create new lock with the given staleness threshold
    #[inline]
    #[must_use]
    pub fn new(stale_threshold: Duration) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            notify: Notify::new(),
            stale_threshold,
            recovered_deadlocks: AtomicU64::new(0),
        }
    }

    /// Acquire the lock, waiting at most `timeout`
    ///
    /// # Errors
    /// Returns [`SwapLockError::AcquireTimeout`] if the lock stayed held by
    /// a live (non-stale) holder for the whole wait bound.
    pub async fn acquire(&self, timeout: Duration) -> Result<SwapGuard<'_>, SwapLockError> {
        let deadline = Instant::now() + timeout;
        let mut backoff = BACKOFF_BASE;

        loop {
            if let Some(epoch) = self.try_claim() {
                return Ok(SwapGuard { lock: self, epoch });
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(SwapLockError::AcquireTimeout {
                    waited_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }

            let wait = next_wait(backoff, deadline - now);
            tokio::select! {
                () = self.notify.notified() => {}
                () = tokio::time::sleep(wait) => {}
            }
            backoff = (backoff * 2).min(BACKOFF_CAP);
        }
    }

    /// Number of stale holders force-cleared over this lock's lifetime
    #[inline]
    #[must_use]
    pub fn recovered_deadlocks(&self) -> u64 {
        self.recovered_deadlocks.load(Ordering::Relaxed)
    }

    /// Check whether the lock is currently held
    #[inline]
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.state.lock().held
    }

    fn try_claim(&self) -> Option<u64> {
        let mut state = self.state.lock();
        if state.held {
            match state.holder_acquired_at {
                Some(at) if at.elapsed() >= self.stale_threshold => {
                    self.recovered_deadlocks.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        holder_age_ms = u64::try_from(at.elapsed().as_millis()).unwrap_or(u64::MAX),
                        "force-clearing stale swap lock; treating holder as crashed"
                    );
                }
                _ => return None,
            }
        }
        state.held = true;
        state.holder_acquired_at = Some(Instant::now());
        state.epoch += 1;
        Some(state.epoch)
    }

    fn release(&self, epoch: u64) {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            // Force-cleared and re-claimed while this guard was alive; the
            // lock now belongs to someone else.
            return;
        }
        state.held = false;
        state.holder_acquired_at = None;
        drop(state);
        self.notify.notify_one();
    }
}

fn next_wait(backoff: Duration, remaining: Duration) -> Duration {
    let jitter_cap = u64::try_from(backoff.as_millis() / 4).unwrap_or(u64::MAX).max(1);
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..jitter_cap));
    (backoff + jitter).min(remaining)
}

/// RAII guard over the swap lock; releases on drop
#[derive(Debug)]
pub struct SwapGuard<'a> {
    lock: &'a ExclusiveSwapLock,
    epoch: u64,
}

impl Drop for SwapGuard<'_> {
    fn drop(&mut self) {
        self.lock.release(self.epoch);
    }
}
