//! Build coordinator
//!
//! The top-level orchestrator that:
//! - Deduplicates concurrent requests by signature
//! - Serves fresh results without re-invoking the builder
//! - Bounds concurrent builds through the admission queue
//! - Serializes surface swaps behind the exclusive swap lock
//! - Contains failures with per-operation TTLs and the circuit breaker
//!
//! One coordinator exists per surface, constructed by whoever owns that
//! surface and handed its collaborators by dependency injection.

use crate::breaker::CircuitBreaker;
use crate::builder::LayerBuilder;
use crate::error::CoordinatorError;
use crate::metrics::{MetricsRecorder, MetricsSnapshot};
use crate::queue::{AdmissionPermit, OperationQueue};
use crate::signature::SignatureComputer;
use crate::surface::Surface;
use crate::swap_lock::ExclusiveSwapLock;
use crate::types::{BuildRequest, CoordinatorConfig};
use easel_artifact::{Artifact, Signature};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

type OpOutcome = Result<Arc<Artifact>, CoordinatorError>;
type OutcomeReceiver = watch::Receiver<Option<OpOutcome>>;
type OutcomeSender = watch::Sender<Option<OpOutcome>>;

/// One running operation, joinable by later identical requests
#[derive(Debug, Clone)]
struct InFlightOp {
    started_at: Instant,
    outcome: OutcomeReceiver,
}

/// The most recent successful build
#[derive(Debug)]
struct CompletedBuild {
    signature: Signature,
    artifact: Arc<Artifact>,
    completed_at: Instant,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    in_flight: HashMap<Signature, InFlightOp>,
    last_completed: Option<CompletedBuild>,
}

/// What the state check decided to do with a request
enum Admission {
    /// Serve this result without building
    Resolved(OpOutcome),
    /// An identical request is already running; wait on it
    Join(OutcomeReceiver),
    /// A different request is running; let it settle briefly
    Grace(OutcomeReceiver),
    /// Nothing relevant in flight
    Clear,
}

/// What the post-admission claim decided
enum Claimed {
    /// This request owns the build
    Owner(OutcomeSender),
    /// Completed while this request waited for a slot
    Resolved(OpOutcome),
    /// Claimed by an identical request while this one waited for a slot
    Join(OutcomeReceiver),
}

/// Coordinates visualization builds onto one shared surface
#[derive(Debug)]
pub struct BuildCoordinator {
    config: CoordinatorConfig,
    builder: Arc<dyn LayerBuilder>,
    surface: Arc<dyn Surface>,
    state: Mutex<CoordinatorState>,
    queue: OperationQueue,
    swap_lock: ExclusiveSwapLock,
    metrics: MetricsRecorder,
    breaker: CircuitBreaker,
}

impl BuildCoordinator {
    /// Create coordinator for one surface
    #[must_use]
    pub fn new(
        config: CoordinatorConfig,
        builder: Arc<dyn LayerBuilder>,
        surface: Arc<dyn Surface>,
    ) -> Self {
        let queue = OperationQueue::new(config.max_concurrent, config.max_pending);
        let swap_lock = ExclusiveSwapLock::new(config.lock_stale_threshold);
        let breaker = CircuitBreaker::new(config.circuit_min_samples, config.circuit_failure_ratio);
        Self {
            config,
            builder,
            surface,
            state: Mutex::new(CoordinatorState::default()),
            queue,
            swap_lock,
            metrics: MetricsRecorder::new(),
            breaker,
        }
    }

    /// Submit a build request
    ///
    /// Resolves with the installed artifact, a cached artifact when an
    /// identical request completed within the freshness window, or the
    /// shared result of an identical in-flight operation.
    ///
    /// # Errors
    /// See [`CoordinatorError`]; joined callers receive the same error as
    /// the owning caller.
    pub async fn submit(&self, request: BuildRequest) -> Result<Arc<Artifact>, CoordinatorError> {
        let signature = SignatureComputer::compute(&request)?;
        let ttl = self.config.ttl_for(&request);

        match self.check(&signature, true).await {
            Admission::Resolved(outcome) => {
                tracing::debug!(signature = %signature.short(), "serving fresh cached artifact");
                return outcome;
            }
            Admission::Join(rx) => return self.join(rx, &signature, ttl).await,
            Admission::Grace(rx) => self.grace(rx, &signature).await,
            Admission::Clear => {}
        }

        // Fail fast while the breaker is open: no builder call, no queueing.
        let snapshot = self.metrics.snapshot();
        if self.breaker.is_open(&snapshot) {
            tracing::warn!(
                signature = %signature.short(),
                failures = snapshot.timeout_errors,
                total = snapshot.total_operations,
                "circuit open; rejecting build request"
            );
            return Err(CoordinatorError::CircuitOpen {
                timeout_errors: snapshot.timeout_errors,
                total_operations: snapshot.total_operations,
            });
        }

        let permit = self.queue.admit().await?;

        // Re-check under the state lock: an identical request may have
        // completed or claimed ownership while this one waited for a slot.
        match self.claim(&signature).await {
            Claimed::Resolved(outcome) => {
                drop(permit);
                outcome
            }
            Claimed::Join(rx) => {
                drop(permit);
                self.join(rx, &signature, ttl).await
            }
            Claimed::Owner(tx) => self.run_owned(request, signature, ttl, tx, permit).await,
        }
    }

    /// Point-in-time metrics for this coordinator
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        let mut snapshot = self.metrics.snapshot();
        snapshot.recovered_deadlocks = self.swap_lock.recovered_deadlocks();
        snapshot
    }

    /// The most recently completed artifact, if any
    pub async fn current_artifact(&self) -> Option<Arc<Artifact>> {
        self.state
            .lock()
            .await
            .last_completed
            .as_ref()
            .map(|completed| Arc::clone(&completed.artifact))
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    async fn check(&self, signature: &Signature, allow_grace: bool) -> Admission {
        let state = self.state.lock().await;
        check_state(&state, signature, self.config.freshness_window, allow_grace)
    }

    /// Post-admission: either claim ownership or defer to whoever took it
    async fn claim(&self, signature: &Signature) -> Claimed {
        let mut state = self.state.lock().await;
        match check_state(&state, signature, self.config.freshness_window, false) {
            Admission::Resolved(outcome) => Claimed::Resolved(outcome),
            Admission::Join(rx) => Claimed::Join(rx),
            Admission::Grace(_) | Admission::Clear => {
                let (tx, rx) = watch::channel(None);
                state.in_flight.insert(
                    *signature,
                    InFlightOp {
                        started_at: Instant::now(),
                        outcome: rx,
                    },
                );
                Claimed::Owner(tx)
            }
        }
    }

    /// Execute the build as the owning caller and resolve everyone waiting
    async fn run_owned(
        &self,
        request: BuildRequest,
        signature: Signature,
        ttl: Duration,
        tx: OutcomeSender,
        permit: AdmissionPermit,
    ) -> OpOutcome {
        tracing::info!(
            signature = %signature.short(),
            caller = %request.caller,
            ttl_ms = millis(ttl),
            "claimed build ownership"
        );
        self.metrics.operation_started();
        let started = Instant::now();

        let outcome = self.execute(request, &signature, ttl, started).await;
        let duration = started.elapsed();

        self.metrics.record(outcome.is_ok(), duration);
        self.metrics.operation_finished();

        {
            let mut state = self.state.lock().await;
            if let Ok(artifact) = &outcome {
                state.last_completed = Some(CompletedBuild {
                    signature,
                    artifact: Arc::clone(artifact),
                    completed_at: Instant::now(),
                });
            }
            state.in_flight.remove(&signature);
        }

        resolve(&tx, &signature, outcome.clone());
        // Slot released only after waiters are resolved, so the next queued
        // request observes the updated state.
        drop(permit);
        outcome
    }

    /// Steps owned by the executing caller: build, then swap under the lock
    async fn execute(
        &self,
        request: BuildRequest,
        signature: &Signature,
        ttl: Duration,
        started: Instant,
    ) -> OpOutcome {
        let builder = Arc::clone(&self.builder);
        let mut build_task = tokio::spawn(async move { builder.build(request).await });

        let built = match tokio::time::timeout(ttl, &mut build_task).await {
            Err(_elapsed) => {
                tracing::warn!(
                    signature = %signature.short(),
                    ttl_ms = millis(ttl),
                    "build exceeded its ttl; the eventual result will be discarded"
                );
                discard_late_result(build_task);
                return Err(CoordinatorError::Timeout {
                    elapsed_ms: millis(started.elapsed()),
                    ttl_ms: millis(ttl),
                });
            }
            Ok(Err(join_error)) => {
                return Err(CoordinatorError::Build(format!(
                    "builder task failed: {join_error}"
                )));
            }
            Ok(Ok(Err(build_error))) => {
                return Err(CoordinatorError::Build(build_error.to_string()));
            }
            Ok(Ok(Ok(artifact))) => Arc::new(artifact),
        };

        // TTL accounting continues through the swap: an operation whose
        // timer already fired must not start mutating the surface.
        let remaining = ttl.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return Err(CoordinatorError::Timeout {
                elapsed_ms: millis(started.elapsed()),
                ttl_ms: millis(ttl),
            });
        }

        let lock_bound = remaining.min(self.config.lock_acquire_timeout);
        let guard = match self.swap_lock.acquire(lock_bound).await {
            Ok(guard) => guard,
            Err(lock_error) => {
                return Err(if started.elapsed() >= ttl {
                    CoordinatorError::Timeout {
                        elapsed_ms: millis(started.elapsed()),
                        ttl_ms: millis(ttl),
                    }
                } else {
                    CoordinatorError::Lock(lock_error)
                });
            }
        };

        self.surface
            .install_and_remove_previous(Arc::clone(&built))
            .await;
        drop(guard);

        tracing::info!(
            artifact = %built.id,
            signature = %signature.short(),
            "installed artifact on surface"
        );
        Ok(built)
    }

    /// Wait on an identical in-flight operation and share its result
    async fn join(&self, mut rx: OutcomeReceiver, signature: &Signature, ttl: Duration) -> OpOutcome {
        let bound = ttl.min(self.config.join_wait_bound);
        tracing::debug!(signature = %signature.short(), "joining in-flight build");

        let waited = tokio::time::timeout(bound, async {
            loop {
                let current = rx.borrow().as_ref().cloned();
                if let Some(outcome) = current {
                    return outcome;
                }
                if rx.changed().await.is_err() {
                    tracing::error!(
                        signature = %signature.short(),
                        "in-flight operation vanished without resolving"
                    );
                    return Err(CoordinatorError::Build(
                        "in-flight operation vanished without resolving".to_string(),
                    ));
                }
            }
        })
        .await;

        match waited {
            Ok(outcome) => outcome,
            Err(_elapsed) => Err(CoordinatorError::JoinLapsed {
                waited_ms: millis(bound),
            }),
        }
    }

    /// Let a different-signature operation settle before proceeding
    async fn grace(&self, mut rx: OutcomeReceiver, signature: &Signature) {
        if rx.borrow().is_some() {
            return;
        }
        tracing::debug!(
            signature = %signature.short(),
            "waiting for a different in-flight build to settle"
        );
        let _ = tokio::time::timeout(self.config.different_signature_grace, rx.changed()).await;
    }
}

fn check_state(
    state: &CoordinatorState,
    signature: &Signature,
    freshness_window: Duration,
    allow_grace: bool,
) -> Admission {
    if let Some(last) = &state.last_completed {
        if &last.signature == signature && last.completed_at.elapsed() < freshness_window {
            return Admission::Resolved(Ok(Arc::clone(&last.artifact)));
        }
    }
    if let Some(op) = state.in_flight.get(signature) {
        return Admission::Join(op.outcome.clone());
    }
    if allow_grace {
        if let Some(op) = state.in_flight.values().max_by_key(|op| op.started_at) {
            return Admission::Grace(op.outcome.clone());
        }
    }
    Admission::Clear
}

/// Resolve the owner and every joined waiter exactly once
fn resolve(tx: &OutcomeSender, signature: &Signature, outcome: OpOutcome) {
    if tx.borrow().is_some() {
        // Double resolution is an internal invariant violation; the first
        // resolution stands and is never re-surfaced to callers.
        tracing::error!(
            signature = %signature.short(),
            "attempted to resolve an operation twice"
        );
        return;
    }
    tx.send_replace(Some(outcome));
}

/// Detach a timed-out build and drop whatever it eventually produces
fn discard_late_result(task: JoinHandle<Result<Artifact, crate::builder::BuildError>>) {
    tokio::spawn(async move {
        match task.await {
            Ok(Ok(artifact)) => {
                tracing::debug!(artifact = %artifact.id, "discarding stale build result");
            }
            Ok(Err(error)) => {
                tracing::debug!(%error, "stale build failed after its caller timed out");
            }
            Err(_) => {}
        }
    });
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
