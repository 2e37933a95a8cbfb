//! Testing utilities for the Easel workspace
//!
//! Shared fakes, fixtures, and assertions: a scripted layer builder, an
//! in-memory recording surface, and request helpers.

#![allow(missing_docs)]

use async_trait::async_trait;
use easel_artifact::{Artifact, ArtifactId, LayerData, Signature};
use easel_core::{
    BuildCoordinator, BuildError, BuildRequest, CallerId, CoordinatorConfig, DatasetRef,
    LayerBuilder, RenderSpec, SignatureComputer, Surface,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One scripted builder invocation
#[derive(Debug, Clone)]
pub enum BuildStep {
    Succeed { delay: Duration },
    Fail { delay: Duration, message: String },
}

/// Layer builder whose behavior is scripted per invocation
///
/// Steps are consumed in order; once the script is exhausted every further
/// call succeeds after the default delay. Tracks invocation count and the
/// highest number of concurrently running builds it has observed.
#[derive(Debug, Default)]
pub struct ScriptedBuilder {
    script: Mutex<VecDeque<BuildStep>>,
    default_delay: Duration,
    invocations: AtomicUsize,
    running: AtomicUsize,
    max_running_seen: AtomicUsize,
    started_metrics: Mutex<Vec<String>>,
}

impl ScriptedBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    #[must_use]
    pub fn then_succeed_after(self, delay: Duration) -> Self {
        self.script.lock().push_back(BuildStep::Succeed { delay });
        self
    }

    #[must_use]
    pub fn then_fail_after(self, delay: Duration, message: impl Into<String>) -> Self {
        self.script.lock().push_back(BuildStep::Fail {
            delay,
            message: message.into(),
        });
        self
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn max_running_seen(&self) -> usize {
        self.max_running_seen.load(Ordering::SeqCst)
    }

    /// Metric of each request, in the order builds started
    pub fn started_metrics(&self) -> Vec<String> {
        self.started_metrics.lock().clone()
    }
}

#[async_trait]
impl LayerBuilder for ScriptedBuilder {
    async fn build(&self, request: BuildRequest) -> Result<Artifact, BuildError> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.started_metrics.lock().push(request.spec.metric.clone());
        let now_running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running_seen.fetch_max(now_running, Ordering::SeqCst);

        let step = self.script.lock().pop_front().unwrap_or(BuildStep::Succeed {
            delay: self.default_delay,
        });

        let result = match step {
            BuildStep::Succeed { delay } => {
                tokio::time::sleep(delay).await;
                build_artifact(&request)
            }
            BuildStep::Fail { delay, message } => {
                tokio::time::sleep(delay).await;
                Err(BuildError::new(message))
            }
        };

        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn build_artifact(request: &BuildRequest) -> Result<Artifact, BuildError> {
    let signature =
        SignatureComputer::compute(request).map_err(|err| BuildError::new(err.to_string()))?;
    Ok(Artifact::new(
        signature,
        LayerData::new(
            request.spec.metric.clone(),
            request.spec.dataset.feature_count,
            Vec::new(),
        ),
    ))
}

/// In-memory surface that records every install
#[derive(Debug, Default)]
pub struct RecordingSurface {
    installed: Mutex<Vec<Arc<Artifact>>>,
    install_log: Mutex<Vec<ArtifactId>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an artifact without going through the coordinator
    pub fn preinstall(&self, artifact: Arc<Artifact>) {
        self.installed.lock().push(artifact);
    }

    /// IDs installed through the coordinator, in order
    pub fn install_log(&self) -> Vec<ArtifactId> {
        self.install_log.lock().clone()
    }
}

#[async_trait]
impl Surface for RecordingSurface {
    async fn install_and_remove_previous(&self, artifact: Arc<Artifact>) {
        let mut installed = self.installed.lock();
        installed.clear();
        installed.push(Arc::clone(&artifact));
        drop(installed);
        self.install_log.lock().push(artifact.id);
    }

    async fn list(&self) -> Vec<Arc<Artifact>> {
        self.installed.lock().clone()
    }
}

/// Spec under the default fast-workload threshold
pub fn small_spec(metric: &str) -> RenderSpec {
    RenderSpec::new(DatasetRef::new("precincts-2024", 120), metric)
}

/// Spec well over the default fast-workload threshold
pub fn large_spec(metric: &str) -> RenderSpec {
    RenderSpec::new(DatasetRef::new("blocks-statewide", 50_000), metric)
}

/// Request for a small workload, submitted by a test caller
pub fn small_request(metric: &str) -> BuildRequest {
    BuildRequest::new(small_spec(metric), CallerId::new("test"))
}

/// Artifact suitable for pre-seeding a surface
pub fn seeded_artifact(name: &str) -> Arc<Artifact> {
    Arc::new(Artifact::new(
        Signature::compute(name.as_bytes()),
        LayerData::new(name, 0, Vec::new()),
    ))
}

/// Wire a coordinator to scripted collaborators
pub fn coordinator_with(
    config: CoordinatorConfig,
    builder: &Arc<ScriptedBuilder>,
    surface: &Arc<RecordingSurface>,
) -> BuildCoordinator {
    BuildCoordinator::new(
        config,
        Arc::clone(builder) as Arc<dyn LayerBuilder>,
        Arc::clone(surface) as Arc<dyn Surface>,
    )
}
