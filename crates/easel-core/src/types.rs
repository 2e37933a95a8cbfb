//! Core types for the build coordinator
//!
//! Defines the fundamental types for coordination:
//! - Build requests and their semantic content
//! - Caller identity
//! - Coordinator configuration

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Reference to the dataset a layer is derived from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    /// Dataset identifier
    pub id: String,
    /// Number of features in the dataset (drives the TTL class)
    pub feature_count: usize,
}

impl DatasetRef {
    /// Create new dataset reference
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>, feature_count: usize) -> Self {
        Self {
            id: id.into(),
            feature_count,
        }
    }
}

/// Semantic content of a build request
///
/// This is the *only* input to signature computation: two requests with
/// equal `RenderSpec`s are the same logical request no matter who submitted
/// them or when. Filters use an ordered map so serialization is canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSpec {
    /// Dataset the layer is derived from
    pub dataset: DatasetRef,
    /// Metric to visualize (e.g. "turnout", "margin_shift")
    pub metric: String,
    /// Segment filters, keyed by dimension
    pub filters: BTreeMap<String, String>,
    /// Style token resolved by the builder
    pub style: String,
}

impl RenderSpec {
    /// Create new render spec with default style
    #[inline]
    #[must_use]
    pub fn new(dataset: DatasetRef, metric: impl Into<String>) -> Self {
        Self {
            dataset,
            metric: metric.into(),
            filters: BTreeMap::new(),
            style: "default".to_string(),
        }
    }

    /// Add a segment filter
    #[inline]
    #[must_use]
    pub fn with_filter(mut self, dimension: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(dimension.into(), value.into());
        self
    }

    /// With style token
    #[inline]
    #[must_use]
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = style.into();
        self
    }
}

/// Opaque caller label (UI event, background refresh, agent request)
///
/// Never part of the request signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerId(String);

impl CallerId {
    /// Create new caller ID
    #[inline]
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Get the label
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CallerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request to (re)build the layer shown on a surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Semantic content (the signed part)
    pub spec: RenderSpec,
    /// Submitting caller
    pub caller: CallerId,
    /// Requested TTL override; `None` selects a class-based default
    pub ttl: Option<Duration>,
}

impl BuildRequest {
    /// Create new build request
    #[inline]
    #[must_use]
    pub fn new(spec: RenderSpec, caller: CallerId) -> Self {
        Self {
            spec,
            caller,
            ttl: None,
        }
    }

    /// With explicit TTL
    #[inline]
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Maximum operations in the Running state at once
    pub max_concurrent: usize,
    /// Default operation TTL
    pub default_ttl: Duration,
    /// TTL for small workloads
    pub fast_ttl: Duration,
    /// Feature count at or under which a workload gets the fast TTL
    pub fast_workload_threshold: usize,
    /// Window during which a completed build satisfies an identical request
    pub freshness_window: Duration,
    /// Upper bound on waiting for an in-flight operation when joining it
    pub join_wait_bound: Duration,
    /// Grace period to let a different-signature operation settle
    pub different_signature_grace: Duration,
    /// Bound on waiting for the surface swap lock
    pub lock_acquire_timeout: Duration,
    /// Lock holder age after which a waiter may force-clear the lock
    pub lock_stale_threshold: Duration,
    /// Minimum failed samples before the circuit breaker may open
    pub circuit_min_samples: u64,
    /// Failure ratio above which the circuit breaker opens
    pub circuit_failure_ratio: f64,
    /// Maximum requests waiting for admission before rejection
    pub max_pending: usize,
}

impl CoordinatorConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With max concurrent operations
    #[inline]
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// With default TTL
    #[inline]
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// With freshness window
    #[inline]
    #[must_use]
    pub fn with_freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    /// With lock staleness threshold
    #[inline]
    #[must_use]
    pub fn with_lock_stale_threshold(mut self, threshold: Duration) -> Self {
        self.lock_stale_threshold = threshold;
        self
    }

    /// With circuit breaker thresholds
    #[inline]
    #[must_use]
    pub fn with_circuit_thresholds(mut self, min_samples: u64, failure_ratio: f64) -> Self {
        self.circuit_min_samples = min_samples;
        self.circuit_failure_ratio = failure_ratio;
        self
    }

    /// With admission queue bound
    #[inline]
    #[must_use]
    pub fn with_max_pending(mut self, max: usize) -> Self {
        self.max_pending = max;
        self
    }

    /// Resolve the TTL for a request: explicit override, else class default
    #[inline]
    #[must_use]
    pub fn ttl_for(&self, request: &BuildRequest) -> Duration {
        request.ttl.unwrap_or(
            if request.spec.dataset.feature_count <= self.fast_workload_threshold {
                self.fast_ttl
            } else {
                self.default_ttl
            },
        )
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            default_ttl: Duration::from_millis(45_000),
            fast_ttl: Duration::from_millis(15_000),
            fast_workload_threshold: 500,
            freshness_window: Duration::from_millis(5_000),
            join_wait_bound: Duration::from_millis(30_000),
            different_signature_grace: Duration::from_millis(2_000),
            lock_acquire_timeout: Duration::from_millis(10_000),
            lock_stale_threshold: Duration::from_millis(30_000),
            circuit_min_samples: 3,
            circuit_failure_ratio: 0.5,
            max_pending: 50,
        }
    }
}
