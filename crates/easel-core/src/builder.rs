//! Layer builder contract
//!
//! The coordinator never constructs artifacts itself: geometry conversion,
//! styling, and legend formatting live behind this trait. A builder call may
//! suspend arbitrarily long; the coordinator bounds the wait with the
//! operation TTL and discards results that arrive after the timer fired.

use crate::types::BuildRequest;
use async_trait::async_trait;
use easel_artifact::Artifact;

/// Error returned by a layer builder
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct BuildError(String);

impl BuildError {
    /// Create new build error
    #[inline]
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Produces visualization artifacts from build requests
#[async_trait]
pub trait LayerBuilder: Send + Sync + std::fmt::Debug {
    /// Build the artifact described by the request
    ///
    /// # Errors
    /// Returns [`BuildError`] when the layer cannot be produced.
    async fn build(&self, request: BuildRequest) -> Result<Artifact, BuildError>;
}
