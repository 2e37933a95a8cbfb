//! Shared surface contract
//!
//! The surface is the single mutable resource outside the coordinator: the
//! container holding the currently displayed artifact. The coordinator only
//! calls [`Surface::install_and_remove_previous`] while holding the
//! exclusive swap lock, so implementations see strictly serialized swaps.

use async_trait::async_trait;
use easel_artifact::Artifact;
use std::sync::Arc;

/// Shared mutable container for the installed artifact
#[async_trait]
pub trait Surface: Send + Sync + std::fmt::Debug {
    /// Install `artifact` and release whatever was installed before it
    ///
    /// The two steps must look atomic to observers: after this returns, the
    /// surface holds exactly the new artifact.
    async fn install_and_remove_previous(&self, artifact: Arc<Artifact>);

    /// Artifacts currently installed on the surface
    async fn list(&self) -> Vec<Arc<Artifact>>;
}
