//! Easel Core - visualization build coordination
//!
//! The coordinator that accepts requests to (re)compute a derived visual
//! artifact and install it onto a single shared surface, guaranteeing:
//! - At most one concurrent build per logical request (signature dedup)
//! - A bounded number of concurrent builds
//! - Strictly serialized surface mutation
//! - Failure containment via TTLs and a circuit breaker
//!
//! # Example
//!
//! ```rust,ignore
//! use easel_core::{BuildCoordinator, BuildRequest, CallerId, CoordinatorConfig};
//!
//! # async fn example(builder: std::sync::Arc<dyn easel_core::LayerBuilder>,
//! #                  surface: std::sync::Arc<dyn easel_core::Surface>,
//! #                  spec: easel_core::RenderSpec) -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = BuildCoordinator::new(CoordinatorConfig::new(), builder, surface);
//!
//! let artifact = coordinator
//!     .submit(BuildRequest::new(spec, CallerId::new("ui")))
//!     .await?;
//!
//! println!("installed {}", artifact.id);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod breaker;
pub mod builder;
pub mod coordinator;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod signature;
pub mod surface;
pub mod swap_lock;
pub mod types;

// Re-exports for convenience
pub use breaker::{CircuitBreaker, CircuitState};
pub use builder::{BuildError, LayerBuilder};
pub use coordinator::BuildCoordinator;
pub use error::{AdmissionError, CoordinatorError, SwapLockError};
pub use metrics::{MetricsRecorder, MetricsSnapshot};
pub use queue::{AdmissionPermit, OperationQueue};
pub use signature::SignatureComputer;
pub use surface::Surface;
pub use swap_lock::{ExclusiveSwapLock, SwapGuard};
pub use types::{BuildRequest, CallerId, CoordinatorConfig, DatasetRef, RenderSpec};

// Artifact value types come from the leaf crate
pub use easel_artifact::{Artifact, ArtifactId, LayerData, Signature, SignatureError};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with the build coordinator
    pub use crate::{
        Artifact, BuildCoordinator, BuildRequest, CallerId, CoordinatorConfig, CoordinatorError,
        DatasetRef, LayerBuilder, MetricsSnapshot, RenderSpec, Surface,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
