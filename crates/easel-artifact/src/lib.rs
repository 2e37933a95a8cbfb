//! Easel Artifact - fingerprinted visualization artifacts
//!
//! The value types shared by the build coordinator and its collaborators:
//! - [`Signature`]: 32-byte Blake3 fingerprint of a request's semantic content
//! - [`Artifact`]: the output of one successful layer build
//!
//! This crate is deliberately leaf-level: no async, no coordination logic.

#![warn(unreachable_pub)]

pub mod artifact;
pub mod signature;

pub use artifact::{Artifact, ArtifactId, LayerData};
pub use signature::{Signature, SignatureError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
