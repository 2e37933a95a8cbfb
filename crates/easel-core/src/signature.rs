//! Request signature derivation
//!
//! Maps a [`BuildRequest`] to the canonical [`Signature`] of its semantic
//! content. Caller identity, TTL overrides, and timestamps never reach the
//! fingerprint: two logically identical requests must always collide here,
//! because the coordinator deduplicates in-flight work by this value.

use crate::types::BuildRequest;
use easel_artifact::{Signature, SignatureError};

/// Derives canonical fingerprints from build requests
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureComputer;

impl SignatureComputer {
    /// Compute the signature of a request's semantic content
    ///
    /// Pure and deterministic: hashes `request.spec` only.
    ///
    /// # Errors
    /// Returns [`SignatureError`] if the spec cannot be serialized; the
    /// failure is synchronous and mutates no coordinator state.
    #[inline]
    pub fn compute(request: &BuildRequest) -> Result<Signature, SignatureError> {
        Signature::compute_serializable(&request.spec)
    }
}
