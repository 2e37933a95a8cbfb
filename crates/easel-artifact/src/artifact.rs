//! Visualization artifacts
//!
//! An [`Artifact`] is the output of one successful layer build: the rendered
//! layer data plus the signature of the request that produced it. Once
//! installed on a surface, the artifact is exclusively owned by that surface
//! until a newer one replaces it.

use crate::signature::Signature;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique artifact identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArtifactId(pub Ulid);

impl ArtifactId {
    /// Generate new artifact ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rendered layer payload
///
/// Opaque to the coordinator: geometry conversion, styling, and legend
/// formatting all happen in the builder before this struct exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerData {
    /// Human-readable layer name
    pub name: String,
    /// Number of rendered features
    pub feature_count: usize,
    /// Encoded layer bytes (format is a builder concern)
    pub encoded: Vec<u8>,
}

impl LayerData {
    /// Create new layer data
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, feature_count: usize, encoded: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            feature_count,
            encoded,
        }
    }
}

/// A built visualization artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Artifact identifier
    pub id: ArtifactId,
    /// Signature of the request this artifact was built from
    pub signature: Signature,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Rendered layer payload
    pub layer: LayerData,
}

impl Artifact {
    /// Create new artifact for a request signature
    #[inline]
    #[must_use]
    pub fn new(signature: Signature, layer: LayerData) -> Self {
        Self {
            id: ArtifactId::new(),
            signature,
            created_at: Utc::now(),
            layer,
        }
    }

    /// Get artifact ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> ArtifactId {
        self.id
    }

    /// Get the signature this artifact satisfies
    #[inline]
    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}
