//! Feature vectors for puzzle tiles.
//!
//! The extraction model itself is an external capability: anything that can
//! turn encoded image bytes into a fixed-length `Vec<f32>` implements
//! [`FeatureExtractor`]. The engine never looks inside the vectors beyond
//! requiring a consistent dimension per session.
//!
//! [`FeatureCache`] memoizes vectors per tile and per hierarchy node with
//! read-through-compute-on-miss semantics: memory first, then the blob
//! store, then the extractor. Node vectors are the element-wise mean of
//! their member tiles' vectors. The cache lives exactly as long as one
//! puzzle session and is cleared wholesale on reset.
//!
//! [`StubExtractor`] is a deterministic, dependency-free extractor for
//! tests and offline runs: identical bytes always produce identical
//! vectors, and unrelated bytes produce near-orthogonal ones.

mod cache;
mod stub;

pub use crate::cache::{CacheError, FeatureCache};
pub use crate::stub::StubExtractor;

use thiserror::Error;

/// Errors raised by feature extractors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExtractionError {
    /// The input bytes could not be decoded as an image.
    #[error("undecodable input: {0}")]
    Undecodable(String),
    /// The extractor itself failed (model error, backend unavailable, ...).
    #[error("feature extraction failed: {0}")]
    Failed(String),
}

/// External capability that maps an image region to a feature vector.
///
/// Implementations must be deterministic: identical input bytes must yield
/// identical vectors, or match results stop being reproducible. The vector
/// length must be constant for the lifetime of a session; the first vector
/// computed establishes the session dimension.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, image_bytes: &[u8]) -> Result<Vec<f32>, ExtractionError>;
}
