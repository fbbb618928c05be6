//! Engine-level error taxonomy.
//!
//! Each pipeline crate keeps its own typed errors; this is the surface the
//! session and its task channels expose to callers. Validation errors come
//! back synchronously before any background work starts; task-level errors
//! arrive as the terminal message on the task channel and roll the phase
//! back to its pre-task state. The engine never retries on its own.

use thiserror::Error;

use crate::session::Phase;
use features::{CacheError, ExtractionError};
use matcher::MatchError;
use store::StoreError;
use tiling::{GridError, SplitError};

/// Errors surfaced by the piece localization engine.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum EngineError {
    /// The requested piece count was non-finite or below 1.
    #[error("invalid piece count: must be a finite number >= 1")]
    InvalidPieceCount,

    /// An engine or match configuration failed validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The source or query bytes could not be decoded as an image.
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    /// Tiling failed mid-split; no partial tile set was published.
    #[error("split failed: {0}")]
    Split(String),

    /// A blob the matcher or cache needed was absent from the store.
    #[error("stored blob missing for key {0}")]
    StorageMissing(String),

    /// The storage backend itself failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The feature extractor failed.
    #[error("feature extraction failed: {0}")]
    Extraction(String),

    /// A newer request preempted this one before it finished.
    #[error("task superseded by a newer request")]
    TaskSuperseded,

    /// The operation is not allowed in the session's current phase.
    #[error("operation {operation} not allowed in phase {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },

    /// No source image has been uploaded (or it was already consumed and
    /// could not be recovered from the store).
    #[error("no source image available; upload a puzzle photo first")]
    NoSourceImage,

    /// The puzzle has not been split yet, so there is nothing to match.
    #[error("no tiles available; split the puzzle first")]
    NoTiles,

    /// Catch-all for failures with no more specific classification.
    #[error("engine error: {0}")]
    Unknown(String),
}

impl From<GridError> for EngineError {
    fn from(value: GridError) -> Self {
        match value {
            GridError::InvalidPieceCount => EngineError::InvalidPieceCount,
            other => EngineError::Unknown(other.to_string()),
        }
    }
}

impl From<SplitError> for EngineError {
    fn from(value: SplitError) -> Self {
        match value {
            SplitError::ImageDecode(message) => EngineError::ImageDecode(message),
            other => EngineError::Split(other.to_string()),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        EngineError::Storage(value.to_string())
    }
}

impl From<ExtractionError> for EngineError {
    fn from(value: ExtractionError) -> Self {
        EngineError::Extraction(value.to_string())
    }
}

impl From<CacheError> for EngineError {
    fn from(value: CacheError) -> Self {
        match value {
            CacheError::StorageMissing(key) => EngineError::StorageMissing(key),
            CacheError::Extraction(err) => err.into(),
            CacheError::Store(err) => err.into(),
            other => EngineError::Unknown(other.to_string()),
        }
    }
}

impl From<MatchError> for EngineError {
    fn from(value: MatchError) -> Self {
        match value {
            MatchError::InvalidConfig(message) => EngineError::InvalidConfig(message),
            other => EngineError::Unknown(other.to_string()),
        }
    }
}
