//! Error types produced by the tiling crate.
//!
//! Grid validation failures are separated from split failures so callers can
//! reject bad piece counts synchronously, before any image work starts.

use thiserror::Error;

/// Errors raised while deriving a grid layout from a requested piece count.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GridError {
    /// The requested piece count was not a finite number >= 1.
    #[error("invalid piece count: must be a finite number >= 1")]
    InvalidPieceCount,
}

/// Errors raised while decoding or splitting a puzzle image.
///
/// All variants are cloneable and comparable so task channels can carry them
/// and tests can match on them precisely.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SplitError {
    /// The source or query bytes could not be decoded as an image.
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    /// A tile crop region fell outside the source image bounds.
    #[error("tile crop out of bounds at row {row}, col {col}")]
    CropOutOfBounds { row: u32, col: u32 },

    /// Encoding a tile or thumbnail image failed. Aborts the remaining
    /// tiles; no partial tile set is returned.
    #[error("tile encode failed at row {row}, col {col}: {message}")]
    Encode {
        row: u32,
        col: u32,
        message: String,
    },

    /// The split configuration failed validation.
    #[error("invalid split config: {0}")]
    InvalidConfig(String),
}
