//! Data model for split output.

use serde::{Deserialize, Serialize};

/// Metadata for one tile of the partitioned puzzle image.
///
/// Created in bulk by the splitter. `feature_key` and `score` are filled in
/// later by the feature cache and match results; tiles are never deleted
/// individually, only cleared wholesale on session reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    /// Unique id within a puzzle: `{puzzle_id}-{row}-{col}`.
    pub id: String,
    pub row: u32,
    pub col: u32,
    pub width: u32,
    pub height: u32,
    /// Blob-store key of the full tile image.
    pub blob_key: String,
    /// Blob-store key of the scaled thumbnail.
    pub thumbnail_key: String,
    /// Blob-store key of the cached feature vector, once computed.
    #[serde(default)]
    pub feature_key: Option<String>,
    /// Similarity score from the most recent match run, if any.
    #[serde(default)]
    pub score: Option<f32>,
}

impl TileRecord {
    /// Default feature-vector key for this tile.
    pub fn default_feature_key(&self) -> String {
        format!("{}-feature", self.id)
    }
}

/// One split tile together with its encoded image payloads.
///
/// The splitter returns these; persisting the blobs is the caller's job.
#[derive(Debug, Clone)]
pub struct SplitPiece {
    pub record: TileRecord,
    /// PNG-encoded tile image.
    pub blob: Vec<u8>,
    /// PNG-encoded thumbnail.
    pub thumbnail: Vec<u8>,
}

/// Terminal payload of a completed split operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitOutcome {
    pub puzzle_id: String,
    pub tiles: Vec<TileRecord>,
}
