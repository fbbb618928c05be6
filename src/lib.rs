//! Piecefind: locate a photographed jigsaw piece in a tiled reference image.
//!
//! This crate stitches the pipeline stages together so callers can drive a
//! whole puzzle session through a single API entry point:
//!
//! - `tiling` derives the grid and cuts the reference photo into tile PNGs
//!   with thumbnails;
//! - `hierarchy` builds the quad-tree spatial index over tile centers;
//! - `features` turns image bytes into feature vectors behind the
//!   [`FeatureExtractor`] boundary and memoizes them per session;
//! - `store` persists tile blobs, thumbnails, vectors, and hierarchy
//!   snapshots behind the [`BlobStore`] trait;
//! - `matcher` ranks candidate positions by cosine similarity with
//!   hierarchical descent and a low-confidence fallback scan.
//!
//! [`PuzzleSession`] is the orchestrator: it owns the phase state machine
//! (`idle -> splitting -> ready -> matching -> match-found |
//! match-not-found`), and wraps splitting and matching as cancellable,
//! progress-emitting background tasks with at most one in flight per task
//! type: a newer request supersedes a pending one instead of queueing.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use piecefind::{PuzzleSession, StubExtractor};
//!
//! let session = PuzzleSession::in_memory(Arc::new(StubExtractor::default()))?;
//!
//! let photo = std::fs::read("puzzle.jpg")?;
//! let grid = session.upload(&photo, 120.0)?;
//! println!("layout: {} x {}", grid.rows, grid.cols);
//!
//! // Split in the background, watching progress.
//! let outcome = session.split()?.blocking_wait()?;
//! println!("{} tiles ready", outcome.tiles.len());
//!
//! // Match a photographed piece.
//! let piece_photo = std::fs::read("piece.jpg")?;
//! let result = session.match_piece(piece_photo)?.blocking_wait()?;
//! match result.best_match {
//!     Some(hit) => println!("row {}, col {} (score {:.2})", hit.row, hit.col, hit.score),
//!     None => println!("no confident match"),
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod error;
mod session;
mod task;

pub use crate::config::EngineConfig;
pub use crate::error::EngineError;
pub use crate::session::{Phase, PuzzleSession};
pub use crate::task::{ProgressSink, TaskEvent, TaskHandle, TaskRunner};

pub use features::{CacheError, ExtractionError, FeatureCache, FeatureExtractor, StubExtractor};
pub use hierarchy::{
    build_hierarchy, HierarchyConfig, HierarchyConfigError, HierarchyNode, RegionBounds,
};
pub use matcher::{
    cosine_similarity, HierarchyPathItem, MatchCandidate, MatchConfig, MatchError, MatchOutcome,
};
pub use store::{BlobStore, FsStore, InMemoryStore, StoreConfig, StoreError};
pub use tiling::{
    calculate_tile_size, decode_image, derive_grid, GridError, PuzzleGrid, SplitConfig, SplitError,
    SplitOutcome, TileRecord, TileSize,
};
