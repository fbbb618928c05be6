//! Puzzle photo tiling.
//!
//! This is where a puzzle enters the localization pipeline. We take a
//! decoded reference photo plus a requested piece count, derive a row/column
//! grid for it, and cut the photo into per-tile PNGs with thumbnails that
//! downstream stages can index and match against.
//!
//! ## What we do here
//!
//! - **Derive grids** - near-square row/column layouts from a piece count,
//!   with the scan-to-1 termination guarantee (a prime count degenerates to
//!   a single row rather than failing).
//! - **Size tiles** - floor-division pixel sizing; the ragged remainder at
//!   the right/bottom edge is dropped by design.
//! - **Split images** - row-major cropping, PNG encoding, proportional
//!   thumbnails, one progress callback per completed tile.
//! - **Decode uploads** - [`decode_image`] is the typed decode boundary for
//!   both puzzle uploads and query photos.
//!
//! Splitting consumes the source image: ownership moves in, and the pixels
//! are released when the call returns, whether it succeeded or not.

mod config;
mod error;
mod grid;
mod splitter;
mod types;

pub use crate::config::SplitConfig;
pub use crate::error::{GridError, SplitError};
pub use crate::grid::{calculate_tile_size, derive_grid, PuzzleGrid, TileSize};
pub use crate::splitter::{decode_image, split_image};
pub use crate::types::{SplitOutcome, SplitPiece, TileRecord};

pub use image::DynamicImage;
