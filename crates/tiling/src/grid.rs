//! Grid derivation from a requested piece count.
//!
//! The layout scan starts at `floor(sqrt(n))` and walks row counts down
//! toward 1, taking the first divisor of `n`. Because 1 divides every
//! integer the scan always terminates, at worst with a `1 x n` strip; that
//! guarantee must survive any refactoring here.

use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// Row/column layout for a puzzle, derived from the requested piece count.
///
/// Invariant: `rows * cols == total_pieces`, with both dimensions >= 1.
/// Immutable once computed; callers derive a fresh grid whenever the
/// requested piece count changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PuzzleGrid {
    pub rows: u32,
    pub cols: u32,
    pub total_pieces: u32,
}

/// Pixel dimensions of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSize {
    pub width: u32,
    pub height: u32,
}

/// Derive a near-square grid layout for `requested_pieces`.
///
/// Fractional requests are rounded to the nearest integer (minimum 1);
/// non-finite requests and requests below 1 fail with
/// [`GridError::InvalidPieceCount`].
pub fn derive_grid(requested_pieces: f64) -> Result<PuzzleGrid, GridError> {
    if !requested_pieces.is_finite() || requested_pieces < 1.0 {
        return Err(GridError::InvalidPieceCount);
    }

    let total = requested_pieces.round().max(1.0) as u32;
    let sqrt = (total as f64).sqrt().floor() as u32;

    // Divisor 1 always matches, so the loop cannot fall through.
    for rows in (1..=sqrt.max(1)).rev() {
        if total % rows == 0 {
            return Ok(PuzzleGrid {
                rows,
                cols: total / rows,
                total_pieces: total,
            });
        }
    }

    unreachable!("scan terminates at rows = 1, which divides every integer")
}

/// Compute per-tile pixel dimensions for an image of `width x height`.
///
/// Integer truncation means the final row/column of the image may be left
/// over when the image dimensions are not exact multiples; that remainder
/// is dropped, not redistributed.
pub fn calculate_tile_size(width: u32, height: u32, grid: &PuzzleGrid) -> TileSize {
    TileSize {
        width: width / grid.cols,
        height: height / grid.rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_grid_products_match_request() {
        for n in 1..=2000u32 {
            let grid = derive_grid(n as f64).expect("valid count");
            assert_eq!(grid.rows * grid.cols, n, "n={n}");
            assert!(grid.rows >= 1);
            assert!(grid.cols >= 1);
            assert!(
                (grid.rows as f64) <= (n as f64).sqrt() + 1.0,
                "rows {} too large for n={n}",
                grid.rows
            );
        }
    }

    #[test]
    fn derive_grid_120_is_rectangular() {
        let grid = derive_grid(120.0).expect("valid count");
        assert_eq!(grid.rows * grid.cols, 120);
        assert_eq!((grid.rows, grid.cols), (10, 12));
    }

    #[test]
    fn derive_grid_prime_degenerates_to_strip() {
        let grid = derive_grid(17.0).expect("valid count");
        assert_eq!((grid.rows, grid.cols), (1, 17));
    }

    #[test]
    fn derive_grid_perfect_square() {
        let grid = derive_grid(36.0).expect("valid count");
        assert_eq!((grid.rows, grid.cols), (6, 6));
    }

    #[test]
    fn derive_grid_rounds_fractional_requests() {
        let grid = derive_grid(11.6).expect("valid count");
        assert_eq!(grid.total_pieces, 12);
    }

    #[test]
    fn derive_grid_rejects_invalid_counts() {
        assert_eq!(derive_grid(0.0), Err(GridError::InvalidPieceCount));
        assert_eq!(derive_grid(0.4), Err(GridError::InvalidPieceCount));
        assert_eq!(derive_grid(-3.0), Err(GridError::InvalidPieceCount));
        assert_eq!(derive_grid(f64::NAN), Err(GridError::InvalidPieceCount));
        assert_eq!(derive_grid(f64::INFINITY), Err(GridError::InvalidPieceCount));
    }

    #[test]
    fn tile_size_uses_floor_division() {
        let grid = PuzzleGrid {
            rows: 5,
            cols: 10,
            total_pieces: 50,
        };
        let size = calculate_tile_size(500, 250, &grid);
        assert_eq!(size, TileSize { width: 50, height: 50 });
    }

    #[test]
    fn tile_size_drops_remainder() {
        let grid = PuzzleGrid {
            rows: 2,
            cols: 5,
            total_pieces: 10,
        };
        let size = calculate_tile_size(103, 61, &grid);
        assert_eq!(size, TileSize { width: 20, height: 30 });
    }
}
