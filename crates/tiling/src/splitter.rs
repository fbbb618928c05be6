//! Tile splitter: cut a decoded puzzle image into a grid of tile PNGs.

use std::io::Cursor;
use std::time::Instant;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use tracing::{info, warn, Level};

use crate::config::SplitConfig;
use crate::error::SplitError;
use crate::grid::{PuzzleGrid, TileSize};
use crate::types::{SplitPiece, TileRecord};

/// Decode raw image bytes (PNG/JPEG/WebP) into a [`DynamicImage`].
///
/// This is the decode boundary for both puzzle uploads and query photos;
/// unreadable bytes surface as [`SplitError::ImageDecode`].
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, SplitError> {
    image::load_from_memory(bytes).map_err(|err| SplitError::ImageDecode(err.to_string()))
}

/// Split `source` into `grid.rows * grid.cols` tiles in row-major order.
///
/// Each tile is cropped at `(col * tile_width, row * tile_height)`, encoded
/// as PNG, and paired with a proportionally scaled thumbnail capped at
/// `cfg.thumbnail_max_dim` (aspect-preserving, never upscaled). `progress`
/// is invoked once per completed tile with `(processed, total)`, strictly
/// increasing up to `total = rows * cols`.
///
/// The source image is consumed: ownership moves into the splitter and the
/// pixel data is released when this function returns, on success or failure.
/// Any crop or encode failure aborts the remaining tiles; no partial tile
/// set is returned.
pub fn split_image<F>(
    source: DynamicImage,
    puzzle_id: &str,
    grid: &PuzzleGrid,
    tile_size: TileSize,
    cfg: &SplitConfig,
    progress: F,
) -> Result<Vec<SplitPiece>, SplitError>
where
    F: Fn(usize, usize),
{
    cfg.validate()?;

    let start = Instant::now();
    let span = tracing::span!(
        Level::INFO,
        "split.split_image",
        puzzle_id = %puzzle_id,
        rows = grid.rows,
        cols = grid.cols,
    );
    let _guard = span.enter();

    match split_inner(&source, puzzle_id, grid, tile_size, cfg, progress) {
        Ok(pieces) => {
            let elapsed_micros = start.elapsed().as_micros();
            info!(tiles = pieces.len(), elapsed_micros, "split_success");
            Ok(pieces)
        }
        Err(err) => {
            let elapsed_micros = start.elapsed().as_micros();
            warn!(error = %err, elapsed_micros, "split_failure");
            Err(err)
        }
    }
}

fn split_inner<F>(
    source: &DynamicImage,
    puzzle_id: &str,
    grid: &PuzzleGrid,
    tile_size: TileSize,
    cfg: &SplitConfig,
    progress: F,
) -> Result<Vec<SplitPiece>, SplitError>
where
    F: Fn(usize, usize),
{
    let total = (grid.rows * grid.cols) as usize;
    let mut pieces = Vec::with_capacity(total);

    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let sx = col * tile_size.width;
            let sy = row * tile_size.height;
            if sx + tile_size.width > source.width() || sy + tile_size.height > source.height() {
                return Err(SplitError::CropOutOfBounds { row, col });
            }

            let tile = source.crop_imm(sx, sy, tile_size.width, tile_size.height);
            let blob = encode_png(&tile).map_err(|err| SplitError::Encode {
                row,
                col,
                message: err.to_string(),
            })?;

            let thumb = make_thumbnail(&tile, cfg.thumbnail_max_dim);
            let thumbnail = encode_png(&thumb).map_err(|err| SplitError::Encode {
                row,
                col,
                message: err.to_string(),
            })?;

            let id = format!("{puzzle_id}-{row}-{col}");
            pieces.push(SplitPiece {
                record: TileRecord {
                    blob_key: format!("{id}-blob"),
                    thumbnail_key: format!("{id}-thumb"),
                    id,
                    row,
                    col,
                    width: tile_size.width,
                    height: tile_size.height,
                    feature_key: None,
                    score: None,
                },
                blob,
                thumbnail,
            });
            progress(pieces.len(), total);
        }
    }

    Ok(pieces)
}

/// Scale a tile down so its longest edge fits `max_dim`, preserving aspect
/// ratio. Tiles already within bounds are returned at their original size.
fn make_thumbnail(tile: &DynamicImage, max_dim: u32) -> DynamicImage {
    let (w, h) = (tile.width(), tile.height());
    let ratio = (max_dim as f64 / w as f64)
        .min(max_dim as f64 / h as f64)
        .min(1.0);
    let tw = ((w as f64 * ratio).round() as u32).max(1);
    let th = ((h as f64 * ratio).round() as u32).max(1);
    if (tw, th) == (w, h) {
        return tile.clone();
    }
    tile.resize_exact(tw, th, FilterType::Triangle)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{calculate_tile_size, derive_grid};
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;

    fn checkerboard(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([
                (x % 251) as u8,
                (y % 251) as u8,
                ((x + y) % 251) as u8,
                255,
            ])
        }))
    }

    #[test]
    fn split_produces_row_major_tiles() {
        let grid = derive_grid(10.0).expect("grid");
        let image = checkerboard(100, 60);
        let tile_size = calculate_tile_size(100, 60, &grid);

        let pieces = split_image(
            image,
            "pz",
            &grid,
            tile_size,
            &SplitConfig::default(),
            |_, _| {},
        )
        .expect("split succeeds");

        assert_eq!(pieces.len(), 10);
        assert_eq!(pieces[0].record.id, "pz-0-0");
        assert_eq!(pieces[1].record.id, "pz-0-1");
        assert_eq!(pieces[grid.cols as usize].record.id, "pz-1-0");
        for piece in &pieces {
            assert_eq!(piece.record.width, tile_size.width);
            assert_eq!(piece.record.height, tile_size.height);
            assert!(!piece.blob.is_empty());
            assert!(!piece.thumbnail.is_empty());
        }
    }

    #[test]
    fn split_reports_monotonic_progress() {
        let grid = derive_grid(12.0).expect("grid");
        let image = checkerboard(120, 90);
        let tile_size = calculate_tile_size(120, 90, &grid);
        let seen = Mutex::new(Vec::new());

        split_image(
            image,
            "pz",
            &grid,
            tile_size,
            &SplitConfig::default(),
            |processed, total| seen.lock().unwrap().push((processed, total)),
        )
        .expect("split succeeds");

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 12);
        for (i, (processed, total)) in seen.iter().enumerate() {
            assert_eq!(*processed, i + 1);
            assert_eq!(*total, 12);
        }
    }

    #[test]
    fn thumbnails_are_capped_but_never_upscaled() {
        let grid = derive_grid(4.0).expect("grid");
        let image = checkerboard(800, 800);
        let tile_size = calculate_tile_size(800, 800, &grid);

        let pieces = split_image(
            image,
            "pz",
            &grid,
            tile_size,
            &SplitConfig {
                thumbnail_max_dim: 100,
            },
            |_, _| {},
        )
        .expect("split succeeds");

        let thumb = decode_image(&pieces[0].thumbnail).expect("thumbnail decodes");
        assert_eq!(thumb.width(), 100);
        assert_eq!(thumb.height(), 100);

        // A tile smaller than the cap keeps its own dimensions.
        let small = checkerboard(40, 20);
        let kept = make_thumbnail(&small, 160);
        assert_eq!((kept.width(), kept.height()), (40, 20));
    }

    #[test]
    fn thumbnail_preserves_aspect_ratio() {
        let tile = checkerboard(200, 100);
        let thumb = make_thumbnail(&tile, 50);
        assert_eq!((thumb.width(), thumb.height()), (50, 25));
    }

    #[test]
    fn decode_rejects_garbage_bytes() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(matches!(err, SplitError::ImageDecode(_)));
    }

    #[test]
    fn lossy_remainder_is_dropped() {
        let grid = derive_grid(10.0).expect("grid");
        let image = checkerboard(103, 61);
        let tile_size = calculate_tile_size(103, 61, &grid);

        let pieces = split_image(
            image,
            "pz",
            &grid,
            tile_size,
            &SplitConfig::default(),
            |_, _| {},
        )
        .expect("split succeeds");

        assert_eq!(pieces.len(), 10);
        let tile = decode_image(&pieces.last().unwrap().blob).expect("tile decodes");
        assert_eq!((tile.width(), tile.height()), (20, 30));
    }
}
