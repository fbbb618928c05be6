//! Shared helpers for the integration tests.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

/// Encode an RGBA image as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .expect("png encode");
    buf.into_inner()
}

/// Synthesize a puzzle photo whose every region has a distinct pattern, so
/// tile crops produce distinct blobs (and therefore distinct stub vectors).
pub fn puzzle_png(width: u32, height: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 7 % 251) as u8,
            (y * 13 % 251) as u8,
            ((x * y + 3) % 251) as u8,
            255,
        ])
    }));
    encode_png(&image)
}

/// A small image unrelated to anything `puzzle_png` produces.
pub fn unrelated_png(seed: u32) -> Vec<u8> {
    let image = DynamicImage::ImageRgba8(RgbaImage::from_fn(64, 64, |x, y| {
        Rgba([
            ((x + seed * 31) * 11 % 239) as u8,
            ((y + seed * 17) * 3 % 239) as u8,
            ((x ^ y) + seed) as u8,
            255,
        ])
    }));
    encode_png(&image)
}
