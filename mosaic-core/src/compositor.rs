//! Resizing, masking and pasting tiles onto the mosaic canvas.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbaImage};

use crate::{MosaicError, Result};

/// Decode a tile referenced by the index
pub fn load_tile(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|source| MosaicError::TileLoad {
        path: path.to_path_buf(),
        source,
    })
}

/// Resize `tile` to the mask's size (aspect ratio not preserved), convert to
/// RGBA and scale its alpha channel by the mask intensity.
pub fn mask_tile(tile: &DynamicImage, mask: &GrayImage) -> RgbaImage {
    let (width, height) = mask.dimensions();
    let mut rgba = tile
        .resize_exact(width, height, FilterType::CatmullRom)
        .to_rgba8();

    for (pixel, m) in rgba.pixels_mut().zip(mask.pixels()) {
        pixel[3] = (pixel[3] as u16 * m[0] as u16 / 255) as u8;
    }
    rgba
}

/// Paste `tile` at `(x, y)`, using its own alpha as the paste mask.
///
/// Every channel, alpha included, becomes `src·a + dst·(1 - a)`. Pixels
/// falling outside the canvas are clipped.
pub fn paste_masked(canvas: &mut RgbaImage, tile: &RgbaImage, x: i64, y: i64) {
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);

    for (tx, ty, src) in tile.enumerate_pixels() {
        let px = x + tx as i64;
        let py = y + ty as i64;
        if px < 0 || py < 0 || px >= cw || py >= ch {
            continue;
        }
        let a = src[3] as u32;
        if a == 0 {
            continue;
        }
        let dst = canvas.get_pixel_mut(px as u32, py as u32);
        for c in 0..4 {
            dst[c] = ((src[c] as u32 * a + dst[c] as u32 * (255 - a) + 127) / 255) as u8;
        }
    }
}

/// Load, mask and paste one tile onto the canvas
pub fn composite_tile(
    canvas: &mut RgbaImage,
    tile_path: &Path,
    mask: &GrayImage,
    x: i64,
    y: i64,
) -> Result<()> {
    let tile = load_tile(tile_path)?;
    let masked = mask_tile(&tile, mask);
    paste_masked(canvas, &masked, x, y);
    Ok(())
}
