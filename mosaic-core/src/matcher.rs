//! Nearest-color lookup and random tile choice.

use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::{Color, ColorIndex, MosaicError, Result};

/// Indexed color closest to `target` by Euclidean distance in RGB space.
///
/// Ties go to the smallest color in (r, g, b) order, since keys are scanned
/// in ascending order and only a strictly closer key replaces the best.
pub fn nearest_color(index: &ColorIndex, target: Color) -> Result<Color> {
    index
        .colors()
        .min_by_key(|color| color.dist_sq(&target))
        .copied()
        .ok_or(MosaicError::EmptyIndex)
}

/// Pick a tile for `target`: nearest color, then a uniformly random tile from
/// that color's bucket
pub fn choose_tile<'a, R: Rng + ?Sized>(
    index: &'a ColorIndex,
    target: Color,
    rng: &mut R,
) -> Result<&'a Path> {
    let color = nearest_color(index, target)?;
    index
        .get(&color)
        .and_then(|tiles| tiles.choose(rng))
        .map(|path| path.as_path())
        .ok_or(MosaicError::EmptyBucket(color))
}
