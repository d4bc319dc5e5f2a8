//! Average-color summaries and the `Color` key type.

use std::fmt;
use std::str::FromStr;

use image::RgbImage;

use crate::MosaicError;

/// Average RGB color of an image or region
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Squared Euclidean distance, treating colors as points in RGB space
    pub fn dist_sq(&self, other: &Color) -> u32 {
        let dr = self.r as i32 - other.r as i32;
        let dg = self.g as i32 - other.g as i32;
        let db = self.b as i32 - other.b as i32;
        (dr * dr + dg * dg + db * db) as u32
    }
}

impl From<[u8; 3]> for Color {
    fn from(rgb: [u8; 3]) -> Self {
        Self::new(rgb[0], rgb[1], rgb[2])
    }
}

impl From<Color> for [u8; 3] {
    fn from(c: Color) -> Self {
        [c.r, c.g, c.b]
    }
}

/// Canonical key form used by the persisted index: `(r, g, b)`
impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = MosaicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || MosaicError::MalformedKey(s.to_string());

        let inner = s
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(malformed)?;

        let mut channels = [0u8; 3];
        let mut parts = inner.split(',');
        for channel in &mut channels {
            let part = parts.next().ok_or_else(malformed)?;
            *channel = part.trim().parse().map_err(|_| malformed())?;
        }
        if parts.next().is_some() {
            return Err(malformed());
        }

        Ok(Color::from(channels))
    }
}

/// Per-channel mean over every pixel, truncated toward zero.
///
/// Must not be called on a zero-area image.
pub fn average_color(image: &RgbImage) -> Color {
    let (width, height) = image.dimensions();
    average_region_color(image, 0, 0, width, height)
}

/// Average color of the `width x height` region at `(x, y)`.
///
/// The region always counts as its full size: pixels past the image edge are
/// read as black, so border cells come out darker than their visible part.
/// The region must have non-zero area.
pub fn average_region_color(image: &RgbImage, x: u32, y: u32, width: u32, height: u32) -> Color {
    let x_end = x.saturating_add(width).min(image.width());
    let y_end = y.saturating_add(height).min(image.height());

    let mut sums = [0u64; 3];
    for py in y..y_end {
        for px in x..x_end {
            let pixel = image.get_pixel(px, py);
            sums[0] += pixel[0] as u64;
            sums[1] += pixel[1] as u64;
            sums[2] += pixel[2] as u64;
        }
    }
    debug_assert!(width > 0 && height > 0, "average of an empty region");
    let count = (width as u64 * height as u64).max(1);

    Color::new(
        (sums[0] / count) as u8,
        (sums[1] / count) as u8,
        (sums[2] / count) as u8,
    )
}
