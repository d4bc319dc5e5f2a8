//! Tile patterns and their alpha masks.

use std::fmt;
use std::str::FromStr;

use image::{GrayImage, Luma};
use serde::{Deserialize, Serialize};

use crate::MosaicError;

const OPAQUE: Luma<u8> = Luma([255]);
const CLEAR: Luma<u8> = Luma([0]);

/// Tile shape, which also decides whether odd rows are shifted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pattern {
    /// Plain grid of full squares
    Square,
    /// Inscribed circles on a row-offset grid
    #[default]
    Circle,
    /// Inscribed hexagons on a row-offset grid
    Hexagon,
}

impl Pattern {
    /// Whether odd rows are shifted right by half a tile
    pub fn requires_offset(&self) -> bool {
        matches!(self, Pattern::Circle | Pattern::Hexagon)
    }
}

impl FromStr for Pattern {
    type Err = MosaicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "square" | "rectangular" | "rect" => Ok(Pattern::Square),
            "circle" | "circular" => Ok(Pattern::Circle),
            "hexagon" | "hexagonal" | "hex" => Ok(Pattern::Hexagon),
            _ => Err(MosaicError::UnknownPattern(s.to_string())),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Pattern::Square => "square",
            Pattern::Circle => "circle",
            Pattern::Hexagon => "hexagon",
        };
        f.write_str(name)
    }
}

/// Build the `size x size` grayscale mask for `pattern` (255 = opaque)
pub fn build_mask(size: u32, pattern: Pattern) -> GrayImage {
    match pattern {
        Pattern::Square => GrayImage::from_pixel(size, size, OPAQUE),
        Pattern::Circle => circle_mask(size),
        Pattern::Hexagon => hexagon_mask(size),
    }
}

/// Filled ellipse inscribed in the box `(0, 0)..=(size, size)`, sampled at
/// integer pixel coordinates.
fn circle_mask(size: u32) -> GrayImage {
    let c = size as f64 / 2.0;
    let r_sq = c * c;
    GrayImage::from_fn(size, size, |x, y| {
        let dx = x as f64 - c;
        let dy = y as f64 - c;
        if dx * dx + dy * dy <= r_sq {
            OPAQUE
        } else {
            CLEAR
        }
    })
}

/// Regular hexagon with vertices at 30° + 60°·i on the inscribed circle,
/// sampled at pixel centers so the mask is symmetric under 180° rotation.
fn hexagon_mask(size: u32) -> GrayImage {
    let vertices = hexagon_vertices(size);
    GrayImage::from_fn(size, size, |x, y| {
        if polygon_contains(&vertices, x as f64 + 0.5, y as f64 + 0.5) {
            OPAQUE
        } else {
            CLEAR
        }
    })
}

fn hexagon_vertices(size: u32) -> [(f64, f64); 6] {
    let radius = size as f64 / 2.0;
    let (cx, cy) = (radius, radius);
    let mut vertices = [(0.0, 0.0); 6];
    for (i, vertex) in vertices.iter_mut().enumerate() {
        let angle = (30.0 + 60.0 * i as f64).to_radians();
        *vertex = (cx + radius * angle.cos(), cy + radius * angle.sin());
    }
    vertices
}

/// Even-odd ray casting test
fn polygon_contains(vertices: &[(f64, f64)], px: f64, py: f64) -> bool {
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (xi, yi) = vertices[i];
        let (xj, yj) = vertices[j];
        if (yi > py) != (yj > py) {
            let x_cross = xi + (py - yi) * (xj - xi) / (yj - yi);
            if px < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_is_opaque() {
        let mask = build_mask(17, Pattern::Square);
        assert_eq!(mask.dimensions(), (17, 17));
        assert!(mask.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn test_circle_center_and_corners() {
        for size in [2, 3, 10, 25, 100] {
            let mask = build_mask(size, Pattern::Circle);
            assert_eq!(mask.dimensions(), (size, size));
            assert_eq!(mask.get_pixel(size / 2, size / 2)[0], 255, "center, size {}", size);
            assert_eq!(mask.get_pixel(0, 0)[0], 0, "corner, size {}", size);
            if size >= 10 {
                assert_eq!(mask.get_pixel(size - 1, size - 1)[0], 0, "far corner, size {}", size);
            }
        }
    }

    #[test]
    fn test_circle_coverage_close_to_area() {
        let size = 200;
        let mask = build_mask(size, Pattern::Circle);
        let opaque = mask.pixels().filter(|p| p[0] == 255).count() as f64;
        let expected = std::f64::consts::PI * (size as f64 / 2.0).powi(2);
        assert!((opaque - expected).abs() / expected < 0.02);
    }

    #[test]
    fn test_hexagon_rotational_symmetry() {
        for size in [7, 20, 64, 101] {
            let mask = build_mask(size, Pattern::Hexagon);
            for y in 0..size {
                for x in 0..size {
                    assert_eq!(
                        mask.get_pixel(x, y),
                        mask.get_pixel(size - 1 - x, size - 1 - y),
                        "size {} pixel ({}, {})",
                        size, x, y,
                    );
                }
            }
        }
    }

    #[test]
    fn test_hexagon_shape() {
        let size = 100;
        let mask = build_mask(size, Pattern::Hexagon);
        // Pointy top: full height along the vertical center line
        assert_eq!(mask.get_pixel(50, 1)[0], 255);
        assert_eq!(mask.get_pixel(50, 98)[0], 255);
        // Flat sides at x = 50 ± 50·cos(30°) ≈ 6.7 / 93.3
        assert_eq!(mask.get_pixel(3, 50)[0], 0);
        assert_eq!(mask.get_pixel(10, 50)[0], 255);
        assert_eq!(mask.get_pixel(96, 50)[0], 0);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        let opaque = mask.pixels().filter(|p| p[0] == 255).count() as f64;
        let expected = 3.0 * 3f64.sqrt() / 2.0 * 50.0 * 50.0;
        assert!((opaque - expected).abs() / expected < 0.02);
    }

    #[test]
    fn test_pattern_names() {
        assert_eq!("Circular".parse::<Pattern>().unwrap(), Pattern::Circle);
        assert_eq!("rectangular".parse::<Pattern>().unwrap(), Pattern::Square);
        assert_eq!("HEXAGON".parse::<Pattern>().unwrap(), Pattern::Hexagon);
        assert!(matches!("star".parse::<Pattern>(), Err(MosaicError::UnknownPattern(_))));
        assert_eq!(Pattern::Hexagon.to_string(), "hexagon");
        assert!(!Pattern::Square.requires_offset());
        assert!(Pattern::Circle.requires_offset());
        assert!(Pattern::Hexagon.requires_offset());
    }
}
