//! Core photomosaic library.
//!
//! Indexes a folder of tile images by their average color, walks a target
//! image in a square, circular or hexagonal grid, matches every cell to the
//! nearest indexed color and composites masked tiles onto an RGBA canvas.

mod color;
mod compositor;
mod engine;
mod index;
mod mask;
mod matcher;

pub use color::{average_color, average_region_color, Color};
pub use compositor::{composite_tile, load_tile, mask_tile, paste_masked};
pub use engine::{
    grid_cells, CellFailurePolicy, GridCell, MosaicConfig, MosaicEngine, MosaicReport, Stage,
};
pub use index::{ColorIndex, IndexOptions};
pub use mask::{build_mask, Pattern};
pub use matcher::{choose_tile, nearest_color};

use std::path::PathBuf;

/// Error type for mosaic operations
#[derive(Debug, thiserror::Error)]
pub enum MosaicError {
    #[error("Failed to read dataset folder {path:?}: {source}")]
    DatasetRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to summarize dataset image {path:?}: {source}")]
    DatasetImage {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to load target image {path:?}: {source}")]
    TargetLoad {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to load tile {path:?}: {source}")]
    TileLoad {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to save mosaic to {path:?}: {source}")]
    Save {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Index file I/O error at {path:?}: {source}")]
    IndexIo {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed index: {0}")]
    IndexFormat(#[from] serde_json::Error),

    #[error("Failed to encode index: {0}")]
    IndexEncode(#[source] serde_json::Error),

    #[error("Malformed color key {0:?} (expected \"(r, g, b)\")")]
    MalformedKey(String),

    #[error("Index entry {0} has no tiles")]
    EmptyBucket(Color),

    #[error("Color index is empty")]
    EmptyIndex,

    #[error("Invalid tile size: {0} (must be positive)")]
    InvalidTileSize(u32),

    #[error("Invalid canvas size: {0}x{1}")]
    InvalidCanvasSize(u32, u32),

    #[error("Unknown pattern: {0} (expected square, circle or hexagon)")]
    UnknownPattern(String),

    #[error("Cell (row {row}, col {col}) failed: {source}")]
    Cell {
        row: u32,
        col: u32,
        #[source]
        source: Box<MosaicError>,
    },

    #[error("Generation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, MosaicError>;
