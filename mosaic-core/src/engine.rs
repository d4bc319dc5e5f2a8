//! Grid walk and orchestration of a single mosaic run.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::{
    average_region_color, build_mask, choose_tile, composite_tile, ColorIndex, MosaicError,
    Pattern, Result,
};

/// Lifecycle of a generation run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    BuildingMask,
    Tiling,
    Saving,
    Done,
}

/// What to do when a single cell cannot be composited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellFailurePolicy {
    /// Abort the whole run on the first failing cell
    #[default]
    Abort,
    /// Leave the cell transparent, log a warning and carry on
    SkipAndLog,
}

/// Parameters of a mosaic run
#[derive(Debug, Clone)]
pub struct MosaicConfig {
    /// Tile edge length in pixels
    pub tile_size: u32,
    pub pattern: Pattern,
    /// Working resolution the target is resized to (also the output size)
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Seed for tile choice among same-colored candidates (random if unset)
    pub seed: Option<u64>,
    pub failure_policy: CellFailurePolicy,
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            tile_size: 100,
            pattern: Pattern::Circle,
            canvas_width: 1000,
            canvas_height: 1000,
            seed: None,
            failure_policy: CellFailurePolicy::Abort,
        }
    }
}

impl MosaicConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(MosaicError::InvalidTileSize(self.tile_size));
        }
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(MosaicError::InvalidCanvasSize(self.canvas_width, self.canvas_height));
        }
        Ok(())
    }
}

/// One grid position and its destination offset on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub row: u32,
    pub col: u32,
    pub x: u32,
    pub y: u32,
}

impl GridCell {
    /// Whether the cell's top-left corner lies on the canvas. Cells that
    /// start inside but run past the edge are still visible.
    pub fn is_visible(&self, width: u32, height: u32) -> bool {
        self.x < width && self.y < height
    }
}

/// All grid cells in row-major order.
///
/// One extra row and column are generated so shifted odd rows still reach
/// the right edge; cells that start off-canvas are included and must be
/// filtered with [`GridCell::is_visible`].
pub fn grid_cells(
    width: u32,
    height: u32,
    tile_size: u32,
    pattern: Pattern,
) -> impl Iterator<Item = GridCell> {
    let num_cols = width / tile_size + 1;
    let num_rows = height / tile_size + 1;
    let shift = if pattern.requires_offset() { tile_size / 2 } else { 0 };

    (0..num_rows).flat_map(move |row| {
        let row_shift = if row % 2 == 1 { shift } else { 0 };
        (0..num_cols).map(move |col| GridCell {
            row,
            col,
            x: col * tile_size + row_shift,
            y: row * tile_size,
        })
    })
}

/// Summary of a finished run
#[derive(Debug, Clone, Default)]
pub struct MosaicReport {
    /// Cells walked, including the ones starting off-canvas
    pub total_cells: usize,
    /// Cells that received a tile
    pub painted_cells: usize,
    /// Cells left transparent under [`CellFailurePolicy::SkipAndLog`]
    pub skipped_cells: Vec<(GridCell, String)>,
    /// Seed used for tile choice
    pub seed: u64,
}

/// Drives one mosaic run over a shared, read-only color index
pub struct MosaicEngine<'a> {
    index: &'a ColorIndex,
    config: MosaicConfig,
    cancel: Option<Arc<AtomicBool>>,
    stage: Stage,
}

impl<'a> MosaicEngine<'a> {
    pub fn new(index: &'a ColorIndex, config: MosaicConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            index,
            config,
            cancel: None,
            stage: Stage::Idle,
        })
    }

    /// Abort with [`MosaicError::Cancelled`] once `flag` is set (polled per cell)
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    fn enter(&mut self, stage: Stage) {
        log::debug!("{:?} -> {:?}", self.stage, stage);
        self.stage = stage;
    }

    /// Load `target`, render the mosaic and write it to `output`
    pub fn generate(
        &mut self,
        target: &Path,
        output: &Path,
        progress: Option<&mut dyn FnMut(f64)>,
    ) -> Result<MosaicReport> {
        self.enter(Stage::Idle);
        let image = image::open(target).map_err(|source| MosaicError::TargetLoad {
            path: target.to_path_buf(),
            source,
        })?;

        let seed = self.config.seed.unwrap_or_else(rand::random);
        log::info!("Using seed: {}", seed);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let mut no_progress = |_: f64| {};
        let progress: &mut dyn FnMut(f64) = match progress {
            Some(callback) => callback,
            None => &mut no_progress,
        };
        let (canvas, mut report) = self.render(&image, &mut rng, progress)?;
        report.seed = seed;

        self.enter(Stage::Saving);
        canvas.save(output).map_err(|source| MosaicError::Save {
            path: output.to_path_buf(),
            source,
        })?;
        log::info!("Mosaic saved to {:?}", output);

        self.enter(Stage::Done);
        Ok(report)
    }

    /// Render an already-decoded target to a fresh canvas.
    ///
    /// `progress` receives `cells_done / total_cells * 100` after every cell,
    /// visible or not, ending at exactly 100.
    pub fn render<R: Rng + ?Sized>(
        &mut self,
        target: &DynamicImage,
        rng: &mut R,
        progress: &mut dyn FnMut(f64),
    ) -> Result<(RgbaImage, MosaicReport)> {
        if self.index.is_empty() {
            return Err(MosaicError::EmptyIndex);
        }
        let MosaicConfig {
            tile_size,
            pattern,
            canvas_width: width,
            canvas_height: height,
            failure_policy,
            ..
        } = self.config;

        self.enter(Stage::BuildingMask);
        let mask = build_mask(tile_size, pattern);
        let target = image::imageops::resize(
            &target.to_rgb8(),
            width,
            height,
            FilterType::CatmullRom,
        );
        let mut canvas = RgbaImage::new(width, height);

        self.enter(Stage::Tiling);
        let cells: Vec<GridCell> = grid_cells(width, height, tile_size, pattern).collect();
        let total = cells.len();
        log::info!(
            "Tiling {}x{} canvas with {} {} cells of {}px",
            width, height, total, pattern, tile_size,
        );

        let mut report = MosaicReport {
            total_cells: total,
            ..Default::default()
        };

        for (done, cell) in cells.into_iter().enumerate() {
            if self.cancel.as_ref().is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                log::warn!("Cancelled after {} of {} cells", done, total);
                return Err(MosaicError::Cancelled);
            }

            if cell.is_visible(width, height) {
                let color = average_region_color(&target, cell.x, cell.y, tile_size, tile_size);
                let painted = choose_tile(self.index, color, rng).and_then(|tile| {
                    log::trace!("cell ({}, {}) {} -> {:?}", cell.row, cell.col, color, tile);
                    composite_tile(&mut canvas, tile, &mask, cell.x as i64, cell.y as i64)
                });

                match (painted, failure_policy) {
                    (Ok(()), _) => report.painted_cells += 1,
                    (Err(e), CellFailurePolicy::Abort) => {
                        return Err(MosaicError::Cell {
                            row: cell.row,
                            col: cell.col,
                            source: Box::new(e),
                        });
                    }
                    (Err(e), CellFailurePolicy::SkipAndLog) => {
                        log::warn!("Skipping cell ({}, {}): {}", cell.row, cell.col, e);
                        report.skipped_cells.push((cell, e.to_string()));
                    }
                }
            }

            progress((done + 1) as f64 / total as f64 * 100.0);
        }

        Ok((canvas, report))
    }
}
