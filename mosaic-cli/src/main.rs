//! Photomosaic CLI
//!
//! Indexes a folder of tile images by average color (cached as JSON) and
//! rebuilds a target image out of those tiles.
//!
//! ## YAML job file
//!
//! ```yaml
//! dataset: ./tiles
//! target: ./portrait.jpg
//! output: mosaic.png
//! cache: tiles.json
//! tile_size: 20
//! pattern: hexagon        # square | circle | hexagon
//! width: 1000
//! height: 1000
//! seed: 7
//! extensions: [jpg, png]
//! on_tile_error: skip-and-log
//! ```
//!
//! Run with: `mosaic --job job.yaml`
//!
//! ## Inline arguments
//!
//!   mosaic -d ./tiles -i portrait.jpg -o mosaic.png -s 20 -p hexagon
//!
//! Flags override job-file values, which override the built-in defaults.
//!
//! ## Graceful interruption
//!
//! Press Ctrl+C to stop after the current cell. Nothing is written for an
//! interrupted run and the process exits with an error.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use mosaic_core::{
    CellFailurePolicy, ColorIndex, IndexOptions, MosaicConfig, MosaicEngine, MosaicError, Pattern,
};

const DEFAULT_OUTPUT: &str = "mosaic_output.png";
const DEFAULT_CACHE: &str = "cache.json";

/// YAML job file format
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct JobSpec {
    #[serde(default)]
    dataset: Option<PathBuf>,
    #[serde(default)]
    target: Option<PathBuf>,
    #[serde(default)]
    output: Option<PathBuf>,
    #[serde(default)]
    cache: Option<PathBuf>,
    #[serde(default)]
    tile_size: Option<u32>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    extensions: Option<Vec<String>>,
    #[serde(default)]
    on_tile_error: Option<CellFailurePolicy>,
}

fn load_job(path: &PathBuf) -> anyhow::Result<JobSpec> {
    log::info!("Loading job file {:?}", path);
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read job file: {:?}", path))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("failed to parse job file: {:?}", path))
}

#[derive(Parser, Debug)]
#[command(name = "mosaic")]
#[command(about = "Build photomosaics from a folder of tile images", long_about = None)]
#[command(arg_required_else_help = true)]
struct Args {
    /// Folder of tile images (not searched recursively)
    #[arg(short, long)]
    dataset: Option<PathBuf>,

    /// Target image to reconstruct
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output image path [default: mosaic_output.png]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Color index cache file [default: cache.json]
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Rebuild the color index even if the cache exists
    #[arg(long)]
    rebuild_index: bool,

    /// Tile file extension to index (repeatable) [default: jpg]
    #[arg(long = "ext")]
    extensions: Vec<String>,

    /// Tile size in pixels [default: 100]
    #[arg(short = 's', long)]
    tile_size: Option<u32>,

    /// Tile pattern: square | circle | hexagon [default: circle]
    #[arg(short, long)]
    pattern: Option<String>,

    /// Working/output width [default: 1000]
    #[arg(long)]
    width: Option<u32>,

    /// Working/output height [default: 1000]
    #[arg(long)]
    height: Option<u32>,

    /// Random seed for tile choice among equal colors
    #[arg(long)]
    seed: Option<u64>,

    /// Leave cells with unreadable tiles transparent instead of aborting
    #[arg(long)]
    skip_bad_tiles: bool,

    /// YAML job file
    #[arg(long)]
    job: Option<PathBuf>,

    /// Only build/load the color index and print a summary
    #[arg(long)]
    index_only: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

/// Fully resolved run parameters
#[derive(Debug)]
struct Job {
    dataset: PathBuf,
    target: Option<PathBuf>,
    output: PathBuf,
    cache: PathBuf,
    index_options: IndexOptions,
    config: MosaicConfig,
}

/// Merge CLI flags over job-file values over defaults
fn resolve_job(args: &Args, spec: JobSpec) -> anyhow::Result<Job> {
    let dataset = args
        .dataset
        .clone()
        .or(spec.dataset)
        .ok_or_else(|| anyhow::anyhow!("Dataset folder required (use -d/--dataset)"))?;

    let defaults = MosaicConfig::default();
    let pattern = match args.pattern.as_ref().or(spec.pattern.as_ref()) {
        Some(name) => name.parse::<Pattern>()?,
        None => defaults.pattern,
    };
    let failure_policy = if args.skip_bad_tiles {
        CellFailurePolicy::SkipAndLog
    } else {
        spec.on_tile_error.unwrap_or(defaults.failure_policy)
    };
    let config = MosaicConfig {
        tile_size: args.tile_size.or(spec.tile_size).unwrap_or(defaults.tile_size),
        pattern,
        canvas_width: args.width.or(spec.width).unwrap_or(defaults.canvas_width),
        canvas_height: args.height.or(spec.height).unwrap_or(defaults.canvas_height),
        seed: args.seed.or(spec.seed),
        failure_policy,
    };
    config.validate()?;

    let index_options = if !args.extensions.is_empty() {
        IndexOptions { extensions: args.extensions.clone() }
    } else if let Some(extensions) = spec.extensions {
        IndexOptions { extensions }
    } else {
        IndexOptions::default()
    };

    Ok(Job {
        dataset,
        target: args.input.clone().or(spec.target),
        output: args
            .output
            .clone()
            .or(spec.output)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
        cache: args
            .cache
            .clone()
            .or(spec.cache)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE)),
        index_options,
        config,
    })
}

/// A cancelled run is a failure too: nothing was saved
fn run_error(err: MosaicError, target: &Path) -> anyhow::Error {
    match err {
        MosaicError::Cancelled => anyhow::anyhow!("interrupted, no output written"),
        e => anyhow::Error::new(e).context(format!("failed to build mosaic for {:?}", target)),
    }
}

fn init_logging(verbose: u8, quiet: bool) -> anyhow::Result<()> {
    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)
        .context("failed to initialise logger")
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet)?;

    // Set up SIGINT handler
    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || {
            interrupted.store(true, Ordering::SeqCst);
        })
        .context("failed to set Ctrl-C handler")?;
    }

    let spec = args.job.as_ref().map(load_job).transpose()?.unwrap_or_default();
    let job = resolve_job(&args, spec)?;
    log::debug!("Resolved job: {:?}", job);

    // Load or build the color index
    let index_start = Instant::now();
    let index = ColorIndex::load_or_build(
        &job.cache,
        &job.dataset,
        &job.index_options,
        args.rebuild_index,
    )
    .with_context(|| format!("failed to prepare color index for {:?}", job.dataset))?;
    println!(
        "Color index: {} tiles, {} colors ({:?}, {:.1}s)",
        index.tile_count(),
        index.len(),
        job.cache,
        index_start.elapsed().as_secs_f64(),
    );

    if args.index_only {
        return Ok(());
    }
    if index.is_empty() {
        anyhow::bail!(
            "no tiles with extension {:?} found in {:?}",
            job.index_options.extensions,
            job.dataset
        );
    }

    let target = job
        .target
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("Target image required (use -i/--input)"))?;

    let config = job.config.clone();
    println!(
        "Rendering {:?} as {}x{} {} mosaic with {}px tiles",
        target, config.canvas_width, config.canvas_height, config.pattern, config.tile_size,
    );

    // Set up progress bar
    let progress = ProgressBar::new(100);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% ({eta})")?
            .progress_chars("#>-"),
    );

    let mut engine = MosaicEngine::new(&index, config)?.with_cancel_flag(interrupted.clone());
    let render_start = Instant::now();
    let mut on_progress = |percent: f64| progress.set_position(percent.floor() as u64);
    let result = engine.generate(target, &job.output, Some(&mut on_progress));

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if matches!(e, MosaicError::Cancelled) {
                progress.abandon_with_message("Interrupted");
            } else {
                progress.abandon();
            }
            return Err(run_error(e, target));
        }
    };
    progress.finish_with_message("Mosaic complete");

    println!(
        "Output saved to: {:?} ({} of {} cells painted, seed {}, {:.1}s)",
        job.output,
        report.painted_cells,
        report.total_cells,
        report.seed,
        render_start.elapsed().as_secs_f64(),
    );
    if !report.skipped_cells.is_empty() {
        eprintln!("Skipped {} cells:", report.skipped_cells.len());
        for (cell, reason) in &report.skipped_cells {
            eprintln!("  row {} col {}: {}", cell.row, cell.col, reason);
        }
    }
    Ok(())
}
