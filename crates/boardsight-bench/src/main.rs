//! boardsight-bench: CLI tool for detection parameter experimentation and
//! diagnostics.
//!
//! Runs board detection on a given image file with configurable
//! parameters, printing per-stage diagnostics. Useful for:
//!
//! - Tuning the line threshold, smoothing window and spacing tolerance
//! - Measuring per-stage durations to identify bottlenecks
//! - Dumping the 64 normalized squares to inspect what a classifier sees
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin boardsight-bench -- [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Set `RUST_LOG=debug` to see the pipeline's own log output.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use boardsight_pipeline::diagnostics::{Clock, DetectionDiagnostics};
use boardsight_pipeline::pipeline::STAGE_NAMES;
use boardsight_pipeline::{
    Detection, NormalizedTileGrid, Orientation, ResampleFilter, VisionConfig, square_name,
};
use clap::{Parser, ValueEnum};
use log::{debug, warn};

/// Chessboard detection diagnostics for boardsight.
///
/// Looks for a chessboard in the given image, prints per-stage timing and
/// metrics, and optionally writes the 64 normalized squares as PNG files.
#[derive(Parser)]
#[command(name = "boardsight-bench", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Fraction of a profile's maximum a line must exceed.
    #[arg(long, default_value_t = VisionConfig::DEFAULT_THRESHOLD_FRACTION)]
    threshold_fraction: f64,

    /// Length of the Gaussian smoothing window (odd).
    #[arg(long, default_value_t = VisionConfig::DEFAULT_SMOOTHING_LENGTH)]
    smoothing_length: usize,

    /// Standard deviation of the Gaussian smoothing window.
    #[arg(long, default_value_t = VisionConfig::DEFAULT_SMOOTHING_SIGMA)]
    smoothing_sigma: f64,

    /// Maximum spacing difference (exclusive) between consecutive lines.
    #[arg(long, default_value_t = VisionConfig::DEFAULT_SPACING_TOLERANCE)]
    spacing_tolerance: u32,

    /// Gradients are clamped to `[-clip, clip]` before projection.
    #[arg(long, default_value_t = VisionConfig::DEFAULT_GRADIENT_CLIP)]
    gradient_clip: f32,

    /// Edge length of the normalized squares.
    #[arg(long, default_value_t = VisionConfig::DEFAULT_TILE_SIZE, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    tile_size: u32,

    /// Tile resampling filter (nearest, triangle, catmull-rom, gaussian, lanczos3).
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    filter: Filter,

    /// Write the 64 normalized squares as `<square>.png` into this directory.
    #[arg(long)]
    tiles_dir: Option<PathBuf>,

    /// The image shows the board from black's side.
    #[arg(long)]
    black: bool,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full detection config as a JSON string.
    ///
    /// When provided, all other detection parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Tile resampling filter selection.
#[derive(Clone, Copy, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic Catmull-Rom.
    CatmullRom,
    /// Gaussian (smooth).
    Gaussian,
    /// Lanczos with 3 lobes (anti-aliased).
    Lanczos3,
}

/// Maps a [`ResampleFilter`] to the local CLI [`Filter`] enum.
const fn filter_from_pipeline(f: ResampleFilter) -> Filter {
    match f {
        ResampleFilter::Nearest => Filter::Nearest,
        ResampleFilter::Triangle => Filter::Triangle,
        ResampleFilter::CatmullRom => Filter::CatmullRom,
        ResampleFilter::Gaussian => Filter::Gaussian,
        ResampleFilter::Lanczos3 => Filter::Lanczos3,
    }
}

/// The CLI default filter, derived from [`VisionConfig::DEFAULT_RESAMPLE_FILTER`]
/// so the two cannot silently diverge.
const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(VisionConfig::DEFAULT_RESAMPLE_FILTER);

/// Build a [`VisionConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<VisionConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(VisionConfig {
        threshold_fraction: cli.threshold_fraction,
        smoothing_length: cli.smoothing_length,
        smoothing_sigma: cli.smoothing_sigma,
        spacing_tolerance: cli.spacing_tolerance,
        gradient_clip: cli.gradient_clip,
        tile_size: cli.tile_size,
        resample_filter: match cli.filter {
            Filter::Nearest => ResampleFilter::Nearest,
            Filter::Triangle => ResampleFilter::Triangle,
            Filter::CatmullRom => ResampleFilter::CatmullRom,
            Filter::Gaussian => ResampleFilter::Gaussian,
            Filter::Lanczos3 => ResampleFilter::Lanczos3,
        },
    })
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image_bytes = match std::fs::read(&cli.image_path) {
        Ok(bytes) => bytes,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Image: {} ({} bytes)",
        cli.image_path.display(),
        image_bytes.len(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match boardsight_pipeline::diagnostics::detect_with_diagnostics(
            &image_bytes,
            &config,
            &StdClock,
        ) {
            Ok((detection, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Report and write tiles on the first run only.
                if run == 0 {
                    print_outcome(&detection);
                    if let Some(ref dir) = cli.tiles_dir {
                        if detection.matched() {
                            let orientation = if cli.black {
                                Orientation::Black
                            } else {
                                Orientation::White
                            };
                            if let Err(e) = write_tiles(&detection.tiles, orientation, dir) {
                                eprintln!("Error writing tiles to {}: {e}", dir.display());
                                return ExitCode::FAILURE;
                            }
                        } else {
                            warn!("no board found, not writing tiles");
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Detection error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    // Print summary when multiple runs.
    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Print where the board was found, or that it was not.
fn print_outcome(detection: &Detection) {
    match detection.geometry {
        Some(ref geometry) => {
            eprintln!("Lines x: {:?}", geometry.lines_x.lines());
            eprintln!("Lines y: {:?}", geometry.lines_y.lines());
            if geometry.is_cropped() {
                eprintln!(
                    "Board extends past the image: x {:?} y {:?}",
                    geometry.padding_x, geometry.padding_y,
                );
            }
        }
        None => eprintln!("no board found"),
    }
}

/// Write each normalized square as `<name>.png` (`a1.png` .. `h8.png`).
fn write_tiles(
    tiles: &NormalizedTileGrid,
    orientation: Orientation,
    dir: &Path,
) -> Result<(), image::ImageError> {
    std::fs::create_dir_all(dir)?;
    for (index, tile) in tiles.oriented(orientation).into_iter().enumerate() {
        let Some(name) = square_name(index) else {
            continue;
        };
        let path = dir.join(format!("{name}.png"));
        tile.save(&path)?;
        debug!("wrote {}", path.display());
    }
    eprintln!(
        "Wrote {} tiles ({orientation} perspective) to {}",
        tiles.len(),
        dir.display(),
    );
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[DetectionDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    // Per-stage means.
    println!();
    println!("{:<16} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(32));

    for name in STAGE_NAMES {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .flat_map(DetectionDiagnostics::stages)
            .filter(|(stage, _)| *stage == name)
            .map(|(_, diag)| diag.duration.as_secs_f64() * 1000.0)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<16} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("boardsight-bench").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn defaults_match_library_config() {
        let config = config_from_cli(&parse(&["board.png"])).unwrap();
        assert_eq!(config, VisionConfig::default());
    }

    #[test]
    fn gradient_clip_flag_reaches_config() {
        let config = config_from_cli(&parse(&["board.png", "--gradient-clip", "128"])).unwrap();
        assert!((config.gradient_clip - 128.0).abs() < f32::EPSILON);
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = parse(&[
            "board.png",
            "--gradient-clip",
            "10",
            "--config-json",
            r#"{"tile_size": 16}"#,
        ]);
        let config = config_from_cli(&cli).unwrap();
        assert_eq!(config.tile_size, 16);
        assert!((config.gradient_clip - VisionConfig::DEFAULT_GRADIENT_CLIP).abs() < f32::EPSILON);
    }
}
