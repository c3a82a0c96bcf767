//! Detection diagnostics: timing and per-stage metrics.
//!
//! Used for threshold tuning and profiling. [`detect_with_diagnostics`]
//! drives the [incremental pipeline](crate::pipeline) and records how
//! long each stage took along with what it produced.
//!
//! The core has no time source of its own; callers supply a [`Clock`]
//! (the bench binary wraps `std::time::Instant`).
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::detector::Detection;
use crate::pipeline::{
    Decoded, GradientsComputed, LinesLocated, Normalized, Pipeline, PipelineStage, Profiled,
    TilesExtracted,
};
use crate::tiles::EdgePadding;
use crate::types::{VisionConfig, VisionError};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// A monotonic time source.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current instant.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single detection run.
///
/// Tile extraction and normalization are skipped when no board is found;
/// their fields are `None` then.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionDiagnostics {
    /// Stage 1: decoding and intensity conversion.
    pub decode: StageDiagnostics,
    /// Stage 2: gradient computation.
    pub gradients: StageDiagnostics,
    /// Stage 3: line-strength profiles.
    pub profiles: StageDiagnostics,
    /// Stage 4: grid-line location on both axes.
    pub lines: StageDiagnostics,
    /// Stage 5: square extraction (only on a match).
    pub tiles: Option<StageDiagnostics>,
    /// Stage 6: tile normalization (only on a match).
    pub normalize: Option<StageDiagnostics>,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary of the outcome.
    pub summary: DetectionSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Decoding metrics.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded image width in pixels.
        width: u32,
        /// Decoded image height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Gradient metrics.
    Gradients {
        /// Mean absolute gradient over both planes.
        mean_magnitude: f64,
    },
    /// Profile metrics.
    Profiles {
        /// Peak of the x profile.
        max_x: f64,
        /// Peak of the y profile.
        max_y: f64,
    },
    /// Line-location metrics.
    Lines {
        /// Binarization threshold on the x profile.
        threshold_x: f64,
        /// Binarization threshold on the y profile.
        threshold_y: f64,
        /// Skeleton spikes on the x axis before pruning.
        candidates_x: usize,
        /// Skeleton spikes on the y axis before pruning.
        candidates_y: usize,
        /// Whether both axes produced seven consistent lines.
        matched: bool,
    },
    /// Tile extraction metrics.
    Tiles {
        /// Square width in pixels.
        step_x: u32,
        /// Square height in pixels.
        step_y: u32,
        /// Horizontal edge replication.
        padding_x: EdgePadding,
        /// Vertical edge replication.
        padding_y: EdgePadding,
    },
    /// Normalization metrics.
    Normalize {
        /// Output tile edge length.
        tile_size: u32,
        /// Resampling filter name.
        filter: String,
    },
}

/// High-level summary of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Whether a board was found.
    pub matched: bool,
    /// Square size `(x, y)` in pixels, on a match.
    pub square_size: Option<(u32, u32)>,
}

impl DetectionDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Detection Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{}",
            self.summary.image_width, self.summary.image_height,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(match self.summary.square_size {
            Some((x, y)) => format!("Board found: squares {x}x{y}"),
            None => "No board found".to_string(),
        });

        lines.join("\n")
    }

    /// The stages that ran, in order, with display names.
    #[must_use]
    pub fn stages(&self) -> Vec<(&'static str, &StageDiagnostics)> {
        let mut stages = vec![
            (Decoded::NAME, &self.decode),
            (GradientsComputed::NAME, &self.gradients),
            (Profiled::NAME, &self.profiles),
            (LinesLocated::NAME, &self.lines),
        ];
        if let Some(ref tiles) = self.tiles {
            stages.push((TilesExtracted::NAME, tiles));
        }
        if let Some(ref normalize) = self.normalize {
            stages.push((Normalized::NAME, normalize));
        }
        stages
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
            ..
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Gradients { mean_magnitude } => format!("mean |g|={mean_magnitude:.2}"),
        StageMetrics::Profiles { max_x, max_y } => format!("max x={max_x:.1} y={max_y:.1}"),
        StageMetrics::Lines {
            threshold_x,
            threshold_y,
            candidates_x,
            candidates_y,
            matched,
        } => format!(
            "thresh x={threshold_x:.1} y={threshold_y:.1} candidates x={candidates_x} y={candidates_y} matched={matched}",
        ),
        StageMetrics::Tiles {
            step_x,
            step_y,
            padding_x,
            padding_y,
        } => format!(
            "{step_x}x{step_y} px, pad x={}/{} y={}/{}",
            padding_x.leading, padding_x.trailing, padding_y.leading, padding_y.trailing,
        ),
        StageMetrics::Normalize { tile_size, filter } => {
            format!("{tile_size}x{tile_size} {filter}")
        }
    }
}

/// Time one stage transition, collecting the new stage's metrics.
fn timed<C: Clock, S: PipelineStage>(clock: &C, run: impl FnOnce() -> S) -> (S, StageDiagnostics) {
    let start = clock.now();
    let stage = run();
    let duration = clock.elapsed(&start);
    let metrics = stage.metrics();
    (stage, StageDiagnostics { duration, metrics })
}

/// Run detection on raw image bytes, collecting per-stage diagnostics.
///
/// # Errors
///
/// Same as [`crate::process`].
pub fn detect_with_diagnostics<C: Clock>(
    image_bytes: &[u8],
    config: &VisionConfig,
    clock: &C,
) -> Result<(Detection, DetectionDiagnostics), VisionError> {
    let total_start = clock.now();
    let pending = Pipeline::new(image_bytes.to_vec(), config.clone());

    let decode_start = clock.now();
    let decoded = pending.decode()?;
    let decode = StageDiagnostics {
        duration: clock.elapsed(&decode_start),
        metrics: decoded.metrics(),
    };
    let (image_width, image_height) = decoded.gray().dimensions();

    let (gradients_stage, gradients) = timed(clock, || decoded.compute_gradients());
    let (profiled, profiles) = timed(clock, || gradients_stage.profile());
    let (located, lines) = timed(clock, || profiled.locate_lines());
    let tile_size = located.config().tile_size;

    let tiles_start = clock.now();
    let (detection, tiles, normalize) = match located.extract_tiles() {
        Some(extracted) => {
            let tiles = StageDiagnostics {
                duration: clock.elapsed(&tiles_start),
                metrics: extracted.metrics(),
            };
            let (normalized, normalize) = timed(clock, || extracted.normalize());
            (normalized.into_detection(), Some(tiles), Some(normalize))
        }
        None => (Detection::unmatched(tile_size), None, None),
    };

    let summary = DetectionSummary {
        image_width,
        image_height,
        matched: detection.matched(),
        square_size: detection.geometry.map(|g| (g.step_x(), g.step_y())),
    };

    let diagnostics = DetectionDiagnostics {
        decode,
        gradients,
        profiles,
        lines,
        tiles,
        normalize,
        total_duration: clock.elapsed(&total_start),
        summary,
    };

    Ok((detection, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use image::{GrayImage, Luma};

    use super::*;

    /// Deterministic clock that advances one millisecond per reading.
    struct StepClock {
        ticks: Cell<u64>,
    }

    impl Clock for StepClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn png(img: &GrayImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::L8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn board_run_records_every_stage() {
        let board = GrayImage::from_fn(400, 400, |x, y| {
            Luma([if (x / 50 + y / 50) % 2 == 0 { 220 } else { 40 }])
        });
        let clock = StepClock { ticks: Cell::new(0) };
        let (detection, diag) =
            detect_with_diagnostics(&png(&board), &VisionConfig::default(), &clock).unwrap();

        assert!(detection.matched());
        let names: Vec<&str> = diag.stages().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, crate::pipeline::STAGE_NAMES);
        assert_eq!(diag.summary.square_size, Some((50, 50)));
        assert!(diag.total_duration >= diag.decode.duration);

        let report = diag.report();
        assert!(report.contains("Detection Diagnostics Report"));
        assert!(report.contains("normalize"));
        assert!(report.contains("Board found: squares 50x50"));
    }

    #[test]
    fn no_match_skips_tile_stages() {
        let flat = GrayImage::from_pixel(64, 48, Luma([100]));
        let clock = StepClock { ticks: Cell::new(0) };
        let (detection, diag) =
            detect_with_diagnostics(&png(&flat), &VisionConfig::default(), &clock).unwrap();

        assert!(!detection.matched());
        assert!(diag.tiles.is_none());
        assert!(diag.normalize.is_none());
        let names: Vec<&str> = diag.stages().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, crate::pipeline::STAGE_NAMES[..4]);
        assert!(diag.report().contains("No board found"));
        assert!(matches!(
            diag.lines.metrics,
            StageMetrics::Lines { matched: false, .. }
        ));
    }

    #[test]
    fn decode_errors_propagate() {
        let clock = StepClock { ticks: Cell::new(0) };
        let result = detect_with_diagnostics(&[], &VisionConfig::default(), &clock);
        assert!(matches!(result, Err(VisionError::EmptyInput)));
    }

    #[test]
    fn diagnostics_serialize_to_json() {
        let flat = GrayImage::from_pixel(16, 16, Luma([0]));
        let clock = StepClock { ticks: Cell::new(0) };
        let (_, diag) =
            detect_with_diagnostics(&png(&flat), &VisionConfig::default(), &clock).unwrap();
        let json = serde_json::to_string(&diag).unwrap();
        let back: DetectionDiagnostics = serde_json::from_str(&json).unwrap();
        assert_eq!(back.summary, diag.summary);
        assert_eq!(back.lines.metrics, diag.lines.metrics);
    }
}
