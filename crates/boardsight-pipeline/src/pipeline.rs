//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs detection in one call,
//! [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use boardsight_pipeline::{Pipeline, VisionConfig, VisionError};
//! # fn run(png: Vec<u8>) -> Result<(), VisionError> {
//! let located = Pipeline::new(png, VisionConfig::default())
//!     .decode()?
//!     .compute_gradients()
//!     .profile()
//!     .locate_lines();
//!
//! let candidates = &located.search_x().candidates;
//! assert!(candidates.windows(2).all(|pair| pair[0] < pair[1]));
//! if let Some(extracted) = located.extract_tiles() {
//!     let detection = extracted.normalize().into_detection();
//!     assert!(detection.matched());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state,
//! carrying the intensity image along. [`LinesLocated::extract_tiles`]
//! returns `None` when either axis failed to match, which ends the run.

use crate::detector::{BoardGeometry, Detection, Detector};
use crate::diagnostics::StageMetrics;
use crate::gradient::{self, GradientField};
use crate::lines::LineSearch;
use crate::normalize::{NormalizedTileGrid, normalize_tiles};
use crate::profile::{self, Profile};
use crate::tiles::{TileGrid, extract_tiles};
use crate::types::{Axis, Dimensions, GrayImage, VisionConfig, VisionError};

/// Stage metadata shared by every processed pipeline state.
///
/// [`Pending`] has done no work yet and does not implement it.
pub trait PipelineStage {
    /// Human-readable name of this stage (e.g. `"lines"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for [`Decoded`] through `5`
    /// for [`Normalized`]).
    const INDEX: usize;

    /// Metrics describing the work done to reach this state.
    fn metrics(&self) -> StageMetrics;
}

/// Number of processing stages.
pub const STAGE_COUNT: usize = 6;

/// Stage names in [`PipelineStage::INDEX`] order.
pub const STAGE_NAMES: [&str; STAGE_COUNT] = [
    Decoded::NAME,
    GradientsComputed::NAME,
    Profiled::NAME,
    LinesLocated::NAME,
    TilesExtracted::NAME,
    Normalized::NAME,
];

// ───────────────────────── Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
#[must_use = "pipeline stages are consumed by advancing (call .decode() to continue)"]
pub struct Pending {
    config: VisionConfig,
    source: Vec<u8>,
}

impl Pending {
    /// The raw source image bytes.
    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Validate the config, decode the source and convert it to
    /// intensity.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::InvalidConfig`] for an out-of-range config,
    /// [`VisionError::EmptyInput`] if the source bytes are empty and
    /// [`VisionError::ImageDecode`] if they cannot be decoded.
    pub fn decode(self) -> Result<Decoded, VisionError> {
        let detector = Detector::new(self.config)?;
        let image = crate::grayscale::decode(&self.source)?;
        Ok(Decoded {
            detector,
            gray: crate::grayscale::to_intensity(&image),
            source_len: self.source.len(),
        })
    }
}

// ───────────────────────── Decoded ──────────────────────────

/// Pipeline state after decoding and intensity conversion.
#[must_use = "pipeline stages are consumed by advancing (call .compute_gradients() to continue)"]
pub struct Decoded {
    detector: Detector,
    gray: GrayImage,
    source_len: usize,
}

impl Decoded {
    /// The intensity image.
    #[must_use]
    pub const fn gray(&self) -> &GrayImage {
        &self.gray
    }

    /// Advance to the gradient stage.
    pub fn compute_gradients(self) -> GradientsComputed {
        let field = gradient::compute_gradients(&self.gray);
        GradientsComputed {
            detector: self.detector,
            gray: self.gray,
            field,
        }
    }
}

impl PipelineStage for Decoded {
    const NAME: &str = "decode";
    const INDEX: usize = 0;

    fn metrics(&self) -> StageMetrics {
        let dimensions = Dimensions::of(&self.gray);
        StageMetrics::Decode {
            input_bytes: self.source_len,
            width: dimensions.width,
            height: dimensions.height,
            pixel_count: dimensions.pixel_count(),
        }
    }
}

// ──────────────────────── Gradients ─────────────────────────

/// Pipeline state after computing the x and y gradients.
#[must_use = "pipeline stages are consumed by advancing (call .profile() to continue)"]
pub struct GradientsComputed {
    detector: Detector,
    gray: GrayImage,
    field: GradientField,
}

impl GradientsComputed {
    /// The gradient planes.
    #[must_use]
    pub const fn field(&self) -> &GradientField {
        &self.field
    }

    /// Advance to the profile stage.
    pub fn profile(self) -> Profiled {
        let profiles = profile::line_profiles(&self.field, self.detector.config().gradient_clip);
        Profiled {
            detector: self.detector,
            gray: self.gray,
            profiles,
        }
    }
}

impl PipelineStage for GradientsComputed {
    const NAME: &str = "gradients";
    const INDEX: usize = 1;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Gradients {
            mean_magnitude: self.field.mean_magnitude(),
        }
    }
}

// ───────────────────────── Profiled ─────────────────────────

/// Pipeline state after projecting both line-strength profiles.
#[must_use = "pipeline stages are consumed by advancing (call .locate_lines() to continue)"]
pub struct Profiled {
    detector: Detector,
    gray: GrayImage,
    profiles: [Profile; 2],
}

impl Profiled {
    /// The profile along `axis`.
    #[must_use]
    pub const fn profile(&self, axis: Axis) -> &Profile {
        match axis {
            Axis::X => &self.profiles[0],
            Axis::Y => &self.profiles[1],
        }
    }

    /// Advance to the line-location stage.
    pub fn locate_lines(self) -> LinesLocated {
        let [px, py] = &self.profiles;
        let locator = self.detector.locator();
        let searches = [locator.locate(px), locator.locate(py)];
        LinesLocated {
            detector: self.detector,
            gray: self.gray,
            searches,
        }
    }
}

impl PipelineStage for Profiled {
    const NAME: &str = "profiles";
    const INDEX: usize = 2;

    fn metrics(&self) -> StageMetrics {
        let [px, py] = &self.profiles;
        StageMetrics::Profiles {
            max_x: px.max(),
            max_y: py.max(),
        }
    }
}

// ─────────────────────── LinesLocated ───────────────────────

/// Pipeline state after searching both profiles for grid lines.
#[must_use = "pipeline stages are consumed by advancing (call .extract_tiles() to continue)"]
pub struct LinesLocated {
    detector: Detector,
    gray: GrayImage,
    searches: [LineSearch; 2],
}

impl LinesLocated {
    /// The configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &VisionConfig {
        self.detector.config()
    }

    /// Line search along x (vertical lines).
    #[must_use]
    pub const fn search_x(&self) -> &LineSearch {
        &self.searches[0]
    }

    /// Line search along y (horizontal lines).
    #[must_use]
    pub const fn search_y(&self) -> &LineSearch {
        &self.searches[1]
    }

    /// Board geometry, if both axes matched.
    #[must_use]
    pub fn geometry(&self) -> Option<BoardGeometry> {
        let [x, y] = &self.searches;
        BoardGeometry::from_searches(x, y, Dimensions::of(&self.gray))
    }

    /// Whether both axes matched.
    #[must_use]
    pub fn matched(&self) -> bool {
        self.searches.iter().all(LineSearch::matched)
    }

    /// Cut the 64 squares, or `None` if no board was found.
    #[must_use = "returns None when no board was found"]
    pub fn extract_tiles(self) -> Option<TilesExtracted> {
        let geometry = self.geometry()?;
        let tiles = extract_tiles(&self.gray, &geometry.lines_x, &geometry.lines_y);
        Some(TilesExtracted {
            detector: self.detector,
            geometry,
            tiles,
        })
    }

    /// Run the remaining stages, producing placeholder tiles when no
    /// board was found.
    #[must_use]
    pub fn into_detection(self) -> Detection {
        let tile_size = self.config().tile_size;
        self.extract_tiles().map_or_else(
            || Detection::unmatched(tile_size),
            |extracted| extracted.normalize().into_detection(),
        )
    }
}

impl PipelineStage for LinesLocated {
    const NAME: &str = "lines";
    const INDEX: usize = 3;

    fn metrics(&self) -> StageMetrics {
        let [x, y] = &self.searches;
        StageMetrics::Lines {
            threshold_x: x.threshold,
            threshold_y: y.threshold,
            candidates_x: x.candidates.len(),
            candidates_y: y.candidates.len(),
            matched: self.matched(),
        }
    }
}

// ────────────────────── TilesExtracted ──────────────────────

/// Pipeline state after cutting the board into squares.
#[must_use = "pipeline stages are consumed by advancing (call .normalize() to continue)"]
pub struct TilesExtracted {
    detector: Detector,
    geometry: BoardGeometry,
    tiles: TileGrid,
}

impl TilesExtracted {
    /// Where the board was found.
    #[must_use]
    pub const fn geometry(&self) -> &BoardGeometry {
        &self.geometry
    }

    /// The raw squares at their source resolution.
    #[must_use]
    pub const fn tiles(&self) -> &TileGrid {
        &self.tiles
    }

    /// Advance to the normalization stage.
    pub fn normalize(self) -> Normalized {
        let config = self.detector.config();
        let tiles = normalize_tiles(&self.tiles, config.tile_size, config.resample_filter);
        Normalized {
            detector: self.detector,
            geometry: self.geometry,
            tiles,
        }
    }
}

impl PipelineStage for TilesExtracted {
    const NAME: &str = "tiles";
    const INDEX: usize = 4;

    fn metrics(&self) -> StageMetrics {
        StageMetrics::Tiles {
            step_x: self.geometry.step_x(),
            step_y: self.geometry.step_y(),
            padding_x: self.geometry.padding_x,
            padding_y: self.geometry.padding_y,
        }
    }
}

// ──────────────────────── Normalized ────────────────────────

/// Final pipeline state: 64 normalized squares.
#[must_use = "call .into_detection() to take the result"]
pub struct Normalized {
    detector: Detector,
    geometry: BoardGeometry,
    tiles: NormalizedTileGrid,
}

impl Normalized {
    /// The normalized squares.
    #[must_use]
    pub const fn tiles(&self) -> &NormalizedTileGrid {
        &self.tiles
    }

    /// Consume the pipeline, returning the detection.
    #[must_use]
    pub fn into_detection(self) -> Detection {
        Detection {
            tiles: self.tiles,
            geometry: Some(self.geometry),
        }
    }
}

impl PipelineStage for Normalized {
    const NAME: &str = "normalize";
    const INDEX: usize = 5;

    fn metrics(&self) -> StageMetrics {
        let config = self.detector.config();
        StageMetrics::Normalize {
            tile_size: config.tile_size,
            filter: config.resample_filter.to_string(),
        }
    }
}

/// Entry point for the incremental pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline over raw image bytes.
    pub const fn new(source: Vec<u8>, config: VisionConfig) -> Pending {
        Pending { config, source }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;
    use crate::tiles::BOARD_SQUARES;

    fn encode_png(img: &GrayImage) -> Vec<u8> {
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

    fn board_png() -> Vec<u8> {
        encode_png(&GrayImage::from_fn(400, 400, |x, y| {
            Luma([if (x / 50 + y / 50) % 2 == 0 { 235 } else { 20 }])
        }))
    }

    #[test]
    fn stage_indices_are_sequential() {
        let indices = [
            Decoded::INDEX,
            GradientsComputed::INDEX,
            Profiled::INDEX,
            LinesLocated::INDEX,
            TilesExtracted::INDEX,
            Normalized::INDEX,
        ];
        assert_eq!(indices.len(), STAGE_COUNT);
        for (expected, index) in indices.into_iter().enumerate() {
            assert_eq!(expected, index);
        }
    }

    #[test]
    fn stage_names_follow_indices() {
        assert_eq!(STAGE_NAMES[Decoded::INDEX], Decoded::NAME);
        assert_eq!(STAGE_NAMES[LinesLocated::INDEX], "lines");
        assert_eq!(STAGE_NAMES[Normalized::INDEX], Normalized::NAME);
    }

    #[test]
    fn stepping_through_a_board() {
        let pending = Pipeline::new(board_png(), VisionConfig::default());
        assert!(!pending.source().is_empty());

        let decoded = pending.decode().unwrap();
        assert_eq!(decoded.gray().dimensions(), (400, 400));
        assert!(matches!(
            decoded.metrics(),
            StageMetrics::Decode { width: 400, height: 400, .. }
        ));

        let profiled = decoded.compute_gradients().profile();
        assert_eq!(profiled.profile(Axis::X).len(), 400);
        assert_eq!(profiled.profile(Axis::Y).len(), 400);

        let located = profiled.locate_lines();
        assert!(located.matched());
        let expected: Vec<u32> = (1..=7).map(|i| i * 50).collect();
        assert_eq!(located.search_x().candidates, expected);
        assert_eq!(located.search_y().candidates, expected);

        let extracted = located.extract_tiles().unwrap();
        assert_eq!(extracted.tiles().len(), BOARD_SQUARES);
        assert!(matches!(
            extracted.metrics(),
            StageMetrics::Tiles { step_x: 50, step_y: 50, .. }
        ));

        let detection = extracted.normalize().into_detection();
        assert!(detection.matched());
        assert_eq!(detection.tiles.tile_size(), 32);
    }

    #[test]
    fn no_board_ends_at_line_location() {
        let png = encode_png(&GrayImage::from_pixel(120, 90, Luma([60])));
        let located = Pipeline::new(png, VisionConfig::default())
            .decode()
            .unwrap()
            .compute_gradients()
            .profile()
            .locate_lines();
        assert!(!located.matched());
        assert!(located.geometry().is_none());

        let detection = located.into_detection();
        assert!(!detection.matched());
        assert_eq!(detection.tiles.len(), BOARD_SQUARES);
    }

    #[test]
    fn decode_validates_config() {
        let config = VisionConfig {
            smoothing_length: 4,
            ..VisionConfig::default()
        };
        let result = Pipeline::new(board_png(), config).decode();
        assert!(matches!(result, Err(VisionError::InvalidConfig(_))));
    }

    #[test]
    fn decode_rejects_empty_source() {
        let result = Pipeline::new(Vec::new(), VisionConfig::default()).decode();
        assert!(matches!(result, Err(VisionError::EmptyInput)));
    }
}
