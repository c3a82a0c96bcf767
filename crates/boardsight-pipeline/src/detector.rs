//! End-to-end board detection.

use image::{DynamicImage, GrayImage};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::gradient::compute_gradients;
use crate::grayscale;
use crate::lines::{LineLocator, LineSearch, PrunedLineSet};
use crate::normalize::{NormalizedTileGrid, normalize_tiles};
use crate::profile::line_profiles;
use crate::tiles::{EdgePadding, extract_tiles};
use crate::types::{Dimensions, VisionConfig, VisionError};

/// Where the board sits in the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardGeometry {
    /// The seven vertical internal grid lines (x coordinates).
    pub lines_x: PrunedLineSet,
    /// The seven horizontal internal grid lines (y coordinates).
    pub lines_y: PrunedLineSet,
    /// Horizontal overhang of the extrapolated board past the image.
    pub padding_x: EdgePadding,
    /// Vertical overhang of the extrapolated board past the image.
    pub padding_y: EdgePadding,
}

impl BoardGeometry {
    /// Geometry of a board with the given lines in an image of
    /// `dimensions`.
    #[must_use]
    pub fn new(lines_x: PrunedLineSet, lines_y: PrunedLineSet, dimensions: Dimensions) -> Self {
        Self {
            padding_x: EdgePadding::for_lines(&lines_x, dimensions.width),
            padding_y: EdgePadding::for_lines(&lines_y, dimensions.height),
            lines_x,
            lines_y,
        }
    }

    /// Geometry from the two per-axis searches, if both matched.
    #[must_use]
    pub fn from_searches(x: &LineSearch, y: &LineSearch, dimensions: Dimensions) -> Option<Self> {
        Some(Self::new(x.lines?, y.lines?, dimensions))
    }

    /// Square width in pixels.
    #[must_use]
    pub fn step_x(&self) -> u32 {
        self.lines_x.step()
    }

    /// Square height in pixels.
    #[must_use]
    pub fn step_y(&self) -> u32 {
        self.lines_y.step()
    }

    /// Whether part of the board lies outside the image.
    #[must_use]
    pub const fn is_cropped(&self) -> bool {
        !(self.padding_x.is_zero() && self.padding_y.is_zero())
    }
}

/// Result of running the detector on one image.
///
/// `tiles` always holds 64 entries; without a match they are all black.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// The normalized squares, a1 first.
    pub tiles: NormalizedTileGrid,
    /// Board location, present exactly when a board was found.
    pub geometry: Option<BoardGeometry>,
}

impl Detection {
    /// A no-match result with placeholder tiles of `tile_size`.
    #[must_use]
    pub fn unmatched(tile_size: u32) -> Self {
        Self {
            tiles: NormalizedTileGrid::placeholder(tile_size),
            geometry: None,
        }
    }

    /// Whether a chessboard was found.
    #[must_use]
    pub const fn matched(&self) -> bool {
        self.geometry.is_some()
    }

    /// `(matched, tiles)`.
    #[must_use]
    pub fn into_parts(self) -> (bool, NormalizedTileGrid) {
        (self.geometry.is_some(), self.tiles)
    }
}

/// A validated configuration with its smoothing kernel built.
///
/// Cheap to share: `Detector` is `Send + Sync` and [`detect`](Self::detect)
/// takes `&self`, so one instance can serve a polling loop or several
/// threads.
#[derive(Debug, Clone, PartialEq)]
pub struct Detector {
    config: VisionConfig,
    locator: LineLocator,
}

impl Detector {
    /// Validate `config` and precompute the smoothing kernel.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::InvalidConfig`] if any field is out of range.
    pub fn new(config: VisionConfig) -> Result<Self, VisionError> {
        config.validate()?;
        let locator = LineLocator::new(&config);
        Ok(Self { config, locator })
    }

    /// The configuration this detector was built from.
    #[must_use]
    pub const fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// The line-location stage.
    #[must_use]
    pub const fn locator(&self) -> &LineLocator {
        &self.locator
    }

    /// Detect a board in an image of any channel layout.
    #[must_use]
    pub fn detect(&self, image: &DynamicImage) -> Detection {
        self.detect_gray(&grayscale::to_intensity(image))
    }

    /// Detect a board in an intensity image.
    #[must_use]
    pub fn detect_gray(&self, image: &GrayImage) -> Detection {
        match self.locate(image) {
            Some(geometry) => self.cut(image, geometry),
            None => Detection::unmatched(self.config.tile_size),
        }
    }

    /// Find the board's grid lines without cutting tiles.
    #[must_use]
    pub fn locate(&self, image: &GrayImage) -> Option<BoardGeometry> {
        let field = compute_gradients(image);
        let [px, py] = line_profiles(&field, self.config.gradient_clip);
        let (x, y) = (self.locator.locate(&px), self.locator.locate(&py));
        let geometry = BoardGeometry::from_searches(&x, &y, Dimensions::of(image));
        match &geometry {
            Some(g) => debug!(
                "board found: x {:?} y {:?}, squares {}x{}",
                g.lines_x.lines(),
                g.lines_y.lines(),
                g.step_x(),
                g.step_y(),
            ),
            None => debug!(
                "no board: x matched {}, y matched {}",
                x.matched(),
                y.matched()
            ),
        }
        geometry
    }

    /// Cut and normalize the 64 squares of a located board.
    #[must_use]
    pub fn cut(&self, image: &GrayImage, geometry: BoardGeometry) -> Detection {
        let grid = extract_tiles(image, &geometry.lines_x, &geometry.lines_y);
        let tiles = normalize_tiles(&grid, self.config.tile_size, self.config.resample_filter);
        Detection {
            tiles,
            geometry: Some(geometry),
        }
    }
}

impl Default for Detector {
    fn default() -> Self {
        let config = VisionConfig::default();
        Self {
            locator: LineLocator::new(&config),
            config,
        }
    }
}

/// Decode `image_bytes` (PNG, JPEG, BMP, WebP) and look for a board.
///
/// Not finding a board is a successful result with
/// [`Detection::matched`] `false`.
///
/// # Errors
///
/// Returns [`VisionError::EmptyInput`] or [`VisionError::ImageDecode`]
/// for unreadable input and [`VisionError::InvalidConfig`] for a bad
/// config.
pub fn process(image_bytes: &[u8], config: &VisionConfig) -> Result<Detection, VisionError> {
    let detector = Detector::new(config.clone())?;
    let image = grayscale::decode(image_bytes)?;
    Ok(detector.detect(&image))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;
    use crate::tiles::BOARD_SQUARES;

    fn checkerboard(square: u32, offset: u32, size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let (c, r) = ((x + square - offset) / square, (y + square - offset) / square);
            Luma([if (c + r) % 2 == 0 { 230 } else { 25 }])
        })
    }

    #[test]
    fn detector_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Detector>();
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = VisionConfig {
            smoothing_sigma: -1.0,
            ..VisionConfig::default()
        };
        assert!(matches!(
            Detector::new(config),
            Err(VisionError::InvalidConfig(_))
        ));
    }

    #[test]
    fn default_detector_matches_default_config() {
        let detector = Detector::default();
        assert_eq!(detector, Detector::new(VisionConfig::default()).unwrap());
    }

    #[test]
    fn finds_centered_board() {
        let detection = Detector::default().detect_gray(&checkerboard(50, 0, 400));
        assert!(detection.matched());
        let geometry = detection.geometry.unwrap();
        assert_eq!(geometry.step_x(), 50);
        assert_eq!(geometry.step_y(), 50);
        assert!(!geometry.is_cropped());
        assert_eq!(detection.tiles.len(), BOARD_SQUARES);
    }

    #[test]
    fn uniform_image_is_no_match() {
        let image = GrayImage::from_pixel(200, 200, Luma([128]));
        let detection = Detector::default().detect_gray(&image);
        assert!(!detection.matched());
        assert_eq!(detection.tiles, NormalizedTileGrid::placeholder(32));
    }

    #[test]
    fn unmatched_into_parts() {
        let (matched, tiles) = Detection::unmatched(16).into_parts();
        assert!(!matched);
        assert_eq!(tiles.len(), BOARD_SQUARES);
        assert_eq!(tiles.tile_size(), 16);
    }

    #[test]
    fn process_rejects_empty_input() {
        assert!(matches!(
            process(&[], &VisionConfig::default()),
            Err(VisionError::EmptyInput)
        ));
    }

    #[test]
    fn process_rejects_bad_config_before_decoding() {
        let config = VisionConfig {
            tile_size: 0,
            ..VisionConfig::default()
        };
        assert!(matches!(
            process(&[], &config),
            Err(VisionError::InvalidConfig(_))
        ));
    }
}
