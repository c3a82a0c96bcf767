//! Shared types for the boardsight detection pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::normalize::ResampleFilter;

/// Re-export `GrayImage` so downstream crates can reference the
/// intensity image and tile rasters without depending on `image` directly.
pub use image::GrayImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of a grayscale image.
    #[must_use]
    pub fn of(image: &GrayImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Extent along `axis`: the width for [`Axis::X`], the height for
    /// [`Axis::Y`].
    #[must_use]
    pub const fn along(self, axis: Axis) -> u32 {
        match axis {
            Axis::X => self.width,
            Axis::Y => self.height,
        }
    }

    /// Total pixel count.
    #[must_use]
    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

/// Image axis selector.
///
/// Grid lines found along [`Axis::X`] are vertical lines (one x
/// coordinate each, separating files); lines along [`Axis::Y`] are
/// horizontal (separating ranks).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Horizontal image axis (columns).
    X,
    /// Vertical image axis (rows).
    Y,
}

impl Axis {
    /// Both axes, x first.
    pub const BOTH: [Self; 2] = [Self::X, Self::Y];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => f.write_str("x"),
            Self::Y => f.write_str("y"),
        }
    }
}

/// Configuration for the detection pipeline.
///
/// The defaults reproduce the tuned constants of the detector; they are
/// exposed as associated constants so front ends (e.g. CLI flags) can
/// share them.
///
/// Construct a [`Detector`](crate::Detector) from a config to validate it
/// once and precompute the smoothing kernel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Fraction of a profile's maximum above which a row/column counts
    /// as a line. `3/5 × 0.9`.
    pub threshold_fraction: f64,

    /// Length of the Gaussian window used to smooth the binarized
    /// profile. Must be odd so the window has a center sample.
    pub smoothing_length: usize,

    /// Standard deviation of the Gaussian smoothing window, in samples.
    pub smoothing_sigma: f64,

    /// Two consecutive line spacings belong to the same run when they
    /// differ by strictly less than this many pixels.
    pub spacing_tolerance: u32,

    /// Gradient magnitudes are clamped to `[-gradient_clip, gradient_clip]`
    /// before projection.
    pub gradient_clip: f32,

    /// Edge length of a normalized tile in pixels.
    pub tile_size: u32,

    /// Resampling filter used to normalize tiles.
    pub resample_filter: ResampleFilter,
}

impl VisionConfig {
    /// Default line threshold fraction.
    pub const DEFAULT_THRESHOLD_FRACTION: f64 = 3.0 / 5.0 * 0.9;
    /// Default Gaussian window length.
    pub const DEFAULT_SMOOTHING_LENGTH: usize = 21;
    /// Default Gaussian standard deviation.
    pub const DEFAULT_SMOOTHING_SIGMA: f64 = 4.0;
    /// Default spacing tolerance in pixels.
    pub const DEFAULT_SPACING_TOLERANCE: u32 = 5;
    /// Default gradient clamp.
    pub const DEFAULT_GRADIENT_CLIP: f32 = 255.0;
    /// Default normalized tile edge length.
    pub const DEFAULT_TILE_SIZE: u32 = 32;
    /// Default tile resampling filter.
    pub const DEFAULT_RESAMPLE_FILTER: ResampleFilter = ResampleFilter::Lanczos3;

    /// Check every field against its valid range.
    ///
    /// # Errors
    ///
    /// Returns [`VisionError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), VisionError> {
        if !(self.threshold_fraction.is_finite()
            && self.threshold_fraction > 0.0
            && self.threshold_fraction <= 1.0)
        {
            return Err(VisionError::InvalidConfig(format!(
                "threshold_fraction must be in (0, 1], got {}",
                self.threshold_fraction
            )));
        }
        if self.smoothing_length == 0 || self.smoothing_length % 2 == 0 {
            return Err(VisionError::InvalidConfig(format!(
                "smoothing_length must be odd, got {}",
                self.smoothing_length
            )));
        }
        if !(self.smoothing_sigma.is_finite() && self.smoothing_sigma > 0.0) {
            return Err(VisionError::InvalidConfig(format!(
                "smoothing_sigma must be positive, got {}",
                self.smoothing_sigma
            )));
        }
        if self.spacing_tolerance == 0 {
            return Err(VisionError::InvalidConfig(
                "spacing_tolerance must be at least 1".to_string(),
            ));
        }
        if !(self.gradient_clip.is_finite() && self.gradient_clip > 0.0) {
            return Err(VisionError::InvalidConfig(format!(
                "gradient_clip must be positive, got {}",
                self.gradient_clip
            )));
        }
        if self.tile_size == 0 {
            return Err(VisionError::InvalidConfig(
                "tile_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            threshold_fraction: Self::DEFAULT_THRESHOLD_FRACTION,
            smoothing_length: Self::DEFAULT_SMOOTHING_LENGTH,
            smoothing_sigma: Self::DEFAULT_SMOOTHING_SIGMA,
            spacing_tolerance: Self::DEFAULT_SPACING_TOLERANCE,
            gradient_clip: Self::DEFAULT_GRADIENT_CLIP,
            tile_size: Self::DEFAULT_TILE_SIZE,
            resample_filter: Self::DEFAULT_RESAMPLE_FILTER,
        }
    }
}

/// Errors that can occur during detection.
///
/// Not finding a board is **not** an error: it is reported through
/// [`Detection::matched`](crate::Detection::matched).
///
/// Uses custom `Serialize`/`Deserialize` because `image::ImageError`
/// does not implement serde traits. The `ImageDecode` variant is
/// serialized as its `Display` string.
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Detector configuration is invalid.
    #[error("invalid detector configuration: {0}")]
    InvalidConfig(String),

    /// A line set of the wrong length was offered where exactly seven
    /// internal grid lines are required.
    #[error("a board line set needs exactly 7 lines, got {len}")]
    InvalidLineSet {
        /// Number of lines that were supplied.
        len: usize,
    },
}

/// Serde-compatible proxy for `VisionError`.
#[derive(Serialize, Deserialize)]
enum VisionErrorProxy {
    ImageDecode(String),
    EmptyInput,
    InvalidConfig(String),
    InvalidLineSet { len: usize },
}

impl Serialize for VisionError {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::ImageDecode(e) => VisionErrorProxy::ImageDecode(e.to_string()),
            Self::EmptyInput => VisionErrorProxy::EmptyInput,
            Self::InvalidConfig(s) => VisionErrorProxy::InvalidConfig(s.clone()),
            Self::InvalidLineSet { len } => VisionErrorProxy::InvalidLineSet { len: *len },
        };
        proxy.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VisionError {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let proxy = VisionErrorProxy::deserialize(deserializer)?;
        Ok(match proxy {
            // The typed image::ImageError cannot be rebuilt; keep the message.
            VisionErrorProxy::ImageDecode(msg) => {
                Self::InvalidConfig(format!("image decode error: {msg}"))
            }
            VisionErrorProxy::EmptyInput => Self::EmptyInput,
            VisionErrorProxy::InvalidConfig(s) => Self::InvalidConfig(s),
            VisionErrorProxy::InvalidLineSet { len } => Self::InvalidLineSet { len },
        })
    }
}
