//! Line-strength profiles.
//!
//! Projects a split gradient plane onto one axis. For the x axis:
//!
//! ```text
//! profile[i] = (Σ_rows pos[:, i]) × (Σ_rows −neg[:, i]) / H²
//! ```
//!
//! and symmetrically for the y axis with columns and `W²`. A column
//! crossed by a long straight edge whose contrast flips sign along its
//! length (a chessboard line) scores high in both sums, so the product
//! is large; a one-sided edge such as the image border scores near zero.

use serde::{Deserialize, Serialize};

use crate::gradient::{GradientField, SplitGradient};
use crate::types::Axis;

/// One-dimensional line-strength profile along an axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    axis: Axis,
    values: Vec<f64>,
}

impl Profile {
    /// Wrap precomputed values.
    #[must_use]
    pub const fn new(axis: Axis, values: Vec<f64>) -> Self {
        Self { axis, values }
    }

    /// The axis this profile runs along.
    #[must_use]
    pub const fn axis(&self) -> Axis {
        self.axis
    }

    /// One value per column (x) or row (y).
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the profile has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Largest value, or `0.0` for an empty profile.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.values.iter().copied().fold(0.0, f64::max)
    }

    /// Binarization threshold: `fraction × max`.
    #[must_use]
    pub fn threshold(&self, fraction: f64) -> f64 {
        self.max() * fraction
    }
}

/// Project the gradient along `axis` into a line-strength profile.
#[must_use = "returns the line-strength profile"]
pub fn line_profile(field: &GradientField, axis: Axis, clip: f32) -> Profile {
    project(&field.split(axis, clip), axis)
}

/// Compute both profiles, x first.
#[must_use]
pub fn line_profiles(field: &GradientField, clip: f32) -> [Profile; 2] {
    Axis::BOTH.map(|axis| line_profile(field, axis, clip))
}

#[allow(clippy::cast_possible_truncation)]
fn project(split: &SplitGradient, axis: Axis) -> Profile {
    let dims = split.dimensions();
    let (width, height) = (dims.width as usize, dims.height as usize);
    let len = dims.along(axis) as usize;
    let mut pos_sums = vec![0.0_f64; len];
    let mut neg_sums = vec![0.0_f64; len];

    let parts = split.positive().iter().zip(split.negative());
    for (idx, (&pos, &neg)) in parts.enumerate() {
        let bin = match axis {
            Axis::X => idx % width,
            Axis::Y => idx / width,
        };
        pos_sums[bin] += f64::from(pos);
        neg_sums[bin] -= f64::from(neg);
    }

    let orthogonal = match axis {
        Axis::X => height,
        Axis::Y => width,
    };
    #[allow(clippy::cast_precision_loss)]
    let norm = (orthogonal * orthogonal) as f64;

    let values = pos_sums
        .iter()
        .zip(&neg_sums)
        .map(|(p, n)| p * n / norm)
        .collect();
    Profile::new(axis, values)
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma};

    use super::*;
    use crate::gradient::compute_gradients;

    /// Two 20-row bands with a vertical edge at x = 10 whose polarity
    /// flips between bands, like a chessboard column boundary.
    fn flipping_edge() -> GrayImage {
        GrayImage::from_fn(20, 40, |x, y| {
            let left = x < 10;
            let top = y < 20;
            Luma([if left == top { 220 } else { 30 }])
        })
    }

    #[test]
    fn profile_lengths_follow_axes() {
        let field = compute_gradients(&GrayImage::new(13, 7));
        let [px, py] = line_profiles(&field, 255.0);
        assert_eq!(px.len(), 13);
        assert_eq!(py.len(), 7);
        assert_eq!(px.axis(), Axis::X);
        assert_eq!(py.axis(), Axis::Y);
    }

    #[test]
    fn flipping_edge_peaks_at_boundary_columns() {
        let field = compute_gradients(&flipping_edge());
        let px = line_profile(&field, Axis::X, 255.0);
        let max = px.max();
        assert!(max > 0.0);
        assert!((px.values()[9] - max).abs() < 1e-9);
        assert!((px.values()[10] - max).abs() < 1e-9);
        assert!(px.values()[5].abs() < 1e-9);
    }

    #[test]
    fn one_sided_edge_scores_zero() {
        // A single dark-to-light step has only positive (or only
        // negative) gradient, so the product vanishes.
        let img = GrayImage::from_fn(20, 20, |x, _| Luma([if x < 10 { 0 } else { 255 }]));
        let px = line_profile(&compute_gradients(&img), Axis::X, 255.0);
        assert!(px.values().iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn normalized_by_orthogonal_extent_squared() {
        // At column 10 the 19 rows fully inside a band saturate at 255
        // (3 × 190 clamped); rows 19 and 20 straddle the band boundary
        // and give 190. Each sign therefore sums to 19 × 255 + 190.
        let field = compute_gradients(&flipping_edge());
        let px = line_profile(&field, Axis::X, 255.0);
        let side = 19.0f64.mul_add(255.0, 190.0);
        let expected = side * side / (40.0 * 40.0);
        assert!(
            (px.values()[10] - expected).abs() < 1e-6,
            "expected {expected}, got {}",
            px.values()[10],
        );
    }

    #[test]
    fn threshold_is_fraction_of_max() {
        let profile = Profile::new(Axis::Y, vec![0.0, 2.0, 10.0, 4.0]);
        assert!((profile.threshold(0.54) - 5.4).abs() < 1e-12);
    }

    #[test]
    fn empty_profile_max_is_zero() {
        let profile = Profile::new(Axis::X, Vec::new());
        assert!(profile.is_empty());
        assert!(profile.max().abs() < f64::EPSILON);
    }
}
