//! Directional intensity gradients.
//!
//! Correlates the intensity image with two fixed 3×3 kernels: uniform
//! `-1 / 0 / +1` columns for the x gradient and the transposed rows for
//! the y gradient. Output has the same shape as the input; border pixels
//! see edge-replicated neighbors (`imageproc::filter::filter_clamped`).
//!
//! Gradients are computed in `i16` (the largest response is `3 × 255`)
//! and promoted to `f32` for the projection stage.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel::Kernel;

use crate::types::{Axis, Dimensions};

/// Row-major x-gradient kernel.
pub const DX_KERNEL: [i32; 9] = [-1, 0, 1, -1, 0, 1, -1, 0, 1];

/// Row-major y-gradient kernel.
pub const DY_KERNEL: [i32; 9] = [-1, -1, -1, 0, 0, 0, 1, 1, 1];

/// The two gradient planes of an intensity image, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientField {
    dimensions: Dimensions,
    dx: Vec<f32>,
    dy: Vec<f32>,
}

impl GradientField {
    /// Image dimensions the planes were computed for.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// The gradient plane along `axis`, row-major.
    #[must_use]
    pub fn component(&self, axis: Axis) -> &[f32] {
        match axis {
            Axis::X => &self.dx,
            Axis::Y => &self.dy,
        }
    }

    /// Split the gradient along `axis` into its clamped positive and
    /// negative parts.
    #[must_use]
    pub fn split(&self, axis: Axis, clip: f32) -> SplitGradient {
        let plane = self.component(axis);
        SplitGradient {
            dimensions: self.dimensions,
            positive: plane.iter().map(|&g| g.clamp(0.0, clip)).collect(),
            negative: plane.iter().map(|&g| g.clamp(-clip, 0.0)).collect(),
        }
    }

    /// Mean absolute gradient over both planes, for diagnostics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_magnitude(&self) -> f64 {
        let n = self.dx.len() + self.dy.len();
        if n == 0 {
            return 0.0;
        }
        let sum: f64 = self
            .dx
            .iter()
            .chain(&self.dy)
            .map(|&g| f64::from(g.abs()))
            .sum();
        sum / n as f64
    }
}

/// One gradient plane split into `[0, clip]` and `[-clip, 0]` parts.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitGradient {
    dimensions: Dimensions,
    positive: Vec<f32>,
    negative: Vec<f32>,
}

impl SplitGradient {
    /// Image dimensions.
    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Positive part, row-major.
    #[must_use]
    pub fn positive(&self) -> &[f32] {
        &self.positive
    }

    /// Negative part, row-major.
    #[must_use]
    pub fn negative(&self) -> &[f32] {
        &self.negative
    }
}

/// Compute the x and y gradients of an intensity image.
#[must_use = "returns the gradient field"]
pub fn compute_gradients(image: &GrayImage) -> GradientField {
    let dimensions = Dimensions::of(image);
    if dimensions.pixel_count() == 0 {
        return GradientField {
            dimensions,
            dx: Vec::new(),
            dy: Vec::new(),
        };
    }

    let dx: Image<Luma<i16>> = filter_clamped(image, Kernel::new(&DX_KERNEL, 3, 3));
    let dy: Image<Luma<i16>> = filter_clamped(image, Kernel::new(&DY_KERNEL, 3, 3));

    GradientField {
        dimensions,
        dx: dx.pixels().map(|p| f32::from(p.0[0])).collect(),
        dy: dy.pixels().map(|p| f32::from(p.0[0])).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(field: &GradientField, axis: Axis, x: u32, y: u32) -> f32 {
        let w = field.dimensions().width;
        field.component(axis)[(y * w + x) as usize]
    }

    /// 10x10 image, black left of x = 5, white from x = 5 on.
    fn vertical_step() -> GrayImage {
        GrayImage::from_fn(10, 10, |x, _| Luma([if x < 5 { 0 } else { 255 }]))
    }

    #[test]
    fn output_shape_matches_input() {
        let field = compute_gradients(&GrayImage::new(17, 31));
        assert_eq!(
            field.dimensions(),
            Dimensions {
                width: 17,
                height: 31
            }
        );
        assert_eq!(field.component(Axis::X).len(), 17 * 31);
        assert_eq!(field.component(Axis::Y).len(), 17 * 31);
    }

    #[test]
    fn uniform_image_has_no_gradient() {
        let field = compute_gradients(&GrayImage::from_pixel(8, 8, Luma([77])));
        assert!(field.component(Axis::X).iter().all(|&g| g == 0.0));
        assert!(field.component(Axis::Y).iter().all(|&g| g == 0.0));
        assert!(field.mean_magnitude().abs() < f64::EPSILON);
    }

    #[test]
    fn vertical_step_responds_only_in_x() {
        let field = compute_gradients(&vertical_step());
        // The two columns straddling the step see a full 3-row response.
        assert!((at(&field, Axis::X, 4, 5).abs() - 765.0).abs() < f32::EPSILON);
        assert!((at(&field, Axis::X, 5, 5).abs() - 765.0).abs() < f32::EPSILON);
        assert!(at(&field, Axis::X, 1, 5).abs() < f32::EPSILON);
        assert!(at(&field, Axis::X, 8, 5).abs() < f32::EPSILON);
        assert!(field.component(Axis::Y).iter().all(|&g| g == 0.0));
    }

    #[test]
    fn both_step_columns_have_the_same_sign() {
        let field = compute_gradients(&vertical_step());
        let a = at(&field, Axis::X, 4, 0);
        let b = at(&field, Axis::X, 5, 9);
        assert!(a * b > 0.0, "expected equal signs, got {a} and {b}");
    }

    #[test]
    fn transposed_step_responds_only_in_y() {
        let img = GrayImage::from_fn(10, 10, |_, y| Luma([if y < 5 { 200 } else { 10 }]));
        let field = compute_gradients(&img);
        assert!(at(&field, Axis::Y, 3, 4).abs() > 0.0);
        assert!(field.component(Axis::X).iter().all(|&g| g == 0.0));
    }

    #[test]
    fn split_clamps_both_parts() {
        let field = compute_gradients(&vertical_step());
        let split = field.split(Axis::X, 255.0);
        assert!(split.positive().iter().all(|&g| (0.0..=255.0).contains(&g)));
        assert!(split.negative().iter().all(|&g| (-255.0..=0.0).contains(&g)));
        let peak = split
            .positive()
            .iter()
            .chain(split.negative())
            .map(|g| g.abs())
            .fold(0.0_f32, f32::max);
        assert!((peak - 255.0).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_image_yields_empty_field() {
        let field = compute_gradients(&GrayImage::new(0, 0));
        assert!(field.component(Axis::X).is_empty());
        assert!(field.mean_magnitude().abs() < f64::EPSILON);
    }
}
