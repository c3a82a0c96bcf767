//! Grid line location.
//!
//! Turns a line-strength [`Profile`] into the seven internal grid lines
//! of a chessboard along one axis:
//!
//! 1. binarize against `fraction × max` and smooth with a Gaussian
//!    window ([`SmoothingKernel::convolve_same`]),
//! 2. thin the smoothed signal to isolated spikes ([`skeletonize`]),
//! 3. take the spike positions as candidates ([`candidates`]),
//! 4. keep the first run of seven evenly spaced candidates ([`prune`]),
//! 5. re-check the kept run ([`is_consistent`]).
//!
//! Finding nothing is the common case while polling a screen and is
//! reported as `None`, not as an error.

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::profile::Profile;
use crate::types::{Axis, VisionConfig, VisionError};

/// Number of internal grid lines on each axis of a chessboard.
pub const BOARD_LINES: usize = 7;

/// Number of spacings that must agree with the run's reference spacing.
const MATCHING_SPACINGS: usize = BOARD_LINES - 2;

/// A normalized, symmetric Gaussian window.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingKernel {
    weights: Vec<f64>,
}

impl SmoothingKernel {
    /// Sampled Gaussian of `length` taps centered on the middle tap,
    /// normalized to unit sum.
    ///
    /// `length` is expected to be odd (see [`VisionConfig::validate`]).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn gaussian(length: usize, sigma: f64) -> Self {
        let center = (length as f64 - 1.0) / 2.0;
        let raw: Vec<f64> = (0..length)
            .map(|n| {
                let d = (n as f64 - center) / sigma;
                (-0.5 * d * d).exp()
            })
            .collect();
        let total: f64 = raw.iter().sum();
        Self {
            weights: raw.into_iter().map(|w| w / total).collect(),
        }
    }

    /// The kernel taps.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Convolve `signal` with the kernel, returning an output of the same
    /// length centered on the input. Samples outside the signal are zero.
    #[must_use]
    pub fn convolve_same(&self, signal: &[f64]) -> Vec<f64> {
        let half = self.weights.len() / 2;
        (0..signal.len())
            .map(|i| {
                self.weights
                    .iter()
                    .enumerate()
                    .filter_map(|(k, w)| {
                        (i + half)
                            .checked_sub(k)
                            .and_then(|j| signal.get(j))
                            .map(|x| w * x)
                    })
                    .sum::<f64>()
            })
            .collect()
    }
}

/// `1.0` where the profile strictly exceeds `threshold`, else `0.0`.
#[must_use]
pub fn binarize(profile: &Profile, threshold: f64) -> Vec<f64> {
    profile
        .values()
        .iter()
        .map(|&v| if v > threshold { 1.0 } else { 0.0 })
        .collect()
}

/// Thin a non-negative 1D signal down to isolated spikes, keeping the
/// rightmost sample of every plateau.
///
/// The forward pass drops every sample that is not strictly greater than
/// its right neighbor; what survives of each bump is its peak and its
/// falling flank. The backward pass then drops every sample whose left
/// neighbor is larger, which clears the flank and leaves the peak.
#[must_use]
pub fn skeletonize(mut values: Vec<f64>) -> Vec<f64> {
    let len = values.len();

    // Forward. values[i + 1] has not been touched yet, so this compares
    // unthinned samples.
    for i in 0..len.saturating_sub(1) {
        if values[i] <= values[i + 1] {
            values[i] = 0.0;
        }
    }

    // Backward, against the partially thinned left neighbor.
    for i in (1..len).rev() {
        if values[i - 1] > values[i] {
            values[i] = 0.0;
        }
    }

    values
}

/// Ascending positions of the nonzero samples of a skeleton.
#[must_use]
pub fn candidates(skeleton: &[f64]) -> Vec<u32> {
    skeleton
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v != 0.0)
        .filter_map(|(i, _)| u32::try_from(i).ok())
        .collect()
}

/// Running state of the spacing-consistency scan.
///
/// The reference spacing starts at zero. A spacing within `tolerance`
/// of the reference extends the run; any other spacing becomes the new
/// reference and restarts the run at its own left line.
struct SpacingRun {
    tolerance: i64,
    reference: i64,
    matched: usize,
    start: usize,
}

impl SpacingRun {
    fn new(tolerance: u32) -> Self {
        Self {
            tolerance: i64::from(tolerance),
            reference: 0,
            matched: 0,
            start: 0,
        }
    }

    fn push(&mut self, index: usize, spacing: i64) {
        if (spacing - self.reference).abs() < self.tolerance {
            self.matched += 1;
        } else {
            self.matched = 0;
            self.reference = spacing;
            self.start = index;
        }
    }
}

fn spacings(lines: &[u32]) -> impl Iterator<Item = i64> + '_ {
    lines
        .windows(2)
        .map(|pair| i64::from(pair[1]) - i64::from(pair[0]))
}

/// Select the first run of seven candidates whose spacings agree within
/// `tolerance` pixels.
///
/// Returns `None` when no such run exists. A run that begins by matching
/// the initial zero reference (candidates packed closer than
/// `tolerance`) yields only six lines and is rejected too, so the result
/// is always exactly seven lines or nothing.
#[must_use]
pub fn prune(lines: &[u32], tolerance: u32) -> Option<PrunedLineSet> {
    let mut run = SpacingRun::new(tolerance);
    for (i, spacing) in spacings(lines).enumerate() {
        run.push(i, spacing);
        if run.matched == MATCHING_SPACINGS {
            return PrunedLineSet::try_from(&lines[run.start..i + 2]).ok();
        }
    }
    None
}

/// Whether the spacing scan over `lines` ends on a run of exactly six
/// agreeing spacings.
#[must_use]
pub fn is_consistent(lines: &[u32], tolerance: u32) -> bool {
    let mut run = SpacingRun::new(tolerance);
    for (i, spacing) in spacings(lines).enumerate() {
        run.push(i, spacing);
    }
    run.matched == MATCHING_SPACINGS
}

/// Exactly seven ascending internal grid-line coordinates along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrunedLineSet([u32; BOARD_LINES]);

impl PrunedLineSet {
    /// The seven line coordinates.
    #[must_use]
    pub const fn lines(&self) -> &[u32; BOARD_LINES] {
        &self.0
    }

    /// Square size: the mean line spacing rounded to the nearest whole
    /// pixel, ties to even.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn step(&self) -> u32 {
        let span = f64::from(self.0[BOARD_LINES - 1].saturating_sub(self.0[0]));
        #[allow(clippy::cast_precision_loss)]
        let mean = span / (BOARD_LINES - 1) as f64;
        mean.round_ties_even() as u32
    }

    /// The nine square boundaries: the seven lines plus one extrapolated
    /// `step` beyond each end. The outer values may fall outside the
    /// image (negative, or past its extent).
    #[must_use]
    pub fn boundaries(&self) -> [i64; BOARD_LINES + 2] {
        let step = i64::from(self.step());
        let mut bounds = [0; BOARD_LINES + 2];
        bounds[0] = i64::from(self.0[0]) - step;
        for (slot, &line) in bounds[1..=BOARD_LINES].iter_mut().zip(&self.0) {
            *slot = i64::from(line);
        }
        bounds[BOARD_LINES + 1] = i64::from(self.0[BOARD_LINES - 1]) + step;
        bounds
    }
}

impl TryFrom<&[u32]> for PrunedLineSet {
    type Error = VisionError;

    fn try_from(lines: &[u32]) -> Result<Self, Self::Error> {
        <[u32; BOARD_LINES]>::try_from(lines)
            .map(Self)
            .map_err(|_| VisionError::InvalidLineSet { len: lines.len() })
    }
}

/// Outcome of searching one profile for grid lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSearch {
    /// Axis the profile runs along.
    pub axis: Axis,
    /// Binarization threshold that was applied.
    pub threshold: f64,
    /// Skeleton spike positions before pruning.
    pub candidates: Vec<u32>,
    /// The accepted lines, if this axis matched.
    pub lines: Option<PrunedLineSet>,
}

impl LineSearch {
    /// Whether seven consistent lines were found.
    #[must_use]
    pub const fn matched(&self) -> bool {
        self.lines.is_some()
    }
}

/// Line-location stage with its smoothing kernel precomputed.
///
/// Build once (normally through [`Detector`](crate::Detector)) and reuse
/// for every image.
#[derive(Debug, Clone, PartialEq)]
pub struct LineLocator {
    kernel: SmoothingKernel,
    threshold_fraction: f64,
    tolerance: u32,
}

impl LineLocator {
    /// Build the locator from an already validated config.
    #[must_use]
    pub fn new(config: &VisionConfig) -> Self {
        Self {
            kernel: SmoothingKernel::gaussian(config.smoothing_length, config.smoothing_sigma),
            threshold_fraction: config.threshold_fraction,
            tolerance: config.spacing_tolerance,
        }
    }

    /// The smoothing kernel.
    #[must_use]
    pub const fn kernel(&self) -> &SmoothingKernel {
        &self.kernel
    }

    /// Search `profile` for seven consistent grid lines.
    #[must_use]
    pub fn locate(&self, profile: &Profile) -> LineSearch {
        let axis = profile.axis();
        let threshold = profile.threshold(self.threshold_fraction);
        let smoothed = self.kernel.convolve_same(&binarize(profile, threshold));
        let found = candidates(&skeletonize(smoothed));
        trace!("axis {axis}: candidates {found:?}");

        let lines = prune(&found, self.tolerance)
            .filter(|set| is_consistent(set.lines(), self.tolerance));
        debug!(
            "axis {axis}: threshold {threshold:.3}, {} candidates, matched: {}",
            found.len(),
            lines.is_some(),
        );

        LineSearch {
            axis,
            threshold,
            candidates: found,
            lines,
        }
    }
}
