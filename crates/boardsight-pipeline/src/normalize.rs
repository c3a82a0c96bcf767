//! Tile normalization.
//!
//! Resizes every extracted square to a fixed `tile_size × tile_size`
//! raster so the classifier always sees the same input shape.

use std::fmt;

use image::GrayImage;
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::tiles::{BOARD_SQUARES, Orientation, TileGrid};

/// Resampling filter used when resizing tiles.
///
/// Ordered from fastest/lowest-quality to slowest/highest-quality.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResampleFilter {
    /// Nearest-neighbor: fastest, blocky artifacts.
    Nearest,
    /// Bilinear interpolation.
    Triangle,
    /// Bicubic (Catmull-Rom).
    CatmullRom,
    /// Gaussian: smooth output.
    Gaussian,
    /// Lanczos with 3 lobes: anti-aliased downscaling, sharpest upscaling.
    #[default]
    Lanczos3,
}

impl ResampleFilter {
    /// Convert to the `image` crate's `FilterType`.
    #[must_use]
    pub const fn to_image_filter(self) -> FilterType {
        match self {
            Self::Nearest => FilterType::Nearest,
            Self::Triangle => FilterType::Triangle,
            Self::CatmullRom => FilterType::CatmullRom,
            Self::Gaussian => FilterType::Gaussian,
            Self::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl fmt::Display for ResampleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nearest => f.write_str("Nearest"),
            Self::Triangle => f.write_str("Triangle"),
            Self::CatmullRom => f.write_str("CatmullRom"),
            Self::Gaussian => f.write_str("Gaussian"),
            Self::Lanczos3 => f.write_str("Lanczos3"),
        }
    }
}

/// 64 tiles of identical square size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTileGrid {
    size: u32,
    tiles: Vec<GrayImage>,
}

impl NormalizedTileGrid {
    /// 64 all-black `size × size` tiles.
    #[must_use]
    pub fn placeholder(size: u32) -> Self {
        Self {
            size,
            tiles: vec![GrayImage::new(size, size); BOARD_SQUARES],
        }
    }

    /// Edge length of every tile.
    #[must_use]
    pub const fn tile_size(&self) -> u32 {
        self.size
    }

    /// All 64 tiles, a1 first for a board seen from white's side.
    #[must_use]
    pub fn tiles(&self) -> &[GrayImage] {
        &self.tiles
    }

    /// Tile at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&GrayImage> {
        self.tiles.get(index)
    }

    /// Number of tiles, always 64.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Always `false`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// The tiles reordered for `orientation`.
    ///
    /// A board photographed from black's side has h8 at the bottom left;
    /// reversing the order maps index 0 back to a1.
    #[must_use]
    pub fn oriented(&self, orientation: Orientation) -> Vec<&GrayImage> {
        match orientation {
            Orientation::White => self.tiles.iter().collect(),
            Orientation::Black => self.tiles.iter().rev().collect(),
        }
    }

    /// One row of `size²` intensities in `[0, 255]` per tile, row-major.
    #[must_use]
    pub fn features(&self) -> Vec<Vec<f32>> {
        self.tiles
            .iter()
            .map(|tile| tile.as_raw().iter().copied().map(f32::from).collect())
            .collect()
    }

    /// Consume the grid, returning the tiles.
    #[must_use]
    pub fn into_tiles(self) -> Vec<GrayImage> {
        self.tiles
    }
}

/// Resize every tile to `size × size` with `filter`.
#[must_use = "returns the normalized tiles"]
pub fn normalize_tiles(grid: &TileGrid, size: u32, filter: ResampleFilter) -> NormalizedTileGrid {
    let filter = filter.to_image_filter();
    let tiles = grid
        .tiles()
        .iter()
        .map(|tile| {
            if tile.dimensions() == (size, size) {
                tile.clone()
            } else if tile.width() == 0 || tile.height() == 0 {
                GrayImage::new(size, size)
            } else {
                imageops::resize(tile, size, size, filter)
            }
        })
        .collect();
    NormalizedTileGrid { size, tiles }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Luma;

    use super::*;
    use crate::lines::PrunedLineSet;
    use crate::tiles::extract_tiles;

    fn uniform_grid(step: u32, value: u8) -> TileGrid {
        let image = GrayImage::from_pixel(step * 8, step * 8, Luma([value]));
        let lines: Vec<u32> = (1..=7).map(|i| i * step).collect();
        let set = PrunedLineSet::try_from(lines.as_slice()).unwrap();
        extract_tiles(&image, &set, &set)
    }

    #[test]
    fn default_filter_is_lanczos() {
        assert_eq!(ResampleFilter::default(), ResampleFilter::Lanczos3);
        assert_eq!(ResampleFilter::Lanczos3.to_string(), "Lanczos3");
    }

    #[test]
    fn every_tile_is_resized() {
        for step in [20, 32, 50] {
            let normalized = normalize_tiles(&uniform_grid(step, 128), 32, ResampleFilter::Lanczos3);
            assert_eq!(normalized.len(), BOARD_SQUARES);
            assert!(normalized.tiles().iter().all(|t| t.dimensions() == (32, 32)));
        }
    }

    #[test]
    fn uniform_tiles_stay_uniform() {
        let normalized = normalize_tiles(&uniform_grid(50, 200), 32, ResampleFilter::Triangle);
        assert!(
            normalized
                .tiles()
                .iter()
                .all(|t| t.pixels().all(|p| p.0[0].abs_diff(200) <= 1))
        );
    }

    #[test]
    fn placeholder_grid_normalizes_to_zeros() {
        let normalized = normalize_tiles(&TileGrid::placeholder(0, 0), 32, ResampleFilter::Lanczos3);
        assert_eq!(normalized, NormalizedTileGrid::placeholder(32));
    }

    #[test]
    fn features_are_flat_rows() {
        let normalized = normalize_tiles(&uniform_grid(32, 7), 32, ResampleFilter::Nearest);
        let features = normalized.features();
        assert_eq!(features.len(), 64);
        assert!(features.iter().all(|row| row.len() == 32 * 32));
        assert!((features[10][100] - 7.0).abs() < f32::EPSILON);
    }

    #[test]
    fn black_orientation_reverses_order() {
        let mut tiles = NormalizedTileGrid::placeholder(2);
        for (i, tile) in tiles.tiles.iter_mut().enumerate() {
            tile.put_pixel(0, 0, Luma([u8::try_from(i).unwrap()]));
        }
        let white = tiles.oriented(Orientation::White);
        let black = tiles.oriented(Orientation::Black);
        assert_eq!(white[0].get_pixel(0, 0).0[0], 0);
        assert_eq!(black[0].get_pixel(0, 0).0[0], 63);
        assert_eq!(black[63].get_pixel(0, 0).0[0], 0);
    }
}
