//! Square extraction.
//!
//! Rebuilds the nine square boundaries on each axis from a
//! [`PrunedLineSet`] and cuts the intensity image into 64 tiles of
//! exactly `step_x × step_y` pixels.
//!
//! Two kinds of padding keep every tile the same size:
//!
//! - The outer boundaries are extrapolated one step beyond the outermost
//!   line and may fall outside the image when the board is partially
//!   cropped. Source coordinates are clamped to the image, which
//!   replicates the nearest edge row or column.
//! - Rounding the mean spacing leaves individual cells a pixel or two
//!   longer or shorter than `step`. Long cells are trimmed on their far
//!   side (the last cell on its near side); short cells are padded on
//!   their near side (the last cell on its far side), again by edge
//!   replication.
//!
//! Tiles are stored at index `(7 − row) × 8 + column` with row 0 at the
//! top of the image, so index 0 is the bottom-left square (a1 when the
//! board is seen from white's side).

use std::fmt;

use image::GrayImage;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::lines::{BOARD_LINES, PrunedLineSet};
use crate::types::Dimensions;

/// Squares along one side of the board.
pub const BOARD_SIDE: usize = BOARD_LINES + 1;

/// Squares on the board.
pub const BOARD_SQUARES: usize = BOARD_SIDE * BOARD_SIDE;

/// Tile index of the square at `column` (from the left) and `row` (from
/// the top of the image).
#[must_use]
pub const fn tile_index(column: usize, row: usize) -> usize {
    (BOARD_SIDE - 1 - row) * BOARD_SIDE + column
}

/// Algebraic name (`a1`..`h8`) of the square at tile `index` for a board
/// seen from white's side. `None` for indices past 63.
#[must_use]
pub fn square_name(index: usize) -> Option<String> {
    if index >= BOARD_SQUARES {
        return None;
    }
    let file = b"abcdefgh"[index % BOARD_SIDE] as char;
    let rank = index / BOARD_SIDE + 1;
    Some(format!("{file}{rank}"))
}

/// Which player's side of the board the image is viewed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    /// White at the bottom; tile order is a1, b1, …, h8.
    #[default]
    White,
    /// Black at the bottom; the tile order is reversed to restore a1..h8.
    Black,
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => f.write_str("white"),
            Self::Black => f.write_str("black"),
        }
    }
}

/// Pixels by which the extrapolated board extends past the image on one
/// axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgePadding {
    /// Before coordinate 0 (left or top).
    pub leading: u32,
    /// Past the last pixel (right or bottom).
    pub trailing: u32,
}

impl EdgePadding {
    /// Padding needed to cover the outer boundaries of `lines` on an axis
    /// of `extent` pixels.
    #[must_use]
    pub fn for_lines(lines: &PrunedLineSet, extent: u32) -> Self {
        let bounds = lines.boundaries();
        let leading = (-bounds[0]).max(0);
        let trailing = (bounds[BOARD_SIDE] - i64::from(extent)).max(0);
        Self {
            leading: u32::try_from(leading).unwrap_or(u32::MAX),
            trailing: u32::try_from(trailing).unwrap_or(u32::MAX),
        }
    }

    /// Whether the board fits inside the image on this axis.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.leading == 0 && self.trailing == 0
    }
}

/// The source interval of one board cell along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSpan {
    /// First source coordinate (may be negative when the board is cropped).
    pub start: i64,
    /// Source pixels actually covered, at most `step`.
    pub width: u32,
    /// Replicated pixels placed before the covered interval.
    pub lead: u32,
}

impl CellSpan {
    /// Source coordinate for tile coordinate `t`, before clamping to the
    /// image.
    #[must_use]
    pub fn source(self, t: u32) -> i64 {
        let last = (i64::from(self.width) - 1).max(0);
        let offset = (i64::from(t) - i64::from(self.lead)).clamp(0, last);
        self.start + offset
    }
}

/// The eight cell spans along one axis.
#[must_use]
pub fn cell_spans(lines: &PrunedLineSet) -> [CellSpan; BOARD_SIDE] {
    let step = i64::from(lines.step());
    let bounds = lines.boundaries();
    std::array::from_fn(|k| {
        let (mut lo, mut hi) = (bounds[k], bounds[k + 1]);
        let last = k == BOARD_SIDE - 1;
        if hi - lo > step {
            if last {
                lo = hi - step;
            } else {
                hi = lo + step;
            }
        }
        let width = hi - lo;
        let lead = if width < step && !last { step - width } else { 0 };
        CellSpan {
            start: lo,
            width: u32::try_from(width).unwrap_or(0),
            lead: u32::try_from(lead).unwrap_or(0),
        }
    })
}

/// Per-cell lookup of clamped source coordinates for every tile
/// coordinate along one axis.
fn source_tables(lines: &PrunedLineSet, extent: u32) -> [Vec<u32>; BOARD_SIDE] {
    let step = lines.step();
    let max = i64::from(extent) - 1;
    cell_spans(lines).map(|span| {
        (0..step)
            .map(|t| u32::try_from(span.source(t).clamp(0, max)).unwrap_or(0))
            .collect()
    })
}

/// The 64 squares of a board, each `tile_width × tile_height` pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
    tile_width: u32,
    tile_height: u32,
    tiles: Vec<GrayImage>,
}

impl TileGrid {
    /// 64 all-black tiles, returned when no board was found.
    #[must_use]
    pub fn placeholder(tile_width: u32, tile_height: u32) -> Self {
        Self {
            tile_width,
            tile_height,
            tiles: vec![GrayImage::new(tile_width, tile_height); BOARD_SQUARES],
        }
    }

    /// Width and height of every tile.
    #[must_use]
    pub const fn tile_dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.tile_width,
            height: self.tile_height,
        }
    }

    /// All 64 tiles in index order.
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

    /// Always `false`; present for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Consume the grid, returning the tiles.
    #[must_use]
    pub fn into_tiles(self) -> Vec<GrayImage> {
        self.tiles
    }
}

/// Cut `image` into the 64 squares delimited by `lines_x` (vertical
/// lines) and `lines_y` (horizontal lines).
#[must_use = "returns the extracted tiles"]
pub fn extract_tiles(
    image: &GrayImage,
    lines_x: &PrunedLineSet,
    lines_y: &PrunedLineSet,
) -> TileGrid {
    let (step_x, step_y) = (lines_x.step(), lines_y.step());
    if image.width() == 0 || image.height() == 0 {
        return TileGrid::placeholder(step_x, step_y);
    }

    let columns = source_tables(lines_x, image.width());
    let rows = source_tables(lines_y, image.height());
    debug!(
        "extracting {BOARD_SQUARES} tiles of {step_x}x{step_y}, padding x {:?} y {:?}",
        EdgePadding::for_lines(lines_x, image.width()),
        EdgePadding::for_lines(lines_y, image.height()),
    );

    let mut tiles = vec![GrayImage::new(step_x, step_y); BOARD_SQUARES];
    for (row, ys) in rows.iter().enumerate() {
        for (column, xs) in columns.iter().enumerate() {
            tiles[tile_index(column, row)] = GrayImage::from_fn(step_x, step_y, |tx, ty| {
                *image.get_pixel(xs[tx as usize], ys[ty as usize])
            });
        }
    }

    TileGrid {
        tile_width: step_x,
        tile_height: step_y,
        tiles,
    }
}
