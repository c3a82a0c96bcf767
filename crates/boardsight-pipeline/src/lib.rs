//! boardsight-pipeline: chessboard detection and square extraction
//! (sans-IO).
//!
//! Finds an axis-aligned 8×8 chessboard in a screenshot or photo and cuts
//! it into 64 normalized square images for a piece classifier:
//!
//! intensity -> gradients -> line profiles -> grid lines -> tiles ->
//! normalized tiles.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! images or byte slices and returns structured data. Reading files,
//! capturing the screen and classifying pieces live elsewhere.
//!
//! Not finding a board is an ordinary outcome, reported through
//! [`Detection::matched`], never as an error.

pub mod detector;
pub mod diagnostics;
pub mod gradient;
pub mod grayscale;
pub mod lines;
pub mod normalize;
pub mod pipeline;
pub mod profile;
pub mod tiles;
pub mod types;

pub use detector::{BoardGeometry, Detection, Detector, process};
pub use lines::{LineSearch, PrunedLineSet};
pub use normalize::{NormalizedTileGrid, ResampleFilter};
pub use pipeline::Pipeline;
pub use tiles::{BOARD_SQUARES, EdgePadding, Orientation, TileGrid, square_name};
pub use types::{Axis, Dimensions, GrayImage, VisionConfig, VisionError};
