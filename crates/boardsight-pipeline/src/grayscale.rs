//! Image decoding and intensity conversion.
//!
//! Accepts raw image bytes (PNG, JPEG, BMP, WebP) or an already decoded
//! image of any channel layout and produces the single-channel intensity
//! image every later stage works on.

use image::{DynamicImage, GrayImage};

use crate::types::VisionError;

/// Decode raw image bytes without converting them.
///
/// # Errors
///
/// Returns [`VisionError::EmptyInput`] if `bytes` is empty.
/// Returns [`VisionError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, VisionError> {
    if bytes.is_empty() {
        return Err(VisionError::EmptyInput);
    }
    Ok(image::load_from_memory(bytes)?)
}

/// Convert an image of any channel depth to 8-bit luma.
///
/// Alpha is dropped; color images use the `image` crate's luminance
/// weighting. Already-gray 8-bit images are copied unchanged.
#[must_use = "returns the intensity image"]
pub fn to_intensity(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

/// Decode raw image bytes and convert to intensity in one step.
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_and_grayscale(bytes: &[u8]) -> Result<GrayImage, VisionError> {
    decode(bytes).map(|image| to_intensity(&image))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// Helper: encode an RGBA image as a PNG byte buffer.
    fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
        let mut buf = Vec::new();
        let encoder = image::codecs::png::PngEncoder::new(&mut buf);
        image::ImageEncoder::write_image(
            encoder,
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
        buf
    }

    #[test]
    fn empty_input_returns_error() {
        let result = decode_and_grayscale(&[]);
        assert!(matches!(result, Err(VisionError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_returns_image_decode_error() {
        let result = decode_and_grayscale(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(VisionError::ImageDecode(_))));
    }

    #[test]
    fn white_png_decodes_to_white() {
        let img = image::RgbaImage::from_fn(2, 2, |_, _| image::Rgba([255, 255, 255, 255]));
        let gray = decode_and_grayscale(&encode_png(&img)).unwrap();
        assert!(gray.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn output_dimensions_match_input() {
        let img = image::RgbaImage::from_fn(17, 31, |_, _| image::Rgba([128, 64, 32, 255]));
        let gray = decode_and_grayscale(&encode_png(&img)).unwrap();
        assert_eq!(gray.dimensions(), (17, 31));
    }

    #[test]
    fn green_is_brightest_primary() {
        let luma = |rgb: [u8; 3]| {
            let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(1, 1, image::Rgb(rgb)));
            to_intensity(&img).get_pixel(0, 0).0[0]
        };
        let (r, g, b) = (luma([255, 0, 0]), luma([0, 255, 0]), luma([0, 0, 255]));
        assert!(g > r && r > b, "expected G > R > B, got R={r} G={g} B={b}");
    }

    #[test]
    fn gray_input_is_passed_through() {
        let src = GrayImage::from_fn(5, 3, |x, y| image::Luma([u8::try_from(x * 10 + y).unwrap()]));
        let converted = to_intensity(&DynamicImage::ImageLuma8(src.clone()));
        assert_eq!(converted, src);
    }
}
