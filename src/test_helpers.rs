//! Shared test utilities for the imgbatch test suite.
//!
//! Synthetic image builders and input files for unit tests. Everything here
//! is generated in memory so tests never depend on fixture files.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let mut img = framed_image(20, 20, WHITE, RED, 5);
//! remove_background(&mut img, Tolerance::default());
//! assert_eq!(transparent_count(&img), 20 * 20 - 10 * 10);
//! ```

use crate::acquire::{DecodedSource, MediaType, SourceFile};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage};
use std::sync::Arc;

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const RED: Rgba<u8> = Rgba([220, 20, 20, 255]);

// =========================================================================
// Pixel buffers
// =========================================================================

pub fn solid_image(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
    RgbaImage::from_pixel(width, height, color)
}

/// `background` border of `margin` pixels around a `foreground` block.
pub fn framed_image(
    width: u32,
    height: u32,
    background: Rgba<u8>,
    foreground: Rgba<u8>,
    margin: u32,
) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let inside = x >= margin && y >= margin && x + margin < width && y + margin < height;
        if inside { foreground } else { background }
    })
}

/// Opaque diagonal gradient; no two neighbouring rows are equal.
pub fn gradient_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let r = (x * 255 / width.max(1)) as u8;
        let g = (y * 255 / height.max(1)) as u8;
        Rgba([r, g, r.wrapping_add(g), 255])
    })
}

pub fn transparent_count(image: &RgbaImage) -> usize {
    image.pixels().filter(|p| p.0[3] == 0).count()
}

// =========================================================================
// Encoded bytes
// =========================================================================

pub fn encode_png_bytes(image: &RgbaImage) -> Vec<u8> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out)
        .write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgba8)
        .unwrap();
    out
}

pub fn encode_jpeg_bytes(image: &RgbaImage) -> Vec<u8> {
    let rgb = image::DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 90)
        .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
        .unwrap();
    out
}

// =========================================================================
// Inputs
// =========================================================================

/// A decoded white source, as if `name` had been loaded from disk.
pub fn decoded(name: &str, width: u32, height: u32) -> DecodedSource {
    DecodedSource {
        name: name.to_string(),
        original_bytes: u64::from(width) * u64::from(height) * 3,
        pixels: Arc::new(solid_image(width, height, WHITE)),
    }
}

/// Input file understood by `MockBackend`: the payload encodes its size.
pub fn mock_file(name: &str, width: u8, height: u8) -> SourceFile {
    let mut bytes = vec![width, height];
    bytes.resize(64, 0);
    SourceFile::new(name, MediaType::mime_for_name(name), bytes)
}
