//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image::load_from_memory_with_format` |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality 1-100) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → WebP | RGB quantization + `image::codecs::webp::WebPEncoder` (lossless) |
//!
//! The `image` crate only ships a lossless WebP encoder. Lossy WebP quality
//! is emulated by quantizing RGB channels before encoding (see
//! [`quantize_rgb`](super::compose::quantize_rgb)), which keeps the stack
//! free of C bindings.

use super::backend::{BackendError, ImageBackend};
use super::compose::quantize_rgb;
use super::params::{OutputFormat, Quality};
use crate::acquire::MediaType;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_failed(format: OutputFormat) -> impl Fn(image::ImageError) -> BackendError {
    move |e| BackendError::Encode(format!("{} encode failed: {}", format.label(), e))
}

impl ImageBackend for RustBackend {
    fn decode(&self, bytes: &[u8], media_type: MediaType) -> Result<RgbaImage, BackendError> {
        let img = image::load_from_memory_with_format(bytes, media_type.image_format())
            .map_err(|e| BackendError::Decode(format!("{}: {}", media_type.mime_type(), e)))?;
        Ok(img.to_rgba8())
    }

    fn resize(
        &self,
        image: &RgbaImage,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "Invalid target size {width}x{height}"
            )));
        }
        if image.dimensions() == (width, height) {
            return Ok(image.clone());
        }
        Ok(image::imageops::resize(
            image,
            width,
            height,
            FilterType::Lanczos3,
        ))
    }

    fn encode(
        &self,
        image: &RgbaImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let (width, height) = image.dimensions();
        let mut buffer = Vec::new();

        match format {
            OutputFormat::Jpeg => {
                // Alpha is dropped, not flattened against a color
                let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
                JpegEncoder::new_with_quality(&mut buffer, quality.value() as u8)
                    .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                    .map_err(encode_failed(format))?;
            }
            OutputFormat::Png => {
                PngEncoder::new(&mut buffer)
                    .write_image(image.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(encode_failed(format))?;
            }
            OutputFormat::WebP => {
                let mut pixels = image.as_raw().clone();
                quantize_rgb(&mut pixels, quality);
                WebPEncoder::new_lossless(&mut buffer)
                    .write_image(&pixels, width, height, ExtendedColorType::Rgba8)
                    .map_err(encode_failed(format))?;
            }
        }

        Ok(buffer)
    }
}
