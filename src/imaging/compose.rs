//! Compositing onto a background color and encoding to the output format.
//!
//! ## Known format limitation
//!
//! JPEG has no alpha channel. With a [`BackgroundColor::Transparent`]
//! background, transparent regions are flattened by simply dropping alpha,
//! so they come out as whatever RGB the pixel still stores (usually black or
//! the original color under a removed background). Pick a solid background
//! when exporting JPEG from a transparent source.

use super::backend::{BackendError, ImageBackend};
use super::params::{OutputFormat, Quality};
use crate::color::BackgroundColor;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{Rgba, RgbaImage};

/// An encoded image plus everything the preview and export sides need.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    /// Raw encoded file bytes.
    pub bytes: Vec<u8>,
    /// `data:<mime>;base64,<payload>` preview URL.
    pub data_url: String,
    /// Decoded byte length estimated from `data_url`.
    pub estimated_size: u64,
}

/// Draw `source` over `background`.
///
/// A solid background fills the surface first and the source is blended on
/// top with source-over compositing; the result is fully opaque. A
/// transparent background returns the source unchanged.
pub fn composite(source: &RgbaImage, background: BackgroundColor) -> RgbaImage {
    let BackgroundColor::Solid(fill) = background else {
        return source.clone();
    };

    let [br, bg, bb] = fill.0;
    RgbaImage::from_fn(source.width(), source.height(), |x, y| {
        let Rgba([r, g, b, a]) = *source.get_pixel(x, y);
        let a = a as u32;
        let over = |s: u8, d: u8| ((s as u32 * a + d as u32 * (255 - a) + 127) / 255) as u8;
        Rgba([over(r, br), over(g, bg), over(b, bb), 255])
    })
}

/// Estimate the decoded byte length of a base64 data URL.
///
/// `round(len(payload) * 0.75 - padding)`. Container overhead is not modeled;
/// this is a size estimate, not a file size.
pub fn estimate_encoded_size(data_url: &str) -> u64 {
    let payload = data_url.split_once(',').map_or("", |(_, p)| p);
    let padding = payload.len() - payload.trim_end_matches('=').len();
    (payload.len() as f64 * 0.75 - padding as f64).round().max(0.0) as u64
}

/// Encode `image` with the backend and wrap the result for preview.
///
/// Quality is forwarded only for lossy formats; PNG output is identical
/// for any quality value.
pub fn encode(
    backend: &impl ImageBackend,
    image: &RgbaImage,
    format: OutputFormat,
    quality: Quality,
) -> Result<EncodedImage, BackendError> {
    let quality = if format.uses_quality() {
        quality
    } else {
        Quality::new(100)
    };
    let bytes = backend.encode(image, format, quality)?;
    let data_url = format!("data:{};base64,{}", format.mime_type(), STANDARD.encode(&bytes));
    let estimated_size = estimate_encoded_size(&data_url);

    Ok(EncodedImage {
        format,
        width: image.width(),
        height: image.height(),
        bytes,
        data_url,
        estimated_size,
    })
}

/// Reduce RGB precision so the lossless WebP encoder has less entropy to keep.
///
/// Maps the quality slider (1-100) to a per-channel level count. Alpha is
/// left untouched so transparency stays crisp. Quality 100 is a no-op.
pub fn quantize_rgb(data: &mut [u8], quality: Quality) {
    let levels = levels_for_quality(quality);
    if levels >= 256 {
        return;
    }
    let step = 255.0 / (levels as f32 - 1.0);
    for pixel in data.chunks_exact_mut(4) {
        for channel in pixel.iter_mut().take(3) {
            let bucket = (*channel as f32 / step).round();
            *channel = (bucket * step).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Quadratic in quality: fine palettes at the top of the range, coarse at the bottom.
fn levels_for_quality(quality: Quality) -> u16 {
    if quality.value() >= 100 {
        return 256;
    }
    let q = quality.factor();
    (2.0 + q * q * 254.0).round().clamp(2.0, 256.0) as u16
}
