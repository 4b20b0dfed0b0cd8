//! Pure calculation functions for output dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//! No function ever returns a dimension larger than the source or smaller
//! than 1.

use super::params::Sizing;

/// Resolve the output dimensions for a source image.
///
/// # Arguments
/// * `original` - Source dimensions (width, height), both > 0
/// * `sizing` - Percent or pixel-box request
///
/// # Returns
/// * `(width, height)` - Output dimensions, each in `1..=original`
///
/// # Examples
/// ```
/// # use imgbatch::imaging::{Sizing, resolve_dimensions};
/// // 75% of 800x600 → 600x450
/// assert_eq!(resolve_dimensions((800, 600), &Sizing::Percent(75)), (600, 450));
///
/// // Width 400 with aspect kept → 400x300
/// let box_400 = Sizing::Pixels { width: Some(400), height: None, keep_aspect_ratio: true };
/// assert_eq!(resolve_dimensions((800, 600), &box_400), (400, 300));
/// ```
pub fn resolve_dimensions(original: (u32, u32), sizing: &Sizing) -> (u32, u32) {
    let (orig_w, orig_h) = original;

    match *sizing {
        Sizing::Percent(percent) => {
            let ratio = percent.clamp(1, 100) as f64 / 100.0;
            scale(original, ratio)
        }
        Sizing::Pixels {
            width,
            height,
            keep_aspect_ratio: true,
        } => {
            let width_ratio = width.map_or(f64::INFINITY, |w| w as f64 / orig_w as f64);
            let height_ratio = height.map_or(f64::INFINITY, |h| h as f64 / orig_h as f64);
            // Capped at 1: requesting a bigger box never upscales
            let ratio = width_ratio.min(height_ratio).min(1.0);
            scale(original, ratio)
        }
        Sizing::Pixels {
            width,
            height,
            keep_aspect_ratio: false,
        } => (
            width.unwrap_or(orig_w).min(orig_w).max(1),
            height.unwrap_or(orig_h).min(orig_h).max(1),
        ),
    }
}

fn scale((w, h): (u32, u32), ratio: f64) -> (u32, u32) {
    let axis = |v: u32| ((v as f64 * ratio).round() as u32).max(1);
    (axis(w), axis(h))
}

/// Interpret free-text dimension input.
///
/// Empty, non-numeric, zero and negative values all mean "unset" rather
/// than an error. Fractional input is rounded down.
pub fn parse_dimension(input: &str) -> Option<u32> {
    let value: f64 = input.trim().parse().ok()?;
    if !value.is_finite() || value < 1.0 {
        return None;
    }
    Some(value.floor().min(u32::MAX as f64) as u32)
}
