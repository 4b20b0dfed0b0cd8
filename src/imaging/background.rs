//! Border-connected background removal.
//!
//! The background is whatever touches the image edge and sits close to the
//! edge's average color. Removal is a breadth-first flood fill seeded from
//! every perimeter pixel at once, so regions of the same color that are
//! enclosed by the subject (and never touch the border) stay opaque.
//!
//! Only the alpha channel is written. RGB values of cleared pixels are left
//! as they were.

use super::params::Tolerance;
use image::{Rgb, RgbaImage};

/// Reference color used when no border sample is visible.
const OPAQUE_WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Border samples per edge are spaced so that roughly 60 land on the short side.
const SAMPLES_PER_SHORT_EDGE: u32 = 60;

/// Average color of the non-transparent pixels along the four edges.
///
/// Edges are sampled at a stride of `max(1, min(w, h) / 60)`. Fully
/// transparent samples are skipped; if none remain the result is white.
pub fn estimate_reference_color(image: &RgbaImage) -> Rgb<u8> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return OPAQUE_WHITE;
    }

    let stride = (w.min(h) / SAMPLES_PER_SHORT_EDGE).max(1) as usize;
    let horizontal = (0..w).step_by(stride).flat_map(|x| [(x, 0), (x, h - 1)]);
    let vertical = (0..h).step_by(stride).flat_map(|y| [(0, y), (w - 1, y)]);

    let mut sum = [0u64; 3];
    let mut count = 0u64;
    for (x, y) in horizontal.chain(vertical) {
        let px = image.get_pixel(x, y);
        if px[3] == 0 {
            continue;
        }
        for (acc, channel) in sum.iter_mut().zip(px.0) {
            *acc += channel as u64;
        }
        count += 1;
    }

    if count == 0 {
        return OPAQUE_WHITE;
    }
    let mean = |acc: u64| ((acc as f64 / count as f64).round()) as u8;
    Rgb([mean(sum[0]), mean(sum[1]), mean(sum[2])])
}

/// Squared Euclidean distance in RGB space, alpha ignored.
#[inline]
fn distance_sq(px: &[u8], reference: Rgb<u8>) -> u32 {
    px[..3]
        .iter()
        .zip(reference.0)
        .map(|(&c, r)| {
            let d = c as i32 - r as i32;
            (d * d) as u32
        })
        .sum()
}

/// Flood-fill state over a flat RGBA buffer.
struct Fill<'a> {
    data: &'a mut [u8],
    visited: Vec<bool>,
    /// Preallocated to the pixel count; each pixel is pushed at most once.
    queue: Vec<usize>,
    reference: Rgb<u8>,
    limit: u32,
    cleared: usize,
}

impl Fill<'_> {
    /// Apply the acceptance test to pixel `idx` and enqueue it if accepted.
    fn visit(&mut self, idx: usize) {
        if self.visited[idx] {
            return;
        }
        let px = &mut self.data[idx * 4..idx * 4 + 4];
        if px[3] == 0 {
            // Already transparent: a wall, not a conduit
            self.visited[idx] = true;
            return;
        }
        if distance_sq(px, self.reference) <= self.limit {
            self.visited[idx] = true;
            px[3] = 0;
            self.cleared += 1;
            self.queue.push(idx);
        }
    }
}

/// Make every border-connected pixel within `tolerance` of the border color
/// transparent.
///
/// Returns the number of pixels whose alpha was set to 0. Pixels that were
/// already transparent are not counted and do not propagate the fill.
pub fn remove_background(image: &mut RgbaImage, tolerance: Tolerance) -> usize {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return 0;
    }
    let reference = estimate_reference_color(image);
    let (w, h) = (w as usize, h as usize);
    let pixel_count = w * h;

    let mut fill = Fill {
        data: &mut **image,
        visited: vec![false; pixel_count],
        queue: Vec::with_capacity(pixel_count),
        reference,
        limit: Tolerance::new(tolerance.value()).squared(),
        cleared: 0,
    };

    // Seed from the full perimeter
    for x in 0..w {
        fill.visit(x);
        fill.visit((h - 1) * w + x);
    }
    for y in 1..h.saturating_sub(1) {
        fill.visit(y * w);
        fill.visit(y * w + w - 1);
    }

    let mut head = 0;
    while head < fill.queue.len() {
        let idx = fill.queue[head];
        head += 1;
        let (x, y) = (idx % w, idx / w);
        if x > 0 {
            fill.visit(idx - 1);
        }
        if x + 1 < w {
            fill.visit(idx + 1);
        }
        if y > 0 {
            fill.visit(idx - w);
        }
        if y + 1 < h {
            fill.visit(idx + w);
        }
    }

    tracing::debug!(
        width = w,
        height = h,
        cleared = fill.cleared,
        reference = ?reference.0,
        tolerance = tolerance.value(),
        "background removed"
    );
    fill.cleared
}
