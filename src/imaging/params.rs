//! Parameter types for image operations.
//!
//! These types describe *what* to produce, not *how*. They are shared by the
//! geometry calculations, the compositor and the [`backend`](super::backend),
//! and double as the serialized form of the `[defaults]` config section.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 80). Clamped on construction.
//! - [`Tolerance`]: Background removal color distance (10–160, default 40). Clamped.
//! - [`OutputFormat`]: Target encoding: WebP, JPEG or PNG.
//! - [`SizeMode`] / [`Sizing`]: How the output dimensions are chosen.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Encoder-facing quality factor in `[0.01, 1.0]`.
    pub fn factor(self) -> f32 {
        (self.0 as f32 / 100.0).clamp(0.01, 1.0)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Quality> for u32 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

/// Maximum RGB distance for a border-connected pixel to count as background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Tolerance(u32);

impl Tolerance {
    pub const MIN: u32 = 10;
    pub const MAX: u32 = 160;

    pub fn new(value: u32) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Squared distance threshold, compared against squared RGB distances.
    pub fn squared(self) -> u32 {
        self.0 * self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self(40)
    }
}

impl From<u32> for Tolerance {
    fn from(value: u32) -> Self {
        Self::new(value)
    }
}

impl From<Tolerance> for u32 {
    fn from(tolerance: Tolerance) -> Self {
        tolerance.0
    }
}

/// Output encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    #[serde(rename = "webp")]
    WebP,
    #[serde(rename = "jpg", alias = "jpeg")]
    Jpeg,
    #[serde(rename = "png")]
    Png,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 3] = [OutputFormat::WebP, OutputFormat::Jpeg, OutputFormat::Png];

    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::WebP => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::WebP => "WebP",
            Self::Jpeg => "JPG",
            Self::Png => "PNG",
        }
    }

    /// Whether the quality setting has any effect on the encoded output.
    pub fn uses_quality(self) -> bool {
        !matches!(self, Self::Png)
    }

    /// JPEG has no alpha channel; transparent regions are flattened.
    pub fn supports_alpha(self) -> bool {
        !matches!(self, Self::Jpeg)
    }

    /// Parse a format name, falling back to WebP for anything unknown.
    pub fn resolve(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(Self::WebP),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(format!("unknown output format: {other} (expected webp, jpg or png)")),
        }
    }
}

/// Which sizing controls are active for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeMode {
    #[default]
    Percent,
    Pixels,
}

/// Resolved sizing request handed to the geometry calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sizing {
    /// Scale both axes by `percent / 100`.
    Percent(u32),
    /// Fit into the requested box. Unset axes impose no constraint.
    Pixels {
        width: Option<u32>,
        height: Option<u32>,
        keep_aspect_ratio: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_80() {
        assert_eq!(Quality::default().value(), 80);
    }

    #[test]
    fn quality_factor_maps_to_unit_range() {
        assert_eq!(Quality::new(1).factor(), 0.01);
        assert_eq!(Quality::new(100).factor(), 1.0);
        assert!((Quality::new(75).factor() - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn tolerance_clamps_to_valid_range() {
        assert_eq!(Tolerance::new(0).value(), 10);
        assert_eq!(Tolerance::new(90).value(), 90);
        assert_eq!(Tolerance::new(500).value(), 160);
        assert_eq!(Tolerance::new(12).squared(), 144);
    }

    #[test]
    fn format_parses_aliases() {
        assert_eq!("webp".parse::<OutputFormat>().unwrap(), OutputFormat::WebP);
        assert_eq!("JPEG".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!(" jpg ".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("png".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert!("gif".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn unknown_format_resolves_to_webp() {
        assert_eq!(OutputFormat::resolve("tiff"), OutputFormat::WebP);
        assert_eq!(OutputFormat::resolve("png"), OutputFormat::Png);
    }

    #[test]
    fn only_png_ignores_quality() {
        assert!(OutputFormat::WebP.uses_quality());
        assert!(OutputFormat::Jpeg.uses_quality());
        assert!(!OutputFormat::Png.uses_quality());
    }

    #[test]
    fn format_metadata() {
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert_eq!(OutputFormat::Jpeg.mime_type(), "image/jpeg");
        assert_eq!(OutputFormat::WebP.label(), "WebP");
        assert!(!OutputFormat::Jpeg.supports_alpha());
    }
}
