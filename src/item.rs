//! One loaded image and its editable parameters.
//!
//! An [`ImageItem`] owns its decoded source for its whole lifetime. The
//! source is held behind an `Arc` only so that an in-flight render job can
//! read it without copying; nothing ever mutates it.
//!
//! Derived output lives in [`ImageItem::rendered`] and is only ever replaced
//! as a whole [`RenderResult`], so dimensions, payload, size and filename
//! always belong to the same computation.

use crate::acquire::DecodedSource;
use crate::color::{BackgroundColor, ColorParseError};
use crate::imaging::{
    EncodedImage, OutputFormat, Quality, SizeMode, Sizing, Tolerance, parse_dimension,
};
use crate::naming::{FilenameRequest, SizeToken, file_base_name, resolve_filename};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stable identity of an item. Never reused within a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// User-editable parameters of an item.
///
/// Also the shape of the `[defaults]` config section. Fields of the inactive
/// size mode are kept but not consulted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ItemParams {
    pub size_mode: SizeMode,
    /// Scale in percent, 1-100. Used in [`SizeMode::Percent`].
    pub percent: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_height: Option<u32>,
    pub keep_aspect_ratio: bool,
    /// Stored for every format, applied to lossy ones only.
    pub quality: Quality,
    pub format: OutputFormat,
    pub background: BackgroundColor,
    pub remove_background: bool,
    pub tolerance: Tolerance,
    /// Free-text output name. Per item, never read from config.
    #[serde(skip)]
    pub name_hint: String,
}

impl Default for ItemParams {
    fn default() -> Self {
        Self {
            size_mode: SizeMode::Percent,
            percent: 100,
            target_width: None,
            target_height: None,
            keep_aspect_ratio: true,
            quality: Quality::default(),
            format: OutputFormat::WebP,
            background: BackgroundColor::Transparent,
            remove_background: false,
            tolerance: Tolerance::default(),
            name_hint: String::new(),
        }
    }
}

impl ItemParams {
    pub fn sizing(&self) -> Sizing {
        match self.size_mode {
            SizeMode::Percent => Sizing::Percent(self.percent.clamp(1, 100)),
            SizeMode::Pixels => Sizing::Pixels {
                width: self.target_width,
                height: self.target_height,
                keep_aspect_ratio: self.keep_aspect_ratio,
            },
        }
    }

    pub fn size_token(&self) -> SizeToken {
        match self.size_mode {
            SizeMode::Percent => SizeToken::Percent(self.percent.clamp(1, 100)),
            SizeMode::Pixels => SizeToken::Pixels {
                width: self.target_width,
                height: self.target_height,
            },
        }
    }

    pub fn set_percent(&mut self, percent: u32) {
        self.percent = percent.clamp(1, 100);
    }

    /// Set the target width; zero means unset.
    pub fn set_target_width(&mut self, width: Option<u32>) {
        self.target_width = width.filter(|&w| w > 0);
    }

    pub fn set_target_height(&mut self, height: Option<u32>) {
        self.target_height = height.filter(|&h| h > 0);
    }

    /// Set the target width from text input.
    ///
    /// Invalid input clears the axis instead of failing. Returns `false` so
    /// the caller can flag the field; an empty input is valid.
    pub fn set_target_width_input(&mut self, input: &str) -> bool {
        self.target_width = parse_dimension(input);
        self.target_width.is_some() || input.trim().is_empty()
    }

    /// Height counterpart of [`set_target_width_input`](Self::set_target_width_input).
    pub fn set_target_height_input(&mut self, input: &str) -> bool {
        self.target_height = parse_dimension(input);
        self.target_height.is_some() || input.trim().is_empty()
    }

    /// Set the background from text input.
    ///
    /// On a parse error the previous color is kept.
    pub fn set_background_input(&mut self, input: &str) -> Result<(), ColorParseError> {
        self.background = input.parse()?;
        Ok(())
    }
}

/// The published output of one render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderResult {
    pub preview: EncodedImage,
    pub width: u32,
    pub height: u32,
    pub encoded_size: u64,
    pub filename: String,
    /// Request sequence number this result was computed for.
    pub sequence: u64,
}

/// A user-loaded image.
#[derive(Debug, Clone)]
pub struct ImageItem {
    id: ItemId,
    name: String,
    original_bytes: u64,
    source: Arc<RgbaImage>,
    pub params: ItemParams,
    rendered: Option<RenderResult>,
}

impl ImageItem {
    /// Build an item from a decoded source with the given starting parameters.
    ///
    /// The name hint starts as the source file's base name.
    pub fn new(id: ItemId, source: DecodedSource, mut params: ItemParams) -> Self {
        params.name_hint = file_base_name(&source.name).to_string();
        Self {
            id,
            name: source.name,
            original_bytes: source.original_bytes,
            source: source.pixels,
            params,
            rendered: None,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Original display name, e.g. `holiday.jpg`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_name(&self) -> &str {
        file_base_name(&self.name)
    }

    pub fn original_bytes(&self) -> u64 {
        self.original_bytes
    }

    pub fn original_dimensions(&self) -> (u32, u32) {
        self.source.dimensions()
    }

    pub fn source(&self) -> &Arc<RgbaImage> {
        &self.source
    }

    pub fn rendered(&self) -> Option<&RenderResult> {
        self.rendered.as_ref()
    }

    /// Converted size, or the original size while nothing is rendered.
    pub fn converted_bytes(&self) -> u64 {
        self.rendered
            .as_ref()
            .map_or(self.original_bytes, |r| r.encoded_size)
    }

    /// Filename for the current parameters.
    pub fn filename(&self) -> String {
        resolve_filename(&FilenameRequest {
            name_hint: &self.params.name_hint,
            original_base: self.base_name(),
            format: self.params.format,
            size: self.params.size_token(),
            quality: self.params.quality,
        })
    }

    /// Replace all derived fields at once.
    pub(crate) fn publish(&mut self, result: RenderResult) {
        self.rendered = Some(result);
    }

    /// Re-derive only the filename of the current result after a rename.
    pub(crate) fn refresh_filename(&mut self) {
        let filename = self.filename();
        if let Some(rendered) = self.rendered.as_mut() {
            rendered.filename = filename;
        }
    }
}
