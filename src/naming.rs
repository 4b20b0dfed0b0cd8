//! Output filename resolution.
//!
//! Users type a free-form name hint for each image. This module turns that
//! hint into a filename that is safe on common filesystems and carries
//! exactly one extension, the one of the selected output format.
//!
//! ## Resolution order
//!
//! 1. The user hint, with any known output extension stripped, sanitized.
//! 2. A synthesized fallback: `{base}_{size}_{quality}qual`, e.g.
//!    `holiday_75pct_80qual` or `holiday_640xautopx_80qual`.
//! 3. The fixed name [`FALLBACK_NAME`].
//!
//! The first non-empty candidate wins and gets the format extension appended.

use crate::imaging::{OutputFormat, Quality};
use std::fmt;

/// Used when neither the hint nor the synthesized fallback survive sanitizing.
pub const FALLBACK_NAME: &str = "image-converted";

/// Extensions recognized (and replaced) at the end of a name hint.
const KNOWN_EXTENSIONS: &[&str] = &["webp", "jpg", "jpeg", "png"];

/// Characters rejected by at least one common filesystem.
fn is_illegal(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*') || ('\0'..='\x1f').contains(&c)
}

/// Strip illegal characters, collapse whitespace runs, trim, drop trailing dots.
pub fn sanitize_filename_base(value: &str) -> String {
    let kept: String = value.chars().filter(|&c| !is_illegal(c)).collect();
    let collapsed = kept.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_end_matches('.').to_string()
}

/// Remove trailing known output extensions, case-insensitively.
///
/// Extensions are checked in a fixed order, so `a.png.webp` loses both.
pub fn strip_known_extension(value: &str) -> &str {
    KNOWN_EXTENSIONS.iter().fold(value, |acc, ext| {
        let cut = acc.len().saturating_sub(ext.len() + 1);
        match acc.get(cut..) {
            Some(tail) if tail.len() == ext.len() + 1 && tail.starts_with('.') => {
                if tail[1..].eq_ignore_ascii_case(ext) {
                    &acc[..cut]
                } else {
                    acc
                }
            }
            _ => acc,
        }
    })
}

/// File name without its last extension: `a.b.jpg` → `a.b`.
///
/// A trailing dot with nothing after it is not an extension.
pub fn file_base_name(name: &str) -> &str {
    match name.rfind('.') {
        Some(pos) if pos + 1 < name.len() => &name[..pos],
        _ => name,
    }
}

/// Size component of a synthesized filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeToken {
    /// Renders as `{percent}pct`.
    Percent(u32),
    /// Renders as `{w}x{h}px`, with `auto` for unset axes.
    Pixels {
        width: Option<u32>,
        height: Option<u32>,
    },
}

impl fmt::Display for SizeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(p) => write!(f, "{p}pct"),
            Self::Pixels { width, height } => {
                let axis = |v: &Option<u32>| v.map_or_else(|| "auto".to_string(), |n| n.to_string());
                write!(f, "{}x{}px", axis(width), axis(height))
            }
        }
    }
}

/// Everything the resolver needs, borrowed from an item.
#[derive(Debug, Clone, Copy)]
pub struct FilenameRequest<'a> {
    pub name_hint: &'a str,
    /// Original file name without extension.
    pub original_base: &'a str,
    pub format: OutputFormat,
    pub size: SizeToken,
    pub quality: Quality,
}

fn clean_candidate(raw: &str) -> String {
    let first = sanitize_filename_base(strip_known_extension(raw.trim()));
    // Sanitizing can expose an extension that was hidden behind dots or spaces
    sanitize_filename_base(strip_known_extension(&first))
}

/// Resolve the final, extension-correct output filename.
pub fn resolve_filename(request: &FilenameRequest<'_>) -> String {
    let synthesized = format!(
        "{}_{}_{}qual",
        request.original_base,
        request.size,
        request.quality.value()
    );

    let base = [request.name_hint, synthesized.as_str()]
        .into_iter()
        .map(clean_candidate)
        .find(|candidate| !candidate.is_empty())
        .unwrap_or_else(|| FALLBACK_NAME.to_string());

    format!("{}.{}", base, request.format.extension())
}
