//! Background color grammar.
//!
//! Colors are validated here, independently of any rendering engine. The
//! accepted forms are:
//!
//! ```text
//! transparent          the sentinel: no fill, keep alpha
//! #rgb                 short hex, each digit doubled
//! #rrggbb              long hex
//! rgb(r, g, b)         decimal channels 0-255
//! white, navy, ...     a fixed table of named colors
//! ```
//!
//! Matching is case-insensitive and ignores surrounding whitespace.

use image::Rgb;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColorParseError {
    #[error("Color is empty")]
    Empty,
    #[error("Invalid hex color: {0}")]
    InvalidHex(String),
    #[error("Invalid rgb() color: {0}")]
    InvalidFunction(String),
    #[error("Unknown color name: {0}")]
    UnknownName(String),
}

/// Fill drawn behind the image before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackgroundColor {
    #[default]
    Transparent,
    Solid(Rgb<u8>),
}

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("silver", [192, 192, 192]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
    ("white", [255, 255, 255]),
    ("maroon", [128, 0, 0]),
    ("red", [255, 0, 0]),
    ("purple", [128, 0, 128]),
    ("fuchsia", [255, 0, 255]),
    ("magenta", [255, 0, 255]),
    ("green", [0, 128, 0]),
    ("lime", [0, 255, 0]),
    ("olive", [128, 128, 0]),
    ("yellow", [255, 255, 0]),
    ("navy", [0, 0, 128]),
    ("blue", [0, 0, 255]),
    ("teal", [0, 128, 128]),
    ("aqua", [0, 255, 255]),
    ("cyan", [0, 255, 255]),
    ("orange", [255, 165, 0]),
    ("pink", [255, 192, 203]),
    ("brown", [165, 42, 42]),
    ("beige", [245, 245, 220]),
    ("ivory", [255, 255, 240]),
    ("whitesmoke", [245, 245, 245]),
    ("gainsboro", [220, 220, 220]),
    ("lightgray", [211, 211, 211]),
    ("lightgrey", [211, 211, 211]),
    ("darkgray", [169, 169, 169]),
    ("darkgrey", [169, 169, 169]),
];

fn parse_hex(digits: &str, original: &str) -> Result<Rgb<u8>, ColorParseError> {
    let invalid = || ColorParseError::InvalidHex(original.to_string());
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
    match digits.len() {
        3 => {
            let mut out = [0u8; 3];
            for (slot, c) in out.iter_mut().zip(digits.chars()) {
                *slot = channel(&format!("{c}{c}"))?;
            }
            Ok(Rgb(out))
        }
        6 => Ok(Rgb([
            channel(&digits[0..2])?,
            channel(&digits[2..4])?,
            channel(&digits[4..6])?,
        ])),
        _ => Err(invalid()),
    }
}

fn parse_function(args: &str, original: &str) -> Result<Rgb<u8>, ColorParseError> {
    let invalid = || ColorParseError::InvalidFunction(original.to_string());
    let channels = args
        .split(',')
        .map(|part| part.trim().parse::<u8>().map_err(|_| invalid()))
        .collect::<Result<Vec<_>, _>>()?;
    match channels[..] {
        [r, g, b] => Ok(Rgb([r, g, b])),
        _ => Err(invalid()),
    }
}

impl FromStr for BackgroundColor {
    type Err = ColorParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ColorParseError::Empty);
        }
        let lower = trimmed.to_ascii_lowercase();

        if lower == "transparent" {
            return Ok(Self::Transparent);
        }
        if let Some(digits) = lower.strip_prefix('#') {
            return parse_hex(digits, trimmed).map(Self::Solid);
        }
        if let Some(args) = lower
            .strip_prefix("rgb(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return parse_function(args, trimmed).map(Self::Solid);
        }
        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, rgb)| Self::Solid(Rgb(*rgb)))
            .ok_or_else(|| ColorParseError::UnknownName(trimmed.to_string()))
    }
}

impl fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transparent => f.write_str("transparent"),
            Self::Solid(Rgb([r, g, b])) => write!(f, "#{r:02x}{g:02x}{b:02x}"),
        }
    }
}

impl serde::Serialize for BackgroundColor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for BackgroundColor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
