//! Size totals across the collection.
//!
//! Items that have not rendered yet count their original size on both sides,
//! so a half-finished batch never reports a phantom saving.

use crate::collection::Collection;
use serde::Serialize;
use std::fmt;

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Human-readable byte count in powers of 1024.
///
/// Values under 10 of a unit above bytes keep one decimal: `1.5 KB`, `12 KB`.
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut exponent = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && exponent < UNITS.len() - 1 {
        value /= 1024.0;
        exponent += 1;
    }
    if exponent == 0 || value >= 10.0 {
        format!("{value:.0} {}", UNITS[exponent])
    } else {
        format!("{value:.1} {}", UNITS[exponent])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Summary {
    pub items: usize,
    pub original_bytes: u64,
    pub converted_bytes: u64,
}

impl Summary {
    pub fn of(collection: &Collection) -> Self {
        collection.iter().fold(Self::default(), |acc, item| Self {
            items: acc.items + 1,
            original_bytes: acc.original_bytes + item.original_bytes(),
            converted_bytes: acc.converted_bytes + item.converted_bytes(),
        })
    }

    /// Percentage saved relative to the original total. Negative when the
    /// converted output is larger.
    pub fn gain_percent(&self) -> f64 {
        if self.original_bytes == 0 {
            return 0.0;
        }
        let original = self.original_bytes as f64;
        (original - self.converted_bytes as f64) / original * 100.0
    }

    /// Signed gain for display: `+42 %`, `-3.5 %`, `0 %`.
    pub fn gain_label(&self) -> String {
        let gain = self.gain_percent();
        let magnitude = gain.abs();
        if magnitude < 0.05 {
            return "0 %".to_string();
        }
        let sign = if gain > 0.0 { '+' } else { '-' };
        if magnitude >= 10.0 {
            format!("{sign}{magnitude:.0} %")
        } else {
            format!("{sign}{magnitude:.1} %")
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {} ({})",
            format_bytes(self.original_bytes),
            format_bytes(self.converted_bytes),
            self.gain_label()
        )
    }
}
