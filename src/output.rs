//! CLI output formatting for loading, rendering and export.
//!
//! # Information-First Display
//!
//! Every image leads with its positional index and original name. What was
//! produced from it (output filename, dimensions, size) follows as indented
//! context lines, so the output reads as an inventory of the batch.
//!
//! # Output Format
//!
//! ## Load
//!
//! ```text
//! Images
//! 001 holiday.jpg (4032x3024, 3.1 MB)
//!     Output: holiday.webp 3024x2268, 412 KB
//! 002 scan.png (1200x800, 940 KB)
//!     Output: scan.webp 900x600, 88 KB
//!
//! Skipped
//!     anim.gif: unsupported type
//!     extra.png: over capacity
//! Only the first 30 images were added.
//! ```
//!
//! ## Export
//!
//! ```text
//! Exporting 2 images → out/
//!     001 holiday.webp (3024x2268, 412 KB)
//!     002 scan.webp (900x600, 88 KB)
//!
//! Total: 4.0 MB → 500 KB (+88 %)
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::collection::{Admission, AdmissionNotice, Collection};
use crate::export::{ExportEvent, ExportReport};
use crate::item::ImageItem;
use crate::summary::{Summary, format_bytes};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Header and context lines for one item.
///
/// ```text
/// 001 holiday.jpg (4032x3024, 3.1 MB)
///     Output: holiday.webp 3024x2268, 412 KB
/// ```
fn item_lines(index: usize, item: &ImageItem) -> Vec<String> {
    let (w, h) = item.original_dimensions();
    let mut lines = vec![format!(
        "{} {} ({}x{}, {})",
        format_index(index),
        item.name(),
        w,
        h,
        format_bytes(item.original_bytes())
    )];
    match item.rendered() {
        Some(r) => lines.push(format!(
            "{}Output: {} {}x{}, {}",
            indent(1),
            r.filename,
            r.width,
            r.height,
            format_bytes(r.encoded_size)
        )),
        None => lines.push(format!("{}Output: not rendered", indent(1))),
    }
    lines
}

fn notice_line(notice: AdmissionNotice) -> String {
    match notice {
        AdmissionNotice::CapacityReached { capacity } => {
            format!("Limit of {} images reached, nothing was added.", capacity)
        }
        AdmissionNotice::PartiallyAdmitted { capacity } => {
            format!("Only the first {} images were added.", capacity)
        }
    }
}

// ============================================================================
// Load output
// ============================================================================

/// Format the collection after an admission, followed by anything rejected.
pub fn format_admission(admission: &Admission, collection: &Collection) -> Vec<String> {
    let mut lines = Vec::new();

    if !collection.is_empty() {
        lines.push("Images".to_string());
        for (pos, item) in collection.iter().enumerate() {
            lines.extend(item_lines(pos + 1, item));
        }
    }

    let rejected = admission.unsupported.len() + admission.dropped.len() + admission.failed.len();
    if rejected > 0 {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.push("Skipped".to_string());
        for name in &admission.unsupported {
            lines.push(format!("{}{}: unsupported type", indent(1), name));
        }
        for name in &admission.dropped {
            lines.push(format!("{}{}: over capacity", indent(1), name));
        }
        for error in &admission.failed {
            lines.push(format!("{}{}", indent(1), error));
        }
    }

    if let Some(notice) = admission.notice {
        lines.push(notice_line(notice));
    }
    lines
}

pub fn print_admission(admission: &Admission, collection: &Collection) {
    for line in format_admission(admission, collection) {
        println!("{}", line);
    }
}

// ============================================================================
// Export output
// ============================================================================

/// Format a single export progress event as display lines.
pub fn format_export_event(event: &ExportEvent) -> Vec<String> {
    match event {
        ExportEvent::Started { total, output_dir } => {
            let noun = if *total == 1 { "image" } else { "images" };
            vec![format!(
                "Exporting {} {} → {}",
                total,
                noun,
                output_dir.display()
            )]
        }
        ExportEvent::Written(file) => vec![format!(
            "{}{} {} ({}x{}, {})",
            indent(1),
            format_index(file.index),
            file_name(&file.path),
            file.width,
            file.height,
            format_bytes(file.bytes)
        )],
        ExportEvent::Skipped { source, reason } => {
            vec![format!("{}skipped {}: {}", indent(1), source, reason)]
        }
        ExportEvent::Cancelled { remaining } => {
            vec![format!("Cancelled, {} not exported", remaining)]
        }
    }
}

/// Closing lines of an export: counts and the size summary.
pub fn format_export_report(report: &ExportReport, summary: &Summary) -> Vec<String> {
    let mut lines = vec![String::new()];
    if !report.skipped.is_empty() {
        lines.push(format!(
            "Exported {}, skipped {}",
            report.written.len(),
            report.skipped.len()
        ));
    }
    lines.extend(format_summary(summary));
    lines
}

pub fn print_export_report(report: &ExportReport, summary: &Summary) {
    for line in format_export_report(report, summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Summary
// ============================================================================

pub fn format_summary(summary: &Summary) -> Vec<String> {
    if summary.items == 0 {
        return vec!["Total: 0 B".to_string()];
    }
    vec![format!("Total: {}", summary)]
}
