//! Writing rendered items to disk.
//!
//! Batch export walks the collection in insertion order, strictly one item at
//! a time:
//!
//! ```text
//! for each item:
//!     cancelled?      → stop, report what was written
//!     ensure_current  → render unless the published result is up to date
//!     write           → <output_dir>/<filename>
//!     sleep(pacing)   after a written file, unless last
//! ```
//!
//! A render or write failure skips the item and the batch continues. An item
//! that is in flight always finishes; cancellation only prevents the next
//! one from starting.
//!
//! Two items resolving to the same filename in one batch are disambiguated
//! as `name (2).ext`, `name (3).ext`, and so on. Files already present in the
//! output directory are overwritten.

use crate::controller::{Controller, PublishOutcome};
use crate::imaging::ImageBackend;
use crate::item::ItemId;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::time::Duration;
use thiserror::Error;

/// Default delay between two written files.
pub const DEFAULT_PACING: Duration = Duration::from_millis(120);

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Item {0} is not in the collection")]
    UnknownItem(ItemId),
    #[error("Render failed for {name}: {reason}")]
    Render { name: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub pacing: Duration,
    /// Checked before each item. Setting it stops the batch after the
    /// current item.
    pub cancel: Arc<AtomicBool>,
}

impl ExportOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            pacing: DEFAULT_PACING,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }
}

/// One file written by an export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedFile {
    /// 1-based position among written files.
    pub index: usize,
    pub source: String,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub bytes: u64,
}

/// Progress events emitted during a batch export.
#[derive(Debug, Clone)]
pub enum ExportEvent {
    Started { total: usize, output_dir: PathBuf },
    Written(ExportedFile),
    Skipped { source: String, reason: String },
    Cancelled { remaining: usize },
}

#[derive(Debug, Default, Serialize)]
pub struct ExportReport {
    pub written: Vec<ExportedFile>,
    pub skipped: Vec<String>,
    pub cancelled: bool,
}

/// `name.ext` → `name (n).ext` until unused in this batch.
fn dedupe(filename: String, used: &mut HashSet<String>) -> String {
    if used.insert(filename.clone()) {
        return filename;
    }
    let (stem, ext) = filename
        .rsplit_once('.')
        .map_or((filename.as_str(), None), |(s, e)| (s, Some(e)));
    let mut n = 2;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// Bring `id` up to date and write it under `dir`. `name` maps the
/// item's resolved filename to the one actually written.
fn write_item<B: ImageBackend>(
    controller: &mut Controller<B>,
    id: ItemId,
    dir: &Path,
    name: impl FnOnce(String) -> String,
    index: usize,
) -> Result<ExportedFile, ExportError> {
    match controller.ensure_current(id) {
        None => return Err(ExportError::UnknownItem(id)),
        Some(PublishOutcome::Failed { error, .. }) => {
            let name = controller.item(id).map(|i| i.name().to_string()).unwrap_or_default();
            return Err(ExportError::Render {
                name,
                reason: error.to_string(),
            });
        }
        Some(_) => {}
    }

    let item = controller.item(id).ok_or(ExportError::UnknownItem(id))?;
    let rendered = item.rendered().ok_or_else(|| ExportError::Render {
        name: item.name().to_string(),
        reason: "no rendered output".to_string(),
    })?;
    let path = dir.join(name(item.filename()));
    std::fs::write(&path, &rendered.preview.bytes).map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;

    tracing::info!(item = %id, path = %path.display(), bytes = rendered.preview.bytes.len(), "exported");

    Ok(ExportedFile {
        index,
        source: item.name().to_string(),
        path,
        width: rendered.width,
        height: rendered.height,
        bytes: rendered.preview.bytes.len() as u64,
    })
}

/// Export a single item to `dir` under its resolved filename.
pub fn export_one<B: ImageBackend>(
    controller: &mut Controller<B>,
    id: ItemId,
    dir: &Path,
) -> Result<ExportedFile, ExportError> {
    std::fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    write_item(controller, id, dir, |name| name, 1)
}

/// Export every item in collection order. See the [module docs](self).
///
/// Only failing to create the output directory aborts the batch.
pub fn export_all<B: ImageBackend>(
    controller: &mut Controller<B>,
    options: &ExportOptions,
    events: Option<Sender<ExportEvent>>,
) -> Result<ExportReport, ExportError> {
    let emit = |event: ExportEvent| {
        if let Some(tx) = &events {
            let _ = tx.send(event);
        }
    };

    let ids = controller.collection().ids();
    let mut report = ExportReport::default();
    if ids.is_empty() {
        return Ok(report);
    }

    std::fs::create_dir_all(&options.output_dir).map_err(|source| ExportError::Io {
        path: options.output_dir.clone(),
        source,
    })?;
    emit(ExportEvent::Started {
        total: ids.len(),
        output_dir: options.output_dir.clone(),
    });

    let mut used = HashSet::new();
    let last = ids.len() - 1;
    for (position, id) in ids.into_iter().enumerate() {
        if options.cancel.load(Ordering::Relaxed) {
            report.cancelled = true;
            emit(ExportEvent::Cancelled {
                remaining: last + 1 - position,
            });
            tracing::info!(remaining = last + 1 - position, "export cancelled");
            break;
        }

        let index = report.written.len() + 1;
        let name = |filename| dedupe(filename, &mut used);
        match write_item(controller, id, &options.output_dir, name, index) {
            Ok(file) => {
                emit(ExportEvent::Written(file.clone()));
                report.written.push(file);
                if position < last && !options.pacing.is_zero() {
                    std::thread::sleep(options.pacing);
                }
            }
            Err(e) => {
                let source = controller
                    .item(id)
                    .map_or_else(|| id.to_string(), |i| i.name().to_string());
                tracing::warn!(item = %id, error = %e, "export skipped");
                emit(ExportEvent::Skipped {
                    source: source.clone(),
                    reason: e.to_string(),
                });
                report.skipped.push(source);
            }
        }
    }

    Ok(report)
}
