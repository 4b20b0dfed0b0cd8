//! # imgbatch
//!
//! Batch image conversion: load up to 30 JPEG/PNG images, resize them,
//! optionally strip a uniform background, flatten onto a color, re-encode to
//! WebP, JPEG or PNG and export the results with safe filenames.
//!
//! # Architecture: Per-Image Pipeline
//!
//! Every image goes through the same fixed pipeline whenever its parameters
//! change:
//!
//! ```text
//! params ─► geometry ─► resample ─► background removal ─► composite ─► encode ─► filename
//!           (resolve)   (backend)   (optional BFS)        (bg color)   (backend)
//! ```
//!
//! Each step is a pure function of the item's immutable source and its
//! current parameters, so the pipeline can be unit tested step by step and
//! images can be rendered in parallel without coordination.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Pixel work: geometry, background removal, compositing, encoding backends |
//! | [`color`] | Background color grammar: names, `#rgb`, `#rrggbb`, `rgb(r, g, b)` |
//! | [`naming`] | Output filename sanitizing and fallback synthesis |
//! | [`acquire`] | Reading and decoding input files by declared media type |
//! | [`item`] | One image: immutable source, editable parameters, published result |
//! | [`collection`] | Ordered, capacity-capped set of items and admission rules |
//! | [`controller`] | Debounced re-rendering with sequence-guarded publishing |
//! | [`export`] | Sequential, paced, cancellable batch export to a directory |
//! | [`summary`] | Size totals and human-readable byte counts |
//! | [`config`] | `imgbatch.toml` loading, validation and merging |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Latest Request Wins
//!
//! Edits arrive faster than renders finish. The [`controller`] collapses
//! edits within a debounce window into one render and tags every render with
//! a per-item sequence number. A result is only published if no newer request
//! was issued after its render started, and only if the item still exists.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, resampling and encoding use the `image` crate only. There are no
//! system libraries to install. The `image` crate's WebP encoder is lossless,
//! so WebP quality is applied by quantizing color channels before encoding.
//!
//! ## Items Own Their Pixels
//!
//! Each item holds its decoded source exclusively. Nothing is shared between
//! items, so removing one or rendering several at once cannot affect the
//! others.

pub mod acquire;
pub mod collection;
pub mod color;
pub mod config;
pub mod controller;
pub mod export;
pub mod imaging;
pub mod item;
pub mod naming;
pub mod output;
pub mod summary;

#[cfg(test)]
pub(crate) mod test_helpers;
