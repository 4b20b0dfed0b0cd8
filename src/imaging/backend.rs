//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three pixel operations the pipeline
//! depends on: decode, resize and encode. Everything else (geometry,
//! background removal, compositing, naming) is backend-independent.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust, built on
//! the `image` crate.

use super::params::{OutputFormat, Quality};
use crate::acquire::MediaType;
use image::RgbaImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Trait for image processing backends.
///
/// Backends are shared across rayon workers when several items render at
/// once, hence the `Sync` bound.
pub trait ImageBackend: Sync {
    /// Decode file bytes of a declared media type into an RGBA buffer.
    fn decode(&self, bytes: &[u8], media_type: MediaType) -> Result<RgbaImage, BackendError>;

    /// Resample to exactly `width` x `height`.
    fn resize(&self, image: &RgbaImage, width: u32, height: u32)
    -> Result<RgbaImage, BackendError>;

    /// Encode to the output format. `quality` is meaningful for lossy formats only.
    fn encode(
        &self,
        image: &RgbaImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}
