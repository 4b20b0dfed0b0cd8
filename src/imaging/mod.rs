//! Image processing: pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::load_from_memory_with_format` (JPEG, PNG) |
//! | **Resize** | `image::imageops::resize` (Lanczos3) |
//! | **Background removal** | border-seeded breadth-first flood fill |
//! | **Encode** | `image` JPEG / PNG / lossless WebP encoders |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing the requested output
//! - **Background**: Border-connected background removal
//! - **Compose**: Background fill, encoding and size estimation
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod background;
pub mod backend;
mod calculations;
pub mod compose;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend};
pub use background::{estimate_reference_color, remove_background};
pub use calculations::{parse_dimension, resolve_dimensions};
pub use compose::{EncodedImage, composite, encode, estimate_encoded_size};
pub use params::{OutputFormat, Quality, SizeMode, Sizing, Tolerance};
pub use rust_backend::RustBackend;
