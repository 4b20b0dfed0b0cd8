//! File acquisition: turning an input file into a decoded RGBA buffer.
//!
//! Inputs are accepted by *declared* media type, which for files on disk is
//! derived from the extension. Content is never sniffed: a PNG renamed to
//! `.jpg` is handed to the JPEG decoder and rejected.

use crate::imaging::{BackendError, ImageBackend};
use crate::naming::file_base_name;
use image::{ImageFormat, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// MIME types admitted into a collection.
pub const ACCEPTED_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Unsupported media type for {name}: {declared}")]
    UnsupportedType { name: String, declared: String },
    #[error("Could not decode {name}: {source}")]
    Corrupt { name: String, source: BackendError },
    #[error("Image {name} has no pixels")]
    Empty { name: String },
}

/// Input media types the pipeline can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Jpeg,
    Png,
}

impl MediaType {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    /// Declared MIME type for a file name, by extension.
    pub fn mime_for_name(name: &str) -> &'static str {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "webp" => "image/webp",
            "gif" => "image/gif",
            "" => "",
            _ => "application/octet-stream",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
        }
    }
}

/// A raw input file as handed over by the caller.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Display name including extension, e.g. `holiday.jpg`.
    pub name: String,
    /// Declared MIME type.
    pub declared_type: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            bytes,
        }
    }

    /// Read a file from disk, declaring its type from the extension.
    pub fn read(path: &Path) -> Result<Self, DecodeError> {
        let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let declared_type = MediaType::mime_for_name(&name);
        Ok(Self::new(name, declared_type, bytes))
    }

    pub fn media_type(&self) -> Option<MediaType> {
        MediaType::from_mime(&self.declared_type)
    }

    pub fn is_accepted(&self) -> bool {
        self.media_type().is_some()
    }

    /// File name without its last extension.
    pub fn base_name(&self) -> &str {
        file_base_name(&self.name)
    }
}

/// A successfully decoded input, ready to become an item.
#[derive(Debug, Clone)]
pub struct DecodedSource {
    pub name: String,
    pub original_bytes: u64,
    pub pixels: Arc<RgbaImage>,
}

impl DecodedSource {
    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Decode a source file with the backend.
pub fn decode(backend: &impl ImageBackend, file: &SourceFile) -> Result<DecodedSource, DecodeError> {
    let media_type = file
        .media_type()
        .ok_or_else(|| DecodeError::UnsupportedType {
            name: file.name.clone(),
            declared: file.declared_type.clone(),
        })?;

    let pixels = backend
        .decode(&file.bytes, media_type)
        .map_err(|source| DecodeError::Corrupt {
            name: file.name.clone(),
            source,
        })?;

    if pixels.width() == 0 || pixels.height() == 0 {
        return Err(DecodeError::Empty {
            name: file.name.clone(),
        });
    }

    tracing::debug!(
        name = %file.name,
        width = pixels.width(),
        height = pixels.height(),
        bytes = file.bytes.len(),
        "decoded source"
    );

    Ok(DecodedSource {
        name: file.name.clone(),
        original_bytes: file.bytes.len() as u64,
        pixels: Arc::new(pixels),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustBackend;
    use crate::imaging::backend::tests::MockBackend;
    use crate::test_helpers::{encode_png_bytes, gradient_image};

    #[test]
    fn mime_from_extension() {
        assert_eq!(MediaType::mime_for_name("a.JPG"), "image/jpeg");
        assert_eq!(MediaType::mime_for_name("a.jpeg"), "image/jpeg");
        assert_eq!(MediaType::mime_for_name("a.png"), "image/png");
        assert_eq!(MediaType::mime_for_name("a.webp"), "image/webp");
        assert_eq!(MediaType::mime_for_name("README"), "");
    }

    #[test]
    fn accepted_types_map_to_media_types() {
        for mime in ACCEPTED_TYPES {
            assert!(MediaType::from_mime(mime).is_some(), "{mime}");
        }
        assert_eq!(MediaType::from_mime("image/webp"), None);
        assert_eq!(MediaType::from_mime("image/gif"), None);
    }

    #[test]
    fn read_declares_type_from_extension() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("shot.png");
        std::fs::write(&path, encode_png_bytes(&gradient_image(5, 5))).unwrap();

        let file = SourceFile::read(&path).unwrap();
        assert_eq!(file.name, "shot.png");
        assert_eq!(file.declared_type, "image/png");
        assert_eq!(file.base_name(), "shot");
        assert!(file.is_accepted());
    }

    #[test]
    fn read_missing_file_is_io_error() {
        let result = SourceFile::read(Path::new("/nonexistent/photo.jpg"));
        assert!(matches!(result, Err(DecodeError::Io { .. })));
    }

    #[test]
    fn decode_real_png() {
        let file = SourceFile::new("a.png", "image/png", encode_png_bytes(&gradient_image(7, 3)));
        let decoded = decode(&RustBackend::new(), &file).unwrap();
        assert_eq!(decoded.dimensions(), (7, 3));
        assert_eq!(decoded.original_bytes, file.bytes.len() as u64);
    }

    #[test]
    fn decode_rejects_unsupported_type_without_touching_backend() {
        let backend = MockBackend::new();
        let file = SourceFile::new("a.gif", "image/gif", vec![4, 4]);
        let result = decode(&backend, &file);
        assert!(matches!(result, Err(DecodeError::UnsupportedType { .. })));
        assert!(backend.get_operations().is_empty());
    }

    #[test]
    fn decode_corrupt_bytes() {
        let file = SourceFile::new("broken.jpg", "image/jpeg", b"nope".to_vec());
        let result = decode(&RustBackend::new(), &file);
        assert!(matches!(result, Err(DecodeError::Corrupt { .. })));
    }
}
