//! Image input handed to every analysis backend
//!
//! The declared filename is classification signal text only; nothing in the
//! analysis path uses it to touch the filesystem.

use crate::error::{Result, SoilError};
use std::path::Path;
use std::sync::Arc;

/// Raster formats recognised by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
    Tiff,
    Bmp,
}

impl ImageFormat {
    /// Detect format from a file name's extension
    pub fn from_name(name: &str) -> Option<ImageFormat> {
        let ext = Path::new(name).extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "png" => Some(ImageFormat::Png),
            "gif" => Some(ImageFormat::Gif),
            "webp" => Some(ImageFormat::WebP),
            "tiff" | "tif" => Some(ImageFormat::Tiff),
            "bmp" => Some(ImageFormat::Bmp),
            _ => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Gif => "image/gif",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Bmp => "image/bmp",
        }
    }
}

/// One image submitted for analysis
///
/// Bytes are reference counted so the remote and heuristic backends can share
/// one buffer without copying.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub file_name: String,
    pub mime_type: String,
    pub data: Arc<[u8]>,
}

impl ImageInput {
    /// Wrap in-memory bytes; unknown extensions are sent as JPEG
    pub fn from_bytes(file_name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        let file_name = file_name.into();
        let mime_type = ImageFormat::from_name(&file_name)
            .unwrap_or(ImageFormat::Jpeg)
            .mime_type()
            .to_string();
        Self {
            file_name,
            mime_type,
            data: data.into(),
        }
    }

    /// Read an image file; `declared_name` overrides the on-disk file name
    pub async fn from_path(path: &Path, declared_name: Option<String>) -> Result<Self> {
        let data = tokio::fs::read(path).await.map_err(|e| SoilError::Io {
            source: e,
            context: format!("Failed to read image file: {}", path.display()),
        })?;

        if data.is_empty() {
            return Err(SoilError::ImageDecode {
                message: format!("Image file is empty: {}", path.display()),
                source: None,
            });
        }

        let file_name = declared_name.unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

        Ok(Self::from_bytes(file_name, data))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
