//! Success payloads produced by the three stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::ImageFormat;

/// Output of the compress stage.
#[derive(Clone, PartialEq, Eq)]
pub struct CompressedImage {
    bytes: Arc<[u8]>,
    format: ImageFormat,
    dimensions: Option<(u32, u32)>,
}

impl CompressedImage {
    /// Creates a compressed image.
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>, format: ImageFormat) -> Self {
        Self {
            bytes: bytes.into().into(),
            format,
            dimensions: None,
        }
    }

    /// Records the encoded dimensions.
    #[must_use]
    pub const fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some((width, height));
        self
    }

    /// Encoded bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Encoded size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if no bytes were produced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Encoding of the bytes.
    #[must_use]
    pub const fn format(&self) -> ImageFormat {
        self.format
    }

    /// `(width, height)` when known.
    #[must_use]
    pub const fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }
}

impl fmt::Debug for CompressedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressedImage")
            .field("len", &self.bytes.len())
            .field("format", &self.format)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

/// Output of the describe stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    /// Short title.
    pub title: String,
    /// Alternative text.
    pub alt_text: String,
    /// File-name-safe slug (lowercase letters, digits and hyphens).
    pub slug: String,
}

impl ImageMetadata {
    /// Creates image metadata.
    #[must_use]
    pub fn new(
        title: impl Into<String>,
        alt_text: impl Into<String>,
        slug: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            alt_text: alt_text.into(),
            slug: slug.into(),
        }
    }

    /// Upload file name for the given format.
    #[must_use]
    pub fn file_name(&self, format: ImageFormat) -> String {
        format!("{}.{}", self.slug, format.extension())
    }
}

/// Output of the publish stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReceipt {
    /// Identifier assigned by the remote store.
    pub remote_id: String,
    /// Address of the stored media.
    pub remote_url: String,
}

impl PublishReceipt {
    /// Creates a publish receipt.
    #[must_use]
    pub fn new(remote_id: impl Into<String>, remote_url: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            remote_url: remote_url.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compressed_image_accessors() {
        let image = CompressedImage::new(vec![1, 2, 3], ImageFormat::Png).with_dimensions(4, 2);
        assert_eq!(image.len(), 3);
        assert_eq!(image.format(), ImageFormat::Png);
        assert_eq!(image.dimensions(), Some((4, 2)));
        assert!(!image.is_empty());
    }

    #[test]
    fn test_metadata_file_name() {
        let meta = ImageMetadata::new("Harbor", "Boats at dusk", "harbor-at-dusk");
        assert_eq!(meta.file_name(ImageFormat::Webp), "harbor-at-dusk.webp");
        assert_eq!(meta.file_name(ImageFormat::Jpeg), "harbor-at-dusk.jpg");
    }
}
