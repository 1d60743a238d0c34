//! Work items submitted to a batch.

use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::errors::Result;

/// Extensions accepted when a name carries one.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp", "tiff"];

/// One source image plus its display name.
///
/// Cloning is cheap: the byte buffer is shared.
#[derive(Clone)]
pub struct WorkItem {
    name: String,
    bytes: Arc<[u8]>,
    fingerprint: String,
}

impl WorkItem {
    /// Creates a work item from in-memory bytes.
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes: Arc<[u8]> = bytes.into().into();
        let fingerprint = hex::encode(Sha256::digest(&bytes));
        Self {
            name: name.into(),
            bytes,
            fingerprint,
        }
    }

    /// Reads a work item from disk, named after the file.
    ///
    /// Read failures surface as [`UploadflowError::Io`](crate::errors::UploadflowError::Io).
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self::new(name, bytes))
    }

    /// Display name, usually the original file name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw image bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the item has no content.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hex sha256 of the content.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Lowercased extension of the name, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    /// Name without its extension.
    #[must_use]
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }

    /// Returns false only when the name carries an extension outside
    /// [`SUPPORTED_EXTENSIONS`]. Names without an extension are left to the
    /// decoder.
    #[must_use]
    pub fn has_supported_extension(&self) -> bool {
        self.extension()
            .map_or(true, |ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}
