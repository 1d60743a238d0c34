//! The three pipeline stages and the collaborators that implement them.
//!
//! Stages form a closed set ([`StageKind`]). Each one is backed by an
//! injected collaborator trait; implementations report failure through
//! `anyhow::Result` and the pipeline turns those errors into
//! [`StageFailure`] values.

mod result;

pub use result::{FailureKind, StageFailure};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{CompressionOptions, Credentials};
use crate::core::{CompressedImage, ImageMetadata, PublishReceipt};

/// One ordered step of the per-item pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Resize and re-encode the raw image.
    Compress,
    /// Generate title, alt text and slug.
    Describe,
    /// Store the image and metadata remotely.
    Publish,
}

impl StageKind {
    /// All stages in execution order.
    pub const ALL: [Self; 3] = [Self::Compress, Self::Describe, Self::Publish];

    /// 1-based position in the pipeline.
    #[must_use]
    pub const fn ordinal(self) -> usize {
        match self {
            Self::Compress => 1,
            Self::Describe => 2,
            Self::Publish => 3,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compress => write!(f, "compress"),
            Self::Describe => write!(f, "describe"),
            Self::Publish => write!(f, "publish"),
        }
    }
}

/// Stage 1: resize and re-encode raw bytes.
///
/// Must return bytes that fit inside the bounding box in `options`, or fail
/// for corrupt and unsupported input.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Compresses one image.
    async fn compress(
        &self,
        raw: &[u8],
        options: &CompressionOptions,
    ) -> anyhow::Result<CompressedImage>;
}

/// Stage 2: produce descriptive metadata for a compressed image.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Describer: Send + Sync {
    /// Describes one image. `original_name` is a hint for the title.
    async fn describe(
        &self,
        image: &CompressedImage,
        original_name: &str,
    ) -> anyhow::Result<ImageMetadata>;
}

/// Stage 3: store the image and its metadata remotely.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes one image.
    async fn publish(
        &self,
        image: &CompressedImage,
        metadata: &ImageMetadata,
        credentials: &Credentials,
    ) -> anyhow::Result<PublishReceipt>;
}
