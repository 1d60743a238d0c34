//! Scripted in-memory collaborators.
//!
//! Each stub optionally sleeps for a random delay and reports into an
//! [`InFlightProbe`], so tests can vary completion order and observe
//! concurrency without any network access.

use anyhow::bail;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::probe::InFlightProbe;
use crate::config::{CompressionOptions, Credentials};
use crate::core::{CompressedImage, ImageMetadata, PublishReceipt};
use crate::stages::{Compressor, Describer, Publisher};
use crate::utils::slugify;

/// Leading bytes that make [`StubCompressor`] reject its input.
pub const MALFORMED_MARKER: &[u8] = b"MALFORMED";

/// Random sleep range in milliseconds (inclusive).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelayRange {
    /// Shortest delay.
    pub min_ms: u64,
    /// Longest delay.
    pub max_ms: u64,
}

impl DelayRange {
    /// Creates a delay range.
    #[must_use]
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    /// No delay at all.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0, 0)
    }

    fn pick(self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
    }

    async fn sleep(self) {
        let delay = self.pick();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Passes bytes through unchanged unless they start with [`MALFORMED_MARKER`].
#[derive(Debug, Clone, Default)]
pub struct StubCompressor {
    delay: DelayRange,
    probe: Option<InFlightProbe>,
}

impl StubCompressor {
    /// Creates a compressor with no delay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleeps for a random delay in `range` on every call.
    #[must_use]
    pub const fn with_delay(mut self, range: DelayRange) -> Self {
        self.delay = range;
        self
    }

    /// Reports every call into `probe`.
    #[must_use]
    pub fn with_probe(mut self, probe: InFlightProbe) -> Self {
        self.probe = Some(probe);
        self
    }
}

#[async_trait]
impl Compressor for StubCompressor {
    async fn compress(
        &self,
        raw: &[u8],
        options: &CompressionOptions,
    ) -> anyhow::Result<CompressedImage> {
        let _guard = self.probe.as_ref().map(InFlightProbe::enter);
        self.delay.sleep().await;
        if raw.starts_with(MALFORMED_MARKER) {
            bail!("malformed image data");
        }
        Ok(CompressedImage::new(raw.to_vec(), options.target_format))
    }
}

/// Titles images after their file stem; fails for chosen names.
#[derive(Debug, Clone, Default)]
pub struct StubDescriber {
    failing: HashSet<String>,
    delay: DelayRange,
    probe: Option<InFlightProbe>,
}

impl StubDescriber {
    /// Creates a describer that succeeds for every name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails whenever the original file name equals `name`.
    #[must_use]
    pub fn failing_for(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    /// Sleeps for a random delay in `range` on every call.
    #[must_use]
    pub fn with_delay(mut self, range: DelayRange) -> Self {
        self.delay = range;
        self
    }

    /// Reports every call into `probe`.
    #[must_use]
    pub fn with_probe(mut self, probe: InFlightProbe) -> Self {
        self.probe = Some(probe);
        self
    }
}

#[async_trait]
impl Describer for StubDescriber {
    async fn describe(
        &self,
        _image: &CompressedImage,
        original_name: &str,
    ) -> anyhow::Result<ImageMetadata> {
        let _guard = self.probe.as_ref().map(InFlightProbe::enter);
        self.delay.sleep().await;
        if self.failing.contains(original_name) {
            bail!("description service rejected '{original_name}'");
        }
        let stem = original_name
            .rsplit_once('.')
            .map_or(original_name, |(stem, _)| stem);
        Ok(ImageMetadata::new(
            stem,
            format!("Stub description of {original_name}"),
            slugify(stem),
        ))
    }
}

/// Records every published slug and hands out sequential ids.
#[derive(Debug, Default)]
pub struct StubPublisher {
    failing: HashSet<String>,
    delay: DelayRange,
    probe: Option<InFlightProbe>,
    next_id: AtomicU64,
    published: Mutex<Vec<String>>,
}

impl StubPublisher {
    /// Creates a publisher that accepts every image.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails whenever the metadata slug equals `slug`.
    #[must_use]
    pub fn failing_for(mut self, slug: impl Into<String>) -> Self {
        self.failing.insert(slug.into());
        self
    }

    /// Sleeps for a random delay in `range` on every call.
    #[must_use]
    pub const fn with_delay(mut self, range: DelayRange) -> Self {
        self.delay = range;
        self
    }

    /// Reports every call into `probe`.
    #[must_use]
    pub fn with_probe(mut self, probe: InFlightProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Slugs published so far, in completion order.
    #[must_use]
    pub fn published(&self) -> Vec<String> {
        self.published.lock().clone()
    }
}

#[async_trait]
impl Publisher for StubPublisher {
    async fn publish(
        &self,
        image: &CompressedImage,
        metadata: &ImageMetadata,
        _credentials: &Credentials,
    ) -> anyhow::Result<PublishReceipt> {
        let _guard = self.probe.as_ref().map(InFlightProbe::enter);
        self.delay.sleep().await;
        if self.failing.contains(&metadata.slug) {
            bail!("media library refused '{}'", metadata.slug);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.published.lock().push(metadata.slug.clone());
        Ok(PublishReceipt::new(
            id.to_string(),
            format!(
                "https://media.example.test/{}",
                metadata.file_name(image.format())
            ),
        ))
    }
}
