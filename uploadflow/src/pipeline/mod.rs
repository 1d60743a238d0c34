//! Per-item pipeline: compress, then describe, then publish.
//!
//! Stages run strictly in sequence for one item and short-circuit on the
//! first failure. The pipeline never returns an error: every failure ends up
//! inside the item's [`ItemOutcome`].

mod invoke;

pub use invoke::invoke_stage;

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info_span, Instrument};

use crate::config::{BatchConfig, CompressionOptions, Credentials};
use crate::core::{CompressedImage, ImageMetadata, ItemOutcome, PublishReceipt, WorkItem};
use crate::stages::{Compressor, Describer, Publisher, StageFailure, StageKind};

/// Settings the pipeline copies out of [`BatchConfig`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Options for the compress stage.
    pub compression: CompressionOptions,
    /// Credentials for the publish stage.
    pub credentials: Credentials,
    /// Timeout applied to each stage call.
    pub stage_timeout: Option<Duration>,
    /// Largest accepted input, in bytes.
    pub max_item_bytes: usize,
}

impl From<&BatchConfig> for PipelineSettings {
    fn from(config: &BatchConfig) -> Self {
        Self {
            compression: config.compression.clone(),
            credentials: config.credentials.clone(),
            stage_timeout: config.stage_timeout(),
            max_item_bytes: config.max_item_bytes,
        }
    }
}

/// Composes the three stage collaborators into one per-item execution.
pub struct Pipeline {
    compressor: Arc<dyn Compressor>,
    describer: Arc<dyn Describer>,
    publisher: Arc<dyn Publisher>,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Creates a new pipeline.
    #[must_use]
    pub fn new(
        compressor: Arc<dyn Compressor>,
        describer: Arc<dyn Describer>,
        publisher: Arc<dyn Publisher>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            compressor,
            describer,
            publisher,
            settings,
        }
    }

    /// Returns the pipeline settings.
    #[must_use]
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Runs every stage for one item and records the outcome.
    pub async fn run(&self, index: usize, item: &WorkItem) -> ItemOutcome {
        let started_at = Utc::now();
        let span = info_span!("item", index, name = %item.name());
        let result = self.execute(item).instrument(span).await;
        ItemOutcome::new(index, item, result, started_at)
    }

    async fn execute(&self, item: &WorkItem) -> Result<PublishReceipt, StageFailure> {
        let compressed = self.compress(item).await?;
        let metadata = self.describe(&compressed, item.name()).await?;
        self.publish(&compressed, &metadata).await
    }

    async fn compress(&self, item: &WorkItem) -> Result<CompressedImage, StageFailure> {
        screen(item, self.settings.max_item_bytes)?;
        let compressed = invoke_stage(
            StageKind::Compress,
            self.settings.stage_timeout,
            self.compressor.compress(item.bytes(), &self.settings.compression),
        )
        .await?;
        debug!(
            original_bytes = item.len(),
            compressed_bytes = compressed.len(),
            format = %compressed.format(),
            "Image compressed"
        );
        Ok(compressed)
    }

    async fn describe(
        &self,
        image: &CompressedImage,
        original_name: &str,
    ) -> Result<ImageMetadata, StageFailure> {
        invoke_stage(
            StageKind::Describe,
            self.settings.stage_timeout,
            self.describer.describe(image, original_name),
        )
        .await
    }

    async fn publish(
        &self,
        image: &CompressedImage,
        metadata: &ImageMetadata,
    ) -> Result<PublishReceipt, StageFailure> {
        invoke_stage(
            StageKind::Publish,
            self.settings.stage_timeout,
            self.publisher
                .publish(image, metadata, &self.settings.credentials),
        )
        .await
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Screens an item before it reaches the compressor.
fn screen(item: &WorkItem, max_bytes: usize) -> Result<(), StageFailure> {
    if item.is_empty() {
        return Err(StageFailure::invalid_input("file is empty"));
    }
    if item.len() > max_bytes {
        return Err(StageFailure::invalid_input(format!(
            "file is {} bytes, limit is {max_bytes}",
            item.len()
        )));
    }
    if !item.has_supported_extension() {
        return Err(StageFailure::invalid_input(format!(
            "unsupported file type '.{}'",
            item.extension().unwrap_or_default()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageFormat;
    use crate::core::OutcomeStatus;
    use crate::stages::{FailureKind, MockCompressor, MockDescriber, MockPublisher};
    use mockall::predicate::eq;

    fn settings() -> PipelineSettings {
        PipelineSettings::from(&BatchConfig::default().with_max_item_bytes(64))
    }

    fn ok_compressor() -> MockCompressor {
        let mut compressor = MockCompressor::new();
        compressor
            .expect_compress()
            .returning(|raw, opts| Ok(CompressedImage::new(raw.to_vec(), opts.target_format)));
        compressor
    }

    fn ok_describer() -> MockDescriber {
        let mut describer = MockDescriber::new();
        describer
            .expect_describe()
            .returning(|_, name| Ok(ImageMetadata::new(name, "alt", "slug")));
        describer
    }

    fn ok_publisher() -> MockPublisher {
        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .returning(|_, meta, _| Ok(PublishReceipt::new("11", format!("https://cms/{}", meta.slug))));
        publisher
    }

    fn pipeline(c: MockCompressor, d: MockDescriber, p: MockPublisher) -> Pipeline {
        Pipeline::new(Arc::new(c), Arc::new(d), Arc::new(p), settings())
    }

    #[tokio::test]
    async fn test_all_stages_succeed() {
        let pipeline = pipeline(ok_compressor(), ok_describer(), ok_publisher());
        let item = WorkItem::new("pier.png", b"raw".to_vec());

        let outcome = pipeline.run(4, &item).await;

        assert_eq!(outcome.index, 4);
        assert_eq!(outcome.status(), OutcomeStatus::Succeeded);
        assert_eq!(
            outcome.receipt(),
            Some(&PublishReceipt::new("11", "https://cms/slug"))
        );
    }

    #[tokio::test]
    async fn test_compress_failure_skips_later_stages() {
        let mut compressor = MockCompressor::new();
        compressor
            .expect_compress()
            .times(1)
            .returning(|_, _| Err(anyhow::anyhow!("malformed input")));
        let mut describer = MockDescriber::new();
        describer.expect_describe().never();
        let mut publisher = MockPublisher::new();
        publisher.expect_publish().never();

        let outcome = pipeline(compressor, describer, publisher)
            .run(0, &WorkItem::new("broken.jpg", b"zz".to_vec()))
            .await;

        let failure = outcome.failure().unwrap();
        assert_eq!(failure.stage, StageKind::Compress);
        assert_eq!(failure.kind, FailureKind::Rejected);
        assert!(failure.message.contains("malformed input"));
    }

    #[tokio::test]
    async fn test_describe_failure_skips_publish() {
        let mut describer = MockDescriber::new();
        describer
            .expect_describe()
            .returning(|_, _| Err(anyhow::anyhow!("truncated response")));
        let mut publisher = MockPublisher::new();
        publisher.expect_publish().never();

        let outcome = pipeline(ok_compressor(), describer, publisher)
            .run(0, &WorkItem::new("a.png", b"raw".to_vec()))
            .await;

        assert_eq!(outcome.failed_stage(), Some(StageKind::Describe));
    }

    #[tokio::test]
    async fn test_publish_receives_compressed_bytes_and_metadata() {
        let mut compressor = MockCompressor::new();
        compressor
            .expect_compress()
            .returning(|_, _| Ok(CompressedImage::new(b"small".to_vec(), ImageFormat::Webp)));
        let mut describer = MockDescriber::new();
        describer
            .expect_describe()
            .withf(|image, name| image.bytes() == b"small" && name == "big.png")
            .returning(|_, _| Ok(ImageMetadata::new("Big", "A big picture", "big-picture")));
        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .withf(|image, meta, _| image.bytes() == b"small" && meta.slug == "big-picture")
            .times(1)
            .returning(|_, _, _| Ok(PublishReceipt::new("1", "https://cms/1")));

        let outcome = pipeline(compressor, describer, publisher)
            .run(0, &WorkItem::new("big.png", b"very large raw bytes".to_vec()))
            .await;

        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_credentials_are_forwarded() {
        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .with(mockall::predicate::always(), mockall::predicate::always(), eq(Credentials::new("ed", "pw")))
            .returning(|_, _, _| Ok(PublishReceipt::new("1", "u")));

        let config = BatchConfig::default().with_credentials(Credentials::new("ed", "pw"));
        let pipeline = Pipeline::new(
            Arc::new(ok_compressor()),
            Arc::new(ok_describer()),
            Arc::new(publisher),
            PipelineSettings::from(&config),
        );

        let outcome = pipeline.run(0, &WorkItem::new("a.png", b"x".to_vec())).await;
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_empty_item_is_stage_one_failure() {
        let mut compressor = MockCompressor::new();
        compressor.expect_compress().never();

        let outcome = pipeline(compressor, ok_describer(), ok_publisher())
            .run(0, &WorkItem::new("empty.png", Vec::new()))
            .await;

        let failure = outcome.failure().unwrap();
        assert_eq!(failure.stage, StageKind::Compress);
        assert_eq!(failure.kind, FailureKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_unsupported_extension_is_stage_one_failure() {
        let outcome = pipeline(ok_compressor(), ok_describer(), ok_publisher())
            .run(0, &WorkItem::new("notes.txt", b"hello".to_vec()))
            .await;

        let failure = outcome.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::InvalidInput);
        assert!(failure.message.contains(".txt"));
    }

    #[tokio::test]
    async fn test_oversize_item_is_stage_one_failure() {
        let outcome = pipeline(ok_compressor(), ok_describer(), ok_publisher())
            .run(0, &WorkItem::new("huge.png", vec![1u8; 65]))
            .await;

        assert_eq!(outcome.failure().map(|f| f.kind), Some(FailureKind::InvalidInput));
    }
}
