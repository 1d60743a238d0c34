//! Publisher for the WordPress REST media endpoint.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::http::{build_client, upstream_message};
use crate::config::{Credentials, PublisherConfig};
use crate::core::{CompressedImage, ImageMetadata, PublishReceipt};
use crate::stages::Publisher;

/// Uploads the image, then sets its title and alt text.
#[derive(Debug, Clone)]
pub struct WordPressPublisher {
    client: Client,
    config: PublisherConfig,
}

#[derive(Debug, Deserialize)]
struct MediaResponse {
    id: u64,
    #[serde(default)]
    source_url: Option<String>,
    #[serde(default)]
    link: Option<String>,
}

impl MediaResponse {
    fn into_receipt(self) -> Result<PublishReceipt> {
        let url = self
            .source_url
            .filter(|u| !u.is_empty())
            .or(self.link)
            .ok_or_else(|| anyhow!("media {} has neither source_url nor link", self.id))?;
        Ok(PublishReceipt::new(self.id.to_string(), url))
    }
}

impl WordPressPublisher {
    /// Creates a publisher for the configured site.
    pub fn new(config: PublisherConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout())?,
            config,
        })
    }

    fn authorized(builder: RequestBuilder, credentials: &Credentials) -> RequestBuilder {
        builder.basic_auth(&credentials.username, Some(&credentials.password))
    }

    async fn upload(
        &self,
        image: &CompressedImage,
        metadata: &ImageMetadata,
        credentials: &Credentials,
    ) -> Result<MediaResponse> {
        let file_name = metadata.file_name(image.format());
        let part = Part::bytes(image.bytes().to_vec())
            .file_name(file_name.clone())
            .mime_str(image.format().mime_type())
            .context("invalid image mime type")?;
        let url = self.config.media_url();

        let response = Self::authorized(self.client.post(&url), credentials)
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .with_context(|| format!("media endpoint unreachable at {url}"))?;

        let status = response.status();
        let body = response.bytes().await.context("failed to read upload response")?;
        if !status.is_success() {
            bail!(
                "upload of {file_name} returned {status}: {}",
                upstream_message(&body, "message")
            );
        }
        serde_json::from_slice(&body).context("malformed media upload response")
    }

    async fn update_metadata(
        &self,
        id: u64,
        metadata: &ImageMetadata,
        credentials: &Credentials,
    ) -> Result<()> {
        let url = self.config.media_item_url(id);
        let response = Self::authorized(self.client.post(&url), credentials)
            .json(&json!({
                "title": metadata.title,
                "alt_text": metadata.alt_text,
            }))
            .send()
            .await
            .with_context(|| format!("media endpoint unreachable at {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            bail!(
                "metadata update for media {id} returned {status}: {}",
                upstream_message(&body, "message")
            );
        }
        Ok(())
    }
}

#[async_trait]
impl Publisher for WordPressPublisher {
    async fn publish(
        &self,
        image: &CompressedImage,
        metadata: &ImageMetadata,
        credentials: &Credentials,
    ) -> Result<PublishReceipt> {
        if self.config.base_url().is_empty() {
            bail!("site URL is not configured");
        }
        if credentials.is_incomplete() {
            bail!("publish credentials are incomplete");
        }

        let media = self.upload(image, metadata, credentials).await?;
        debug!(id = media.id, slug = %metadata.slug, "Media uploaded");
        self.update_metadata(media.id, metadata, credentials).await?;
        media.into_receipt()
    }
}
