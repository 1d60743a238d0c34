//! Compressor that delegates to an HTTP image-processing service.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::debug;

use super::http::{build_client, upstream_message};
use crate::config::{CompressionOptions, ImageFormat, ProcessorServiceConfig};
use crate::core::CompressedImage;
use crate::stages::Compressor;

/// Posts images to a `/process-image` endpoint and returns its WebP output.
///
/// When compression is disabled the bytes never leave the process.
#[derive(Debug, Clone)]
pub struct RemoteCompressor {
    client: Client,
    config: ProcessorServiceConfig,
}

impl RemoteCompressor {
    /// Creates a compressor for the given service.
    pub fn new(config: ProcessorServiceConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout())?,
            config,
        })
    }

    fn form(raw: &[u8], options: &CompressionOptions) -> Result<Form> {
        let mime = ImageFormat::sniff(raw).map_or("application/octet-stream", ImageFormat::mime_type);
        let part = Part::bytes(raw.to_vec())
            .file_name("image")
            .mime_str(mime)
            .context("invalid image mime type")?;
        Ok(Form::new()
            .part("image", part)
            .text("maxWidth", options.max_width.to_string())
            .text("shouldCompress", options.enabled.to_string()))
    }
}

#[async_trait]
impl Compressor for RemoteCompressor {
    async fn compress(&self, raw: &[u8], options: &CompressionOptions) -> Result<CompressedImage> {
        if raw.is_empty() {
            bail!("image data is empty");
        }
        if !options.enabled {
            let format = ImageFormat::sniff(raw).unwrap_or(options.target_format);
            return Ok(CompressedImage::new(raw.to_vec(), format));
        }

        let url = self.config.process_url();
        let response = self
            .client
            .post(&url)
            .multipart(Self::form(raw, options)?)
            .send()
            .await
            .with_context(|| format!("image service unreachable at {url}"))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .context("failed to read image service response")?;
        if !status.is_success() {
            bail!(
                "image service returned {status}: {}",
                upstream_message(&body, "error")
            );
        }
        if body.is_empty() {
            bail!("image service returned an empty body");
        }

        debug!(url = %url, bytes = body.len(), "Remote compression finished");
        Ok(CompressedImage::new(body.to_vec(), ImageFormat::Webp))
    }
}
