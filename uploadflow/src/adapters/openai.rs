//! Describer backed by an OpenAI-compatible chat completions API.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::http::{build_client, upstream_message};
use crate::config::DescriberConfig;
use crate::core::{CompressedImage, ImageMetadata};
use crate::stages::Describer;
use crate::utils::{extract_json_object, first_balanced_object, slugify, strip_code_fences};

/// Title used when the model omits one.
pub const DEFAULT_TITLE: &str = "Untitled Image";

/// Alt text used when the model omits one.
pub const DEFAULT_ALT_TEXT: &str = "No description available";

/// Asks a vision model for a title, alt text and file name.
#[derive(Debug, Clone)]
pub struct OpenAiDescriber {
    client: Client,
    config: DescriberConfig,
}

impl OpenAiDescriber {
    /// Creates a describer; fails if the API key is blank.
    pub fn new(config: DescriberConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            bail!("describer API key is not set");
        }
        Ok(Self {
            client: build_client(config.timeout())?,
            config,
        })
    }

    fn request_body(&self, image: &CompressedImage, original_name: &str) -> Value {
        let data_url = format!(
            "data:{};base64,{}",
            image.format().mime_type(),
            STANDARD.encode(image.bytes())
        );
        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": instruction(original_name) },
                    { "type": "image_url", "image_url": { "url": data_url } },
                ],
            }],
        })
    }
}

fn instruction(original_name: &str) -> String {
    format!(
        "Describe this image and return strict JSON with three fields. \
         The original file name is \"{original_name}\"; prefer it for the title \
         unless it is random or meaningless. Fields: 1. title (short title), \
         2. alt (alternative text), 3. filename (lowercase letters and hyphens only). \
         Return only the JSON object without any markdown formatting or code blocks."
    )
}

#[async_trait]
impl Describer for OpenAiDescriber {
    async fn describe(&self, image: &CompressedImage, original_name: &str) -> Result<ImageMetadata> {
        let url = self.config.completions_url();
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&self.request_body(image, original_name))
            .send()
            .await
            .with_context(|| format!("describer unreachable at {url}"))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .context("failed to read describer response")?;
        if !status.is_success() {
            bail!("describer returned {status}: {}", upstream_message(&body, "error"));
        }

        let content = completion_content(&body)?;
        debug!(chars = content.len(), "Description received");
        parse_description(&content)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DescriptionReply {
    title: Option<String>,
    #[serde(alias = "alt_text")]
    alt: Option<String>,
    filename: Option<String>,
}

/// Extracts `choices[0].message.content` from a completion body.
fn completion_content(body: &[u8]) -> Result<String> {
    let completion: ChatCompletion =
        serde_json::from_slice(body).context("malformed completion response")?;
    completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("completion response has no choices"))?
        .message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| anyhow!("completion response has no content"))
}

/// Turns model output into metadata.
///
/// Code fences are stripped first. If the remainder is not a JSON object, the
/// outermost `{...}` span is tried, then the first balanced one. Anything
/// else is an error.
pub(crate) fn parse_description(content: &str) -> Result<ImageMetadata> {
    let cleaned = strip_code_fences(content);
    let reply = match serde_json::from_str::<DescriptionReply>(&cleaned) {
        Ok(reply) => reply,
        Err(first) => {
            warn!(error = %first, "Description is not plain JSON, searching for an object");
            embedded_reply(&cleaned)?
        }
    };
    Ok(into_metadata(reply))
}

fn embedded_reply(text: &str) -> Result<DescriptionReply> {
    let outer = extract_json_object(text)
        .ok_or_else(|| anyhow!("description contains no JSON object"))?;
    match serde_json::from_str(outer) {
        Ok(reply) => Ok(reply),
        Err(outer_err) => {
            let first = first_balanced_object(text)
                .filter(|first| *first != outer)
                .ok_or(outer_err)
                .context("description JSON is malformed")?;
            serde_json::from_str(first).context("description JSON is malformed")
        }
    }
}

fn into_metadata(reply: DescriptionReply) -> ImageMetadata {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    let title = non_empty(reply.title);
    let slug_source = non_empty(reply.filename).or_else(|| title.clone());
    ImageMetadata::new(
        title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        non_empty(reply.alt).unwrap_or_else(|| DEFAULT_ALT_TEXT.to_string()),
        slugify(slug_source.as_deref().unwrap_or_default()),
    )
}
