//! Configuration types for batch runs and the bundled adapters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::ConfigError;

/// Prefix for environment variables read by [`BatchConfig::from_env`].
pub const ENV_PREFIX: &str = "UPLOADFLOW_";

/// Output encoding for compressed images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// WebP (default).
    #[default]
    Webp,
    /// JPEG.
    Jpeg,
    /// PNG.
    Png,
}

impl ImageFormat {
    /// File extension without the leading dot.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }

    /// MIME type for uploads.
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Webp => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Parses a format name leniently; unknown names fall back to WebP.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }

    /// Identifies an encoded image from its leading bytes.
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(Self::Webp)
        } else {
            None
        }
    }
}

impl FromStr for ImageFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(Self::Webp),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(ConfigError::new(
                "target_format",
                format!("unsupported format '{other}'"),
            )),
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Webp => write!(f, "webp"),
            Self::Jpeg => write!(f, "jpeg"),
            Self::Png => write!(f, "png"),
        }
    }
}

/// Options passed to the compress stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionOptions {
    /// Whether to re-encode at all. When false the raw bytes pass through.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Bounding box width in pixels.
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// Bounding box height in pixels.
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    /// Encoder quality, 1-100.
    ///
    /// Only the JPEG encoder is lossy. PNG and WebP output is lossless and
    /// ignores this value, so re-encoding an already lossy source into
    /// either can produce a larger file.
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Output encoding.
    #[serde(default)]
    pub target_format: ImageFormat,
}

const fn default_true() -> bool {
    true
}

const fn default_max_width() -> u32 {
    1920
}

const fn default_max_height() -> u32 {
    1080
}

const fn default_quality() -> u8 {
    80
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_width: default_max_width(),
            max_height: default_max_height(),
            quality: default_quality(),
            target_format: ImageFormat::default(),
        }
    }
}

impl CompressionOptions {
    /// Creates options with defaults (1920x1080, quality 80, WebP).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bounding box.
    #[must_use]
    pub const fn with_max_size(mut self, width: u32, height: u32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    /// Sets the encoder quality.
    #[must_use]
    pub const fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub const fn with_format(mut self, format: ImageFormat) -> Self {
        self.target_format = format;
        self
    }

    /// Enables or disables re-encoding.
    #[must_use]
    pub const fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Checks bounds and quality.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_width == 0 || self.max_height == 0 {
            return Err(ConfigError::new("max_width/max_height", "must be non-zero"));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::new("quality", "must be within 1..=100"));
        }
        Ok(())
    }
}

/// Credentials for the content-management endpoint.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Application password.
    pub password: String,
}

impl Credentials {
    /// Creates new credentials.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns true if either part is missing.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.username.is_empty() || self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Maximum number of items in the pipeline at once.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Options for the compress stage.
    #[serde(default)]
    pub compression: CompressionOptions,
    /// Credentials handed to the publish stage.
    #[serde(default)]
    pub credentials: Credentials,
    /// Per-stage timeout in seconds. `None` disables the timeout.
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_seconds: Option<f64>,
    /// Largest accepted input, in bytes.
    #[serde(default = "default_max_item_bytes")]
    pub max_item_bytes: usize,
}

const fn default_concurrency_limit() -> usize {
    3
}

#[allow(clippy::unnecessary_wraps)]
fn default_stage_timeout() -> Option<f64> {
    Some(120.0)
}

const fn default_max_item_bytes() -> usize {
    10 * 1024 * 1024 // 10MB
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            compression: CompressionOptions::default(),
            credentials: Credentials::default(),
            stage_timeout_seconds: default_stage_timeout(),
            max_item_bytes: default_max_item_bytes(),
        }
    }
}

impl BatchConfig {
    /// Creates a new batch configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the concurrency limit.
    #[must_use]
    pub const fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Sets the compression options.
    #[must_use]
    pub fn with_compression(mut self, compression: CompressionOptions) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the publish credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Sets the per-stage timeout.
    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout_seconds = timeout.map(|d| d.as_secs_f64());
        self
    }

    /// Sets the input size cap.
    #[must_use]
    pub const fn with_max_item_bytes(mut self, bytes: usize) -> Self {
        self.max_item_bytes = bytes;
        self
    }

    /// Gets the stage timeout as a Duration.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_seconds
            .filter(|s| *s > 0.0)
            .and_then(|s| Duration::try_from_secs_f64(s).ok())
    }

    /// Checks every field for a usable value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency_limit == 0 {
            return Err(ConfigError::new("concurrency_limit", "must be at least 1"));
        }
        if self.max_item_bytes == 0 {
            return Err(ConfigError::new("max_item_bytes", "must be non-zero"));
        }
        self.compression.validate()
    }

    /// Builds a configuration from `UPLOADFLOW_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    ///
    /// Keys are full variable names, e.g. `UPLOADFLOW_QUALITY`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut config = Self::default();

        if let Some(v) = get("CONCURRENCY_LIMIT") {
            config.concurrency_limit = parse_var("CONCURRENCY_LIMIT", &v)?;
        }
        if let Some(v) = get("MAX_WIDTH") {
            config.compression.max_width = parse_var("MAX_WIDTH", &v)?;
        }
        if let Some(v) = get("MAX_HEIGHT") {
            config.compression.max_height = parse_var("MAX_HEIGHT", &v)?;
        }
        if let Some(v) = get("QUALITY") {
            config.compression.quality = parse_var("QUALITY", &v)?;
        }
        if let Some(v) = get("TARGET_FORMAT") {
            config.compression.target_format = ImageFormat::parse_lenient(&v);
        }
        if let Some(v) = get("COMPRESS_IMAGES") {
            config.compression.enabled = parse_bool("COMPRESS_IMAGES", &v)?;
        }
        if let Some(v) = get("WP_USERNAME") {
            config.credentials.username = v;
        }
        if let Some(v) = get("WP_PASSWORD") {
            config.credentials.password = v;
        }
        if let Some(v) = get("STAGE_TIMEOUT_SECS") {
            let secs: f64 = parse_var("STAGE_TIMEOUT_SECS", &v)?;
            config.stage_timeout_seconds = (secs > 0.0).then_some(secs);
        }
        if let Some(v) = get("MAX_FILE_SIZE") {
            config.max_item_bytes = parse_var("MAX_FILE_SIZE", &v)?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| ConfigError::new(format!("{ENV_PREFIX}{name}"), e.to_string()))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ConfigError::new(
            format!("{ENV_PREFIX}{name}"),
            format!("expected a boolean, got '{other}'"),
        )),
    }
}

/// Configuration for the OpenAI-compatible describer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriberConfig {
    /// API base URL, including the version segment.
    #[serde(default = "default_openai_url")]
    pub api_base_url: String,
    /// Bearer token.
    #[serde(default)]
    pub api_key: String,
    /// Chat model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: f64,
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

const fn default_max_tokens() -> u32 {
    1000
}

fn default_request_timeout() -> f64 {
    60.0
}

impl Default for DescriberConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_url(),
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            timeout_seconds: default_request_timeout(),
        }
    }
}

impl DescriberConfig {
    /// Creates a describer config for the given key.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    /// Sets the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Full URL of the chat completions endpoint.
    #[must_use]
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base_url.trim_end_matches('/'))
    }

    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds)
            .unwrap_or(Duration::from_secs(60))
    }
}

/// Configuration for the WordPress publisher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Site root, e.g. `https://blog.example.com`.
    #[serde(default)]
    pub site_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: f64,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl PublisherConfig {
    /// Creates a publisher config for the given site.
    #[must_use]
    pub fn new(site_url: impl Into<String>) -> Self {
        Self {
            site_url: site_url.into(),
            timeout_seconds: default_request_timeout(),
        }
    }

    /// Site URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.site_url.trim_end_matches('/')
    }

    /// Media collection endpoint.
    #[must_use]
    pub fn media_url(&self) -> String {
        format!("{}/wp-json/wp/v2/media", self.base_url())
    }

    /// Endpoint for one media item.
    #[must_use]
    pub fn media_item_url(&self, id: u64) -> String {
        format!("{}/{id}", self.media_url())
    }

    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds)
            .unwrap_or(Duration::from_secs(60))
    }
}

/// Configuration for the remote image-processing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorServiceConfig {
    /// Service root, e.g. `http://localhost:3001`.
    #[serde(default = "default_processor_url")]
    pub service_url: String,
    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: f64,
}

fn default_processor_url() -> String {
    "http://localhost:3001".to_string()
}

impl Default for ProcessorServiceConfig {
    fn default() -> Self {
        Self {
            service_url: default_processor_url(),
            timeout_seconds: default_request_timeout(),
        }
    }
}

impl ProcessorServiceConfig {
    /// Creates a config for the given service root.
    #[must_use]
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
            ..Self::default()
        }
    }

    /// Full URL of the processing endpoint.
    #[must_use]
    pub fn process_url(&self) -> String {
        format!("{}/process-image", self.service_url.trim_end_matches('/'))
    }

    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.timeout_seconds)
            .unwrap_or(Duration::from_secs(60))
    }
}
