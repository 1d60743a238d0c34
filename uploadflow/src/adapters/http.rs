//! Shared HTTP plumbing for the bundled adapters.

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

const USER_AGENT: &str = concat!("uploadflow/", env!("CARGO_PKG_VERSION"));

/// Longest upstream body excerpt included in an error message.
const MAX_EXCERPT: usize = 200;

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("failed to build HTTP client")
}

/// Pulls a human-readable message out of an error body.
///
/// Tries `error.message`, then `{key}` as a string, then `message`, then
/// falls back to a short excerpt of the raw body.
pub(crate) fn upstream_message(body: &[u8], key: &str) -> String {
    if let Ok(json) = serde_json::from_slice::<Value>(body) {
        let candidates = [
            json.pointer("/error/message"),
            json.get(key),
            json.get("message"),
        ];
        if let Some(message) = candidates
            .into_iter()
            .flatten()
            .find_map(Value::as_str)
            .filter(|m| !m.is_empty())
        {
            return message.to_string();
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return "empty response body".to_string();
    }
    text.chars().take(MAX_EXCERPT).collect()
}
