//! Text helpers for model replies and URL slugs.

use regex::Regex;
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug pattern"));

#[allow(clippy::expect_used)]
static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*```[A-Za-z0-9_-]*\s*$").expect("valid fence pattern"));

#[allow(clippy::expect_used)]
static JSON_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("valid object pattern"));

/// Slug used when nothing usable is left after normalization.
pub const FALLBACK_SLUG: &str = "untitled-image";

/// Lowercases `text`, collapses every run of non-alphanumeric characters to
/// `-`, and trims leading and trailing dashes.
///
/// Returns [`FALLBACK_SLUG`] when the result would be empty.
#[must_use]
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    let slug = NON_ALPHANUMERIC.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}

/// Removes markdown code fence lines (`` ``` `` and `` ```json ``).
#[must_use]
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

/// Returns the outermost `{...}` span in `text`, if any.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<&str> {
    JSON_OBJECT.find(text).map(|m| m.as_str())
}

/// Returns the first brace-balanced `{...}` span in `text`, if any.
///
/// Braces inside JSON string literals are ignored.
#[must_use]
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
