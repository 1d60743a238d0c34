//! Bundled implementations of the stage collaborators.
//!
//! - [`ImageCompressor`]: in-process resize and re-encode (`local-codec`)
//! - [`RemoteCompressor`]: HTTP image-processing service (`http`)
//! - [`OpenAiDescriber`]: OpenAI-compatible vision model (`http`)
//! - [`WordPressPublisher`]: WordPress REST media library (`http`)

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "local-codec")]
mod image_codec;
#[cfg(feature = "http")]
mod openai;
#[cfg(feature = "http")]
mod remote;
#[cfg(feature = "http")]
mod wordpress;

#[cfg(feature = "local-codec")]
pub use image_codec::{Filter, ImageCompressor};
#[cfg(feature = "http")]
pub use openai::{OpenAiDescriber, DEFAULT_ALT_TEXT, DEFAULT_TITLE};
#[cfg(feature = "http")]
pub use remote::RemoteCompressor;
#[cfg(feature = "http")]
pub use wordpress::WordPressPublisher;
