//! # Uploadflow
//!
//! Bounded-concurrency batch pipeline for image uploads.
//!
//! Every submitted image runs through three ordered stages:
//!
//! - **Compress**: resize to a bounding box and re-encode
//! - **Describe**: generate a title, alt text and slug
//! - **Publish**: store the image and its metadata remotely
//!
//! At most `concurrency_limit` images are in the pipeline at once. A failure
//! in one image never affects the others; every image ends with exactly one
//! outcome, reported in submission order, and progress is observable while
//! the batch runs.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use uploadflow::prelude::*;
//!
//! let orchestrator = BatchOrchestrator::new(
//!     BatchConfig::from_env()?,
//!     Arc::new(ImageCompressor::new()),
//!     Arc::new(OpenAiDescriber::new(DescriberConfig::new(api_key))?),
//!     Arc::new(WordPressPublisher::new(PublisherConfig::new(site))?),
//! )?;
//!
//! let mut progress = orchestrator.subscribe_progress();
//! let report = orchestrator.run(items).await?;
//! println!("{}", report.summary());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod adapters;
pub mod concurrency;
pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    #[cfg(feature = "local-codec")]
    pub use crate::adapters::ImageCompressor;
    #[cfg(feature = "http")]
    pub use crate::adapters::{OpenAiDescriber, RemoteCompressor, WordPressPublisher};
    pub use crate::concurrency::{ConcurrencyLimiter, Permit};
    pub use crate::config::{
        BatchConfig, CompressionOptions, Credentials, DescriberConfig, ImageFormat,
        ProcessorServiceConfig, PublisherConfig,
    };
    pub use crate::core::{
        BatchReport, CompressedImage, ImageMetadata, ItemOutcome, OutcomeStatus,
        PublishReceipt, WorkItem,
    };
    pub use crate::errors::{
        ConfigError, InvariantViolation, UploadflowError, ValidationError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::orchestrator::BatchOrchestrator;
    pub use crate::pipeline::{Pipeline, PipelineSettings};
    pub use crate::progress::{ProgressSnapshot, ProgressTracker};
    pub use crate::stages::{
        Compressor, Describer, FailureKind, Publisher, StageFailure, StageKind,
    };
}
