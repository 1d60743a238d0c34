//! Core domain model types for uploadflow.
//!
//! This module contains the data that flows through a batch:
//! - Work items submitted by the caller
//! - Stage payloads (compressed image, metadata, publish receipt)
//! - Per-item outcomes and the aggregate report

mod item;
mod outcome;
mod payload;

pub use item::{WorkItem, SUPPORTED_EXTENSIONS};
pub use outcome::{BatchReport, ItemOutcome, OutcomeStatus};
pub use payload::{CompressedImage, ImageMetadata, PublishReceipt};
