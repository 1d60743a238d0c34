//! Batch progress reporting.

mod tracker;

pub use tracker::{ProgressSnapshot, ProgressTracker};
