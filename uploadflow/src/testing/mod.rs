//! Testing utilities for uploadflow batches.
//!
//! This module provides:
//! - Scripted stub collaborators with random delays
//! - An in-flight probe for concurrency assertions
//! - Assertions over batch reports

mod assertions;
mod probe;
mod stubs;

pub use assertions::{
    assert_counts, assert_item_failed_at, assert_item_succeeded, assert_submission_order,
};
pub use probe::{InFlightProbe, ProbeGuard};
pub use stubs::{DelayRange, StubCompressor, StubDescriber, StubPublisher, MALFORMED_MARKER};
