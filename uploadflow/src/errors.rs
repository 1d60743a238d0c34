//! Error types for uploadflow.
//!
//! Three kinds of trouble must stay distinguishable for callers:
//!
//! - [`ValidationError`]: the batch (or its configuration) was rejected before
//!   anything was scheduled.
//! - [`StageFailure`](crate::stages::StageFailure): one item failed one stage.
//!   This never escapes [`BatchOrchestrator::run`](crate::orchestrator::BatchOrchestrator::run);
//!   it is recorded as data inside the item's outcome.
//! - [`InvariantViolation`]: an internal bookkeeping fault. Always fatal.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for uploadflow operations.
#[derive(Debug, Error)]
pub enum UploadflowError {
    /// The batch submission was rejected outright.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// An internal invariant was broken while running a batch.
    #[error("{0}")]
    Invariant(#[from] InvariantViolation),

    /// Configuration could not be loaded or is invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadflowError {
    /// Returns true if the batch was rejected before scheduling.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is an internal fault.
    #[must_use]
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }
}

/// Raised when a batch submission is rejected before scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("Invalid batch: {message}")]
pub struct ValidationError {
    /// The error message.
    pub message: String,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The error returned for a batch with no items.
    #[must_use]
    pub fn empty_batch() -> Self {
        Self::new("batch contains no items")
    }
}

/// Raised when the orchestrator's own bookkeeping is inconsistent.
///
/// Examples: an item settling twice, an item that never settled, a permit
/// still outstanding after fan-in.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invariant violation: {message}")]
pub struct InvariantViolation {
    /// The error message.
    pub message: String,
}

impl InvariantViolation {
    /// Creates a new invariant violation.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// An item produced a second outcome.
    #[must_use]
    pub fn double_settlement(index: usize) -> Self {
        Self::new(format!("item {index} settled more than once"))
    }

    /// An item has no outcome after fan-in.
    #[must_use]
    pub fn unsettled(index: usize) -> Self {
        Self::new(format!("item {index} never settled"))
    }
}

/// Raised when configuration is missing or malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid configuration for '{key}': {message}")]
pub struct ConfigError {
    /// The offending key or environment variable.
    pub key: String,
    /// What is wrong with it.
    pub message: String,
}

impl ConfigError {
    /// Creates a new config error.
    #[must_use]
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Result alias for uploadflow operations.
pub type Result<T, E = UploadflowError> = std::result::Result<T, E>;
