//! Stage failure descriptors.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use super::StageKind;

/// Why a stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The item was screened out before the collaborator ran
    /// (empty, oversize, unsupported extension).
    InvalidInput,
    /// The collaborator returned an error.
    Rejected,
    /// The collaborator did not finish within the stage timeout.
    TimedOut,
    /// The collaborator panicked.
    Panicked,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput => write!(f, "invalid_input"),
            Self::Rejected => write!(f, "rejected"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Panicked => write!(f, "panicked"),
        }
    }
}

/// Failure of one stage for one item.
///
/// Recorded inside the item's outcome; never propagated past the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{stage} stage failed ({kind}): {message}")]
pub struct StageFailure {
    /// Stage that failed.
    pub stage: StageKind,
    /// Failure category.
    pub kind: FailureKind,
    /// Human-readable message.
    pub message: String,
}

impl StageFailure {
    /// Creates a new stage failure.
    #[must_use]
    pub fn new(stage: StageKind, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            stage,
            kind,
            message: message.into(),
        }
    }

    /// The item was screened out before compression.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(StageKind::Compress, FailureKind::InvalidInput, message)
    }

    /// The collaborator returned an error.
    #[must_use]
    pub fn rejected(stage: StageKind, message: impl Into<String>) -> Self {
        Self::new(stage, FailureKind::Rejected, message)
    }

    /// The collaborator exceeded the stage timeout.
    #[must_use]
    pub fn timed_out(stage: StageKind, limit: Duration) -> Self {
        Self::new(
            stage,
            FailureKind::TimedOut,
            format!("no result within {:.1}s", limit.as_secs_f64()),
        )
    }

    /// The collaborator panicked.
    #[must_use]
    pub fn panicked(stage: StageKind, message: impl Into<String>) -> Self {
        Self::new(stage, FailureKind::Panicked, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_is_compress_stage() {
        let failure = StageFailure::invalid_input("file is empty");
        assert_eq!(failure.stage, StageKind::Compress);
        assert_eq!(failure.kind, FailureKind::InvalidInput);
    }

    #[test]
    fn test_display() {
        let failure = StageFailure::rejected(StageKind::Describe, "upstream returned HTML");
        assert_eq!(
            failure.to_string(),
            "describe stage failed (rejected): upstream returned HTML"
        );
    }

    #[test]
    fn test_timed_out_message() {
        let failure = StageFailure::timed_out(StageKind::Publish, Duration::from_millis(1500));
        assert_eq!(failure.kind, FailureKind::TimedOut);
        assert_eq!(failure.message, "no result within 1.5s");
    }

    #[test]
    fn test_serialization() {
        let failure = StageFailure::panicked(StageKind::Compress, "boom");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["stage"], "compress");
        assert_eq!(json["kind"], "panicked");
    }
}
