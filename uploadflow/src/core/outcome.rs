//! Per-item outcomes and the aggregate batch report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::item::WorkItem;
use super::payload::PublishReceipt;
use crate::stages::{StageFailure, StageKind};

/// Terminal status of one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// All three stages completed.
    Succeeded,
    /// One stage failed; later stages were skipped.
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal record for one submitted item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    /// Position in the submitted batch.
    pub index: usize,
    /// Display name of the item.
    pub name: String,
    /// Content fingerprint of the item.
    pub fingerprint: String,
    /// Publish receipt or the failure that stopped the pipeline.
    pub result: Result<PublishReceipt, StageFailure>,
    /// When the pipeline started for this item.
    pub started_at: DateTime<Utc>,
    /// When the item settled.
    pub ended_at: DateTime<Utc>,
}

impl ItemOutcome {
    /// Creates an outcome that settles now.
    #[must_use]
    pub fn new(
        index: usize,
        item: &WorkItem,
        result: Result<PublishReceipt, StageFailure>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            index,
            name: item.name().to_string(),
            fingerprint: item.fingerprint().to_string(),
            result,
            started_at,
            ended_at: Utc::now(),
        }
    }

    /// Terminal status.
    #[must_use]
    pub const fn status(&self) -> OutcomeStatus {
        match self.result {
            Ok(_) => OutcomeStatus::Succeeded,
            Err(_) => OutcomeStatus::Failed,
        }
    }

    /// Returns true if the item was published.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The publish receipt, if any.
    #[must_use]
    pub fn receipt(&self) -> Option<&PublishReceipt> {
        self.result.as_ref().ok()
    }

    /// The failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&StageFailure> {
        self.result.as_ref().err()
    }

    /// Stage that failed, if any.
    #[must_use]
    pub fn failed_stage(&self) -> Option<StageKind> {
        self.failure().map(|f| f.stage)
    }

    /// Wall-clock time spent in the pipeline.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }
}

/// Aggregate over every outcome of one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Identifier of this run.
    pub batch_id: Uuid,
    /// Number of published items.
    pub succeeded: usize,
    /// Number of failed items.
    pub failed: usize,
    /// One outcome per item, in submission order.
    pub outcomes: Vec<ItemOutcome>,
    /// Highest number of items observed in the pipeline at once.
    pub peak_in_flight: usize,
    /// When the batch was accepted.
    pub started_at: DateTime<Utc>,
    /// When the last item settled.
    pub ended_at: DateTime<Utc>,
}

impl BatchReport {
    /// Builds a report from outcomes already in submission order.
    #[must_use]
    pub fn new(
        batch_id: Uuid,
        outcomes: Vec<ItemOutcome>,
        peak_in_flight: usize,
        started_at: DateTime<Utc>,
    ) -> Self {
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        let failed = outcomes.len() - succeeded;
        Self {
            batch_id,
            succeeded,
            failed,
            outcomes,
            peak_in_flight,
            started_at,
            ended_at: Utc::now(),
        }
    }

    /// Number of submitted items.
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns true if every item was published.
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Outcomes that failed, in submission order.
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Outcomes that succeeded, in submission order.
    pub fn successes(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    /// Wall-clock time for the whole batch.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.ended_at - self.started_at).num_milliseconds()
    }

    /// One-line human summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.all_succeeded() {
            format!("all {} images uploaded", self.total())
        } else {
            format!(
                "upload completed: {} succeeded, {} failed",
                self.succeeded, self.failed
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::FailureKind;
    use pretty_assertions::assert_eq;

    fn outcome(index: usize, result: Result<PublishReceipt, StageFailure>) -> ItemOutcome {
        let item = WorkItem::new(format!("img-{index}.png"), vec![index as u8]);
        ItemOutcome::new(index, &item, result, Utc::now())
    }

    #[test]
    fn test_outcome_status() {
        let ok = outcome(0, Ok(PublishReceipt::new("7", "https://cms/7")));
        assert_eq!(ok.status(), OutcomeStatus::Succeeded);
        assert_eq!(ok.receipt().map(|r| r.remote_id.as_str()), Some("7"));
        assert!(ok.failure().is_none());

        let failed = outcome(1, Err(StageFailure::rejected(StageKind::Describe, "bad json")));
        assert_eq!(failed.status(), OutcomeStatus::Failed);
        assert_eq!(failed.failed_stage(), Some(StageKind::Describe));
        assert_eq!(failed.failure().map(|f| f.kind), Some(FailureKind::Rejected));
    }

    #[test]
    fn test_report_counts_and_summary() {
        let report = BatchReport::new(
            Uuid::new_v4(),
            vec![
                outcome(0, Ok(PublishReceipt::new("1", "u1"))),
                outcome(1, Err(StageFailure::invalid_input("empty file"))),
                outcome(2, Ok(PublishReceipt::new("2", "u2"))),
            ],
            2,
            Utc::now(),
        );

        assert_eq!(report.total(), 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!(!report.all_succeeded());
        assert_eq!(
            report.failures().map(|o| o.index).collect::<Vec<_>>(),
            vec![1]
        );
        assert_eq!(report.summary(), "upload completed: 2 succeeded, 1 failed");
    }

    #[test]
    fn test_report_all_succeeded_summary() {
        let report = BatchReport::new(
            Uuid::new_v4(),
            vec![outcome(0, Ok(PublishReceipt::new("1", "u1")))],
            1,
            Utc::now(),
        );
        assert!(report.all_succeeded());
        assert_eq!(report.summary(), "all 1 images uploaded");
    }

    #[test]
    fn test_report_serialization() {
        let report = BatchReport::new(
            Uuid::new_v4(),
            vec![outcome(0, Err(StageFailure::rejected(StageKind::Publish, "401")))],
            1,
            Utc::now(),
        );

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failed"], 1);
        assert_eq!(json["outcomes"][0]["result"]["Err"]["stage"], "publish");

        let back: BatchReport = serde_json::from_value(json).unwrap();
        assert_eq!(back.outcomes, report.outcomes);
    }
}
