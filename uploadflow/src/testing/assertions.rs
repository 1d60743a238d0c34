//! Test assertions for batch reports.

use crate::core::BatchReport;
use crate::stages::StageKind;

/// Asserts that the item at `index` was published.
pub fn assert_item_succeeded(report: &BatchReport, index: usize) {
    let outcome = &report.outcomes[index];
    assert!(
        outcome.is_success(),
        "Expected item {index} ({}) to succeed, got {:?}",
        outcome.name,
        outcome.failure()
    );
}

/// Asserts that the item at `index` failed in `stage`.
pub fn assert_item_failed_at(report: &BatchReport, index: usize, stage: StageKind) {
    let outcome = &report.outcomes[index];
    assert_eq!(
        outcome.failed_stage(),
        Some(stage),
        "Expected item {index} ({}) to fail at {stage}, got {:?}",
        outcome.name,
        outcome.result
    );
}

/// Asserts that outcomes are indexed `0..n` in order and match `names`.
pub fn assert_submission_order(report: &BatchReport, names: &[&str]) {
    let indices: Vec<usize> = report.outcomes.iter().map(|o| o.index).collect();
    let expected: Vec<usize> = (0..names.len()).collect();
    assert_eq!(indices, expected, "Outcome indices out of order");

    let actual: Vec<&str> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(actual, names, "Outcome names out of submission order");
}

/// Asserts the succeeded and failed counts.
pub fn assert_counts(report: &BatchReport, succeeded: usize, failed: usize) {
    assert_eq!(
        (report.succeeded, report.failed),
        (succeeded, failed),
        "Expected {succeeded} succeeded / {failed} failed, got {} / {}",
        report.succeeded,
        report.failed
    );
}
