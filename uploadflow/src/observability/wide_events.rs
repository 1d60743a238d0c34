//! Payload builders for batch lifecycle events.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::core::{BatchReport, ItemOutcome};
use crate::progress::ProgressSnapshot;

/// Builds the payload of `batch.started`.
#[must_use]
pub fn batch_started_payload(batch_id: Uuid, total: usize, concurrency_limit: usize) -> Value {
    json!({
        "batch_id": batch_id,
        "total": total,
        "concurrency_limit": concurrency_limit,
    })
}

/// Builds the payload of `item.settled`.
///
/// `stage` and `error` are `null` for a published item.
#[must_use]
pub fn item_settled_payload(
    batch_id: Uuid,
    outcome: &ItemOutcome,
    snapshot: ProgressSnapshot,
) -> Value {
    let failure = outcome.failure();
    json!({
        "batch_id": batch_id,
        "index": outcome.index,
        "name": outcome.name,
        "status": outcome.status(),
        "stage": failure.map(|f| f.stage),
        "error": failure.map(|f| f.message.as_str()),
        "duration_ms": outcome.duration_ms(),
        "completed": snapshot.completed,
        "total": snapshot.total,
    })
}

/// Builds the payload of `batch.completed`.
#[must_use]
pub fn batch_completed_payload(report: &BatchReport) -> Value {
    let failed_indices: Vec<usize> = report.failures().map(|o| o.index).collect();
    json!({
        "batch_id": report.batch_id,
        "total": report.total(),
        "succeeded": report.succeeded,
        "failed": report.failed,
        "failed_indices": failed_indices,
        "peak_in_flight": report.peak_in_flight,
        "duration_ms": report.duration_ms(),
    })
}
