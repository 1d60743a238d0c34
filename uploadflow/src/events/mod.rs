//! Batch lifecycle events.
//!
//! The orchestrator emits three kinds of event into its [`EventSink`]:
//!
//! | name | payload |
//! |------|---------|
//! | [`BATCH_STARTED`] | `batch_id`, `total`, `concurrency_limit` |
//! | [`ITEM_SETTLED`] | `batch_id`, `index`, `name`, `status`, `stage`, `completed`, `total` |
//! | [`BATCH_COMPLETED`] | `batch_id`, `succeeded`, `failed`, `duration_ms` |

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, RecordedEvent};

/// Emitted once, after input validation and before any item starts.
pub const BATCH_STARTED: &str = "batch.started";

/// Emitted once per item, immediately after its progress increment.
pub const ITEM_SETTLED: &str = "item.settled";

/// Emitted once, after the report is assembled.
pub const BATCH_COMPLETED: &str = "batch.completed";
