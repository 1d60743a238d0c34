//! Event sink trait and implementations.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, Level};

/// Receives batch lifecycle events.
///
/// Sinks are owned by the orchestrator that emits into them; there is no
/// process-wide registry.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    ///
    /// * `event_type` - dotted event name (e.g. `item.settled`)
    /// * `data` - optional JSON payload
    async fn emit(&self, event_type: &str, data: Option<Value>);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event_type: &str, _data: Option<Value>) {}
}

/// Writes events to the `tracing` subscriber.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink at the given level.
    ///
    /// Anything other than `DEBUG` logs at `INFO`.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub const fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, event_type: &str, data: Option<&Value>) {
        let payload = data.map(Value::to_string).unwrap_or_default();
        if self.level == Level::DEBUG {
            debug!(event_type, payload = %payload, "Event: {event_type}");
        } else {
            info!(event_type, payload = %payload, "Event: {event_type}");
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.log_event(event_type, data.as_ref());
    }
}

/// One event captured by [`CollectingEventSink`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEvent {
    /// Event name.
    pub event_type: String,
    /// Event payload, if any.
    pub data: Option<Value>,
}

/// Keeps every event in memory, in emission order. Intended for tests.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<RecordedEvent>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.read().clone()
    }

    /// Returns the collected event names in order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events
            .read()
            .iter()
            .map(|e| e.event_type.clone())
            .collect()
    }

    /// Returns events whose name is exactly `event_type`.
    #[must_use]
    pub fn events_of_type(&self, event_type: &str) -> Vec<RecordedEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Drops all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    fn record(&self, event_type: &str, data: Option<Value>) {
        self.events.write().push(RecordedEvent {
            event_type: event_type.to_string(),
            data,
        });
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data);
    }
}
