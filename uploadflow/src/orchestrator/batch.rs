//! Batch fan-out, settlement and fan-in.

use chrono::Utc;
use futures::future::join_all;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, info_span, instrument, Instrument};
use uuid::Uuid;

use super::slots::OutcomeSlots;
use crate::concurrency::{ConcurrencyLimiter, Permit};
use crate::config::BatchConfig;
use crate::core::{BatchReport, WorkItem};
use crate::errors::{ConfigError, InvariantViolation, Result, ValidationError};
use crate::events::{EventSink, NoOpEventSink, BATCH_COMPLETED, BATCH_STARTED, ITEM_SETTLED};
use crate::observability::{batch_completed_payload, batch_started_payload, item_settled_payload};
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::progress::{ProgressSnapshot, ProgressTracker};
use crate::stages::{Compressor, Describer, Publisher};

/// Runs a batch of items through the pipeline with bounded concurrency.
///
/// At most `concurrency_limit` items are in flight at once. Items are
/// admitted in submission order, settle in any order, and are reported in
/// submission order. A failing item never affects the others.
///
/// Concurrent [`run`](Self::run) calls on one orchestrator are serialized:
/// a batch owns the progress channel from its first snapshot to its last.
pub struct BatchOrchestrator {
    config: BatchConfig,
    pipeline: Arc<Pipeline>,
    event_sink: Arc<dyn EventSink>,
    progress_tx: Arc<watch::Sender<ProgressSnapshot>>,
    current: RwLock<Arc<ProgressTracker>>,
    run_lock: Mutex<()>,
}

impl BatchOrchestrator {
    /// Creates an orchestrator after validating `config`.
    pub fn new(
        config: BatchConfig,
        compressor: Arc<dyn Compressor>,
        describer: Arc<dyn Describer>,
        publisher: Arc<dyn Publisher>,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        let pipeline = Pipeline::new(
            compressor,
            describer,
            publisher,
            PipelineSettings::from(&config),
        );
        let (progress_tx, _) = watch::channel(ProgressSnapshot::default());
        let progress_tx = Arc::new(progress_tx);
        let current = ProgressTracker::with_sender(0, Arc::clone(&progress_tx));
        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
            event_sink: Arc::new(NoOpEventSink),
            progress_tx,
            current: RwLock::new(Arc::new(current)),
            run_lock: Mutex::new(()),
        })
    }

    /// Sets the sink that receives lifecycle events.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// The validated configuration.
    #[must_use]
    pub const fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Tracker of the most recent batch, for polling.
    #[must_use]
    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.current.read())
    }

    /// Subscribes to progress snapshots across every run of this orchestrator.
    #[must_use]
    pub fn subscribe_progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress_tx.subscribe()
    }

    /// Runs every item and returns one outcome per item, in submission order.
    ///
    /// Item failures are recorded in the report. Only an empty batch
    /// ([`ValidationError`]) or a broken internal guarantee
    /// ([`InvariantViolation`]) is returned as an error.
    ///
    /// A call made while another batch is running waits for it to finish.
    #[instrument(skip_all, fields(batch_id = tracing::field::Empty, total = items.len()))]
    pub async fn run(&self, items: Vec<WorkItem>) -> Result<BatchReport> {
        if items.is_empty() {
            return Err(ValidationError::empty_batch().into());
        }
        let _exclusive = self.run_lock.lock().await;

        let total = items.len();
        let batch_id = Uuid::new_v4();
        tracing::Span::current().record("batch_id", tracing::field::display(batch_id));
        let started_at = Utc::now();

        let limiter = ConcurrencyLimiter::new(self.config.concurrency_limit)?;
        let tracker = Arc::new(ProgressTracker::with_sender(
            total,
            Arc::clone(&self.progress_tx),
        ));
        *self.current.write() = Arc::clone(&tracker);
        let slots = Arc::new(OutcomeSlots::new(total));
        let notify_order = Arc::new(Mutex::new(()));

        info!(concurrency_limit = limiter.limit(), "Batch started");
        self.event_sink
            .emit(
                BATCH_STARTED,
                Some(batch_started_payload(batch_id, total, limiter.limit())),
            )
            .await;

        let mut handles = Vec::with_capacity(total);
        for (index, item) in items.into_iter().enumerate() {
            let permit = limiter.acquire().await?;
            debug!(index, in_flight = limiter.in_flight(), "Item admitted");
            let settle = Settlement {
                batch_id,
                pipeline: Arc::clone(&self.pipeline),
                slots: Arc::clone(&slots),
                tracker: Arc::clone(&tracker),
                sink: Arc::clone(&self.event_sink),
                notify_order: Arc::clone(&notify_order),
            };
            let span = info_span!("settle", index);
            handles.push(tokio::spawn(
                settle.run(index, item, permit).instrument(span),
            ));
        }

        for (index, joined) in join_all(handles).await.into_iter().enumerate() {
            joined.map_err(|e| {
                InvariantViolation::new(format!("task for item {index} did not complete: {e}"))
            })??;
        }

        if limiter.in_flight() != 0 {
            return Err(InvariantViolation::new(format!(
                "{} permits still held after all items settled",
                limiter.in_flight()
            ))
            .into());
        }
        let settled = tracker.snapshot();
        if settled.completed != total {
            return Err(InvariantViolation::new(format!(
                "progress ended at {} of {total}",
                settled.completed
            ))
            .into());
        }
        let outcomes = slots.take_all()?;

        let report = BatchReport::new(batch_id, outcomes, limiter.peak_in_flight(), started_at);
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            peak_in_flight = report.peak_in_flight,
            duration_ms = report.duration_ms(),
            "{}",
            report.summary()
        );
        self.event_sink
            .emit(BATCH_COMPLETED, Some(batch_completed_payload(&report)))
            .await;
        Ok(report)
    }
}

impl fmt::Debug for BatchOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchOrchestrator")
            .field("config", &self.config)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

/// Shared handles one spawned item needs to settle.
struct Settlement {
    batch_id: Uuid,
    pipeline: Arc<Pipeline>,
    slots: Arc<OutcomeSlots>,
    tracker: Arc<ProgressTracker>,
    sink: Arc<dyn EventSink>,
    // Held across advance and emit so `item.settled` arrives in progress order.
    notify_order: Arc<Mutex<()>>,
}

impl Settlement {
    /// Runs the item, then records, releases, advances and notifies, in
    /// that order.
    async fn run(
        self,
        index: usize,
        item: WorkItem,
        permit: Permit,
    ) -> std::result::Result<(), InvariantViolation> {
        let outcome = self.pipeline.run(index, &item).await;
        let recorded = self.slots.record(outcome.clone());
        permit.release();
        recorded?;

        let _ordered = self.notify_order.lock().await;
        let snapshot = self.tracker.advance();
        debug!(
            status = %outcome.status(),
            completed = snapshot.completed,
            total = snapshot.total,
            "Item settled"
        );
        self.sink
            .emit(
                ITEM_SETTLED,
                Some(item_settled_payload(self.batch_id, &outcome, snapshot)),
            )
            .await;
        Ok(())
    }
}
