//! Batch orchestration.
//!
//! [`BatchOrchestrator`] fans a batch out across bounded-concurrency
//! pipelines, tracks progress as items settle, and fans back in to a single
//! [`BatchReport`](crate::core::BatchReport).

mod batch;
mod slots;

pub use batch::BatchOrchestrator;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchConfig;
    use crate::core::WorkItem;
    use crate::events::{CollectingEventSink, BATCH_COMPLETED, BATCH_STARTED, ITEM_SETTLED};
    use crate::progress::ProgressSnapshot;
    use crate::stages::{MockDescriber, StageKind};
    use crate::testing::{DelayRange, StubCompressor, StubDescriber, StubPublisher};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn orchestrator(limit: usize) -> BatchOrchestrator {
        BatchOrchestrator::new(
            BatchConfig::default().with_concurrency_limit(limit),
            Arc::new(StubCompressor::new()),
            Arc::new(StubDescriber::new()),
            Arc::new(StubPublisher::new()),
        )
        .unwrap()
    }

    fn delayed(limit: usize) -> BatchOrchestrator {
        let delay = DelayRange::new(1, 10);
        BatchOrchestrator::new(
            BatchConfig::default().with_concurrency_limit(limit),
            Arc::new(StubCompressor::new().with_delay(delay)),
            Arc::new(StubDescriber::new().with_delay(delay)),
            Arc::new(StubPublisher::new().with_delay(delay)),
        )
        .unwrap()
    }

    fn items(n: usize) -> Vec<WorkItem> {
        (0..n)
            .map(|i| WorkItem::new(format!("photo-{i}.png"), vec![b'p', i as u8]))
            .collect()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = BatchOrchestrator::new(
            BatchConfig::default().with_concurrency_limit(0),
            Arc::new(StubCompressor::new()),
            Arc::new(StubDescriber::new()),
            Arc::new(StubPublisher::new()),
        )
        .unwrap_err();
        assert_eq!(err.key, "concurrency_limit");
    }

    #[tokio::test]
    async fn test_empty_batch_emits_nothing() {
        let sink = Arc::new(CollectingEventSink::new());
        let orchestrator = orchestrator(2).with_event_sink(sink.clone());
        let rx = orchestrator.subscribe_progress();

        let err = orchestrator.run(Vec::new()).await.unwrap_err();

        assert!(err.is_validation());
        assert!(sink.is_empty());
        assert!(!rx.has_changed().unwrap());
        assert_eq!(orchestrator.progress().snapshot(), ProgressSnapshot::new(0, 0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_event_sequence() {
        let sink = Arc::new(CollectingEventSink::new());
        let orchestrator = delayed(4).with_event_sink(sink.clone());

        let report = orchestrator.run(items(12)).await.unwrap();

        assert_eq!(report.total(), 12);
        let types = sink.event_types();
        assert_eq!(types.len(), 14);
        assert_eq!(types[0], BATCH_STARTED);
        assert!(types[1..13].iter().all(|t| t.as_str() == ITEM_SETTLED));
        assert_eq!(types[13], BATCH_COMPLETED);
        let completed: Vec<u64> = sink
            .events_of_type(ITEM_SETTLED)
            .iter()
            .filter_map(|e| e.data.as_ref()?["completed"].as_u64())
            .collect();
        assert_eq!(completed, (1..=12).collect::<Vec<u64>>());

        let started = &sink.events_of_type(BATCH_STARTED)[0];
        assert_eq!(
            started.data.as_ref().unwrap()["batch_id"],
            report.batch_id.to_string()
        );
    }

    #[tokio::test]
    async fn test_settled_event_names_failed_stage() {
        let mut describer = MockDescriber::new();
        describer
            .expect_describe()
            .returning(|_, _| Err(anyhow::anyhow!("model unavailable")));
        let sink = Arc::new(CollectingEventSink::new());
        let orchestrator = BatchOrchestrator::new(
            BatchConfig::default(),
            Arc::new(StubCompressor::new()),
            Arc::new(describer),
            Arc::new(StubPublisher::new()),
        )
        .unwrap()
        .with_event_sink(sink.clone());

        let report = orchestrator.run(items(1)).await.unwrap();

        assert_eq!(report.outcomes[0].failed_stage(), Some(StageKind::Describe));
        let settled = &sink.events_of_type(ITEM_SETTLED)[0];
        let data = settled.data.as_ref().unwrap();
        assert_eq!(data["status"], "failed");
        assert_eq!(data["stage"], "describe");
    }

    #[tokio::test]
    async fn test_progress_handle_tracks_latest_batch() {
        let orchestrator = orchestrator(3);

        orchestrator.run(items(4)).await.unwrap();
        assert_eq!(orchestrator.progress().snapshot(), ProgressSnapshot::new(4, 4));

        orchestrator.run(items(2)).await.unwrap();
        assert_eq!(orchestrator.progress().snapshot(), ProgressSnapshot::new(2, 2));
        assert_eq!(
            *orchestrator.subscribe_progress().borrow(),
            ProgressSnapshot::new(2, 2)
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_runs_keep_progress_monotonic() {
        let orchestrator = Arc::new(delayed(2));
        let mut rx = orchestrator.subscribe_progress();
        let observer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while rx.changed().await.is_ok() {
                seen.push(*rx.borrow_and_update());
            }
            seen
        });

        let first = Arc::clone(&orchestrator);
        let second = Arc::clone(&orchestrator);
        let (a, b) = tokio::join!(
            tokio::spawn(async move { first.run(items(6)).await }),
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                second.run(items(3)).await
            }),
        );
        assert_eq!(a.unwrap().unwrap().total(), 6);
        assert_eq!(b.unwrap().unwrap().total(), 3);
        drop(orchestrator);
        let seen = observer.await.unwrap();

        // Each batch occupies one contiguous stretch of the stream.
        let mut totals: Vec<usize> = seen.iter().map(|s| s.total).collect();
        totals.dedup();
        assert_eq!(totals.len(), 2, "interleaved batches: {seen:?}");
        assert!(totals.contains(&6) && totals.contains(&3));
        for pair in seen.windows(2) {
            if pair[0].total == pair[1].total {
                assert!(pair[0].completed <= pair[1].completed, "went backwards: {seen:?}");
            }
        }
        let last = seen.last().unwrap();
        assert!(last.is_settled());
    }

    #[tokio::test]
    async fn test_progress_handle_waits_for_running_batch() {
        let orchestrator = Arc::new(delayed(1));
        let first = Arc::clone(&orchestrator);
        let running = tokio::spawn(async move { first.run(items(4)).await });
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;

        let second = Arc::clone(&orchestrator);
        let queued = tokio::spawn(async move { second.run(items(2)).await });
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        assert_eq!(orchestrator.progress().snapshot().total, 4);

        running.await.unwrap().unwrap();
        queued.await.unwrap().unwrap();
        assert_eq!(orchestrator.progress().snapshot(), ProgressSnapshot::new(2, 2));
    }

    #[tokio::test]
    async fn test_peak_in_flight_bounded_by_limit() {
        let orchestrator = orchestrator(2);
        let report = orchestrator.run(items(6)).await.unwrap();
        assert!(report.peak_in_flight >= 1);
        assert!(report.peak_in_flight <= 2);
        assert_eq!(orchestrator.config().concurrency_limit, 2);
    }
}
