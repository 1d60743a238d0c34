//! Uniform wrapper around a single stage call.

use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::stages::{StageFailure, StageKind};

/// Runs one stage call, converting every way it can go wrong into a
/// [`StageFailure`] for that stage.
///
/// - an `Err` from the collaborator becomes [`FailureKind::Rejected`](crate::stages::FailureKind::Rejected)
///   carrying the full context chain;
/// - exceeding `timeout` becomes `TimedOut` and drops the call;
/// - a panic becomes `Panicked`.
pub async fn invoke_stage<T, F>(
    stage: StageKind,
    timeout: Option<Duration>,
    call: F,
) -> Result<T, StageFailure>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let started = Instant::now();
    let guarded = AssertUnwindSafe(call).catch_unwind();

    let settled = match timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(settled) => settled,
            Err(_) => {
                warn!(stage = %stage, timeout_ms = limit.as_millis() as u64, "Stage timed out");
                return Err(StageFailure::timed_out(stage, limit));
            }
        },
        None => guarded.await,
    };

    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    match settled {
        Ok(Ok(value)) => {
            debug!(stage = %stage, duration_ms, "Stage completed");
            Ok(value)
        }
        Ok(Err(error)) => {
            let message = format!("{error:#}");
            warn!(stage = %stage, duration_ms, error = %message, "Stage failed");
            Err(StageFailure::rejected(stage, message))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!(stage = %stage, duration_ms, panic = %message, "Stage panicked");
            Err(StageFailure::panicked(stage, message))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "stage panicked".to_string()
    }
}
