//! Counting admission gate for in-flight pipelines.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::errors::{ConfigError, InvariantViolation};

struct LimiterInner {
    semaphore: Arc<Semaphore>,
    limit: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Bounds how many pipelines may run at once.
///
/// Waiters are admitted in arrival order. Cloning is cheap and every clone
/// shares the same permit pool.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    inner: Arc<LimiterInner>,
}

impl ConcurrencyLimiter {
    /// Creates a limiter that admits at most `limit` holders.
    pub fn new(limit: usize) -> Result<Self, ConfigError> {
        if limit == 0 {
            return Err(ConfigError::new(
                "concurrency_limit",
                "must be at least 1",
            ));
        }
        if limit > Semaphore::MAX_PERMITS {
            return Err(ConfigError::new(
                "concurrency_limit",
                format!("must not exceed {}", Semaphore::MAX_PERMITS),
            ));
        }
        Ok(Self {
            inner: Arc::new(LimiterInner {
                semaphore: Arc::new(Semaphore::new(limit)),
                limit,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        })
    }

    /// Waits for a free slot.
    ///
    /// Fails only if the underlying pool was closed, which the limiter never
    /// does itself.
    pub async fn acquire(&self) -> Result<Permit, InvariantViolation> {
        let permit = Arc::clone(&self.inner.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| InvariantViolation::new("concurrency limiter closed"))?;
        Ok(self.admit(permit))
    }

    /// Takes a slot if one is free right now.
    pub fn try_acquire(&self) -> Option<Permit> {
        Arc::clone(&self.inner.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| self.admit(permit))
    }

    fn admit(&self, permit: OwnedSemaphorePermit) -> Permit {
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);
        Permit {
            _permit: permit,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Maximum concurrent holders.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    /// Permits currently held.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Permits that could be granted without waiting.
    #[must_use]
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    /// Highest `in_flight` value observed since creation.
    #[must_use]
    pub fn peak_in_flight(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ConcurrencyLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrencyLimiter")
            .field("limit", &self.limit())
            .field("in_flight", &self.in_flight())
            .field("peak_in_flight", &self.peak_in_flight())
            .finish()
    }
}

/// Admission granted by a [`ConcurrencyLimiter`].
///
/// The slot is returned when the permit is dropped, on every exit path.
#[must_use = "dropping a permit releases its slot immediately"]
pub struct Permit {
    // Field drops after `Drop::drop`, so `in_flight` falls before the slot
    // becomes visible to waiters.
    _permit: OwnedSemaphorePermit,
    inner: Arc<LimiterInner>,
}

impl Permit {
    /// Releases the slot now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready, task};

    #[test]
    fn test_zero_limit_rejected() {
        let err = ConcurrencyLimiter::new(0).unwrap_err();
        assert_eq!(err.key, "concurrency_limit");
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let limiter = ConcurrencyLimiter::new(2).unwrap();
        assert_eq!(limiter.available(), 2);

        let first = limiter.acquire().await.unwrap();
        let second = limiter.acquire().await.unwrap();
        assert_eq!(limiter.in_flight(), 2);
        assert_eq!(limiter.available(), 0);
        assert!(limiter.try_acquire().is_none());

        first.release();
        assert_eq!(limiter.in_flight(), 1);
        assert_eq!(limiter.available(), 1);

        drop(second);
        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.peak_in_flight(), 2);
    }

    #[test]
    fn test_excess_caller_suspends_until_release() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        let held = limiter.try_acquire().unwrap();

        let mut waiter = task::spawn(limiter.acquire());
        assert_pending!(waiter.poll());

        held.release();
        assert!(waiter.is_woken());
        let permit = assert_ready!(waiter.poll()).unwrap();
        assert_eq!(limiter.in_flight(), 1);
        drop(permit);
    }

    #[test]
    fn test_waiters_admitted_in_arrival_order() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        let held = limiter.try_acquire().unwrap();

        let mut first = task::spawn(limiter.acquire());
        let mut second = task::spawn(limiter.acquire());
        assert_pending!(first.poll());
        assert_pending!(second.poll());

        held.release();
        // Only the earliest waiter may take the freed slot.
        assert_pending!(second.poll());
        let permit = assert_ready!(first.poll()).unwrap();

        drop(permit);
        let last = assert_ready!(second.poll()).unwrap();
        assert_eq!(limiter.in_flight(), 1);
        drop(last);
        assert_eq!(limiter.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_permit_released_when_task_panics() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        let permit = limiter.acquire().await.unwrap();

        let handle = tokio::spawn(async move {
            let _permit = permit;
            panic!("holder failed");
        });
        assert!(handle.await.is_err());

        assert_eq!(limiter.in_flight(), 0);
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test]
    async fn test_clones_share_pool() {
        let limiter = ConcurrencyLimiter::new(3).unwrap();
        let clone = limiter.clone();
        let _permit = clone.acquire().await.unwrap();
        assert_eq!(limiter.in_flight(), 1);
        assert_eq!(limiter.available(), 2);
    }
}
