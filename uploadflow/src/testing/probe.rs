//! Concurrency probe for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct ProbeState {
    current: AtomicUsize,
    peak: AtomicUsize,
    entries: AtomicUsize,
}

/// Counts how many callers are inside a guarded region at once.
///
/// Clones share state, so one probe can be handed to several stubs.
#[derive(Debug, Clone, Default)]
pub struct InFlightProbe {
    state: Arc<ProbeState>,
}

impl InFlightProbe {
    /// Creates a probe with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks entry; the returned guard marks exit when dropped.
    pub fn enter(&self) -> ProbeGuard {
        let now = self.state.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(now, Ordering::SeqCst);
        self.state.entries.fetch_add(1, Ordering::SeqCst);
        ProbeGuard {
            state: Arc::clone(&self.state),
        }
    }

    /// Callers inside right now.
    #[must_use]
    pub fn current(&self) -> usize {
        self.state.current.load(Ordering::SeqCst)
    }

    /// Most callers ever inside at once.
    #[must_use]
    pub fn peak(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }

    /// Total number of entries.
    #[must_use]
    pub fn entries(&self) -> usize {
        self.state.entries.load(Ordering::SeqCst)
    }
}

/// Exit marker returned by [`InFlightProbe::enter`].
#[derive(Debug)]
pub struct ProbeGuard {
    state: Arc<ProbeState>,
}

impl Drop for ProbeGuard {
    fn drop(&mut self) {
        self.state.current.fetch_sub(1, Ordering::SeqCst);
    }
}
