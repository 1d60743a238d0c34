//! Settled-item counter with change notification.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::error;

/// Point-in-time view of batch progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Items that have settled.
    pub completed: usize,
    /// Items in the batch.
    pub total: usize,
}

impl ProgressSnapshot {
    /// Creates a snapshot.
    #[must_use]
    pub const fn new(completed: usize, total: usize) -> Self {
        Self { completed, total }
    }

    /// Returns true once every item has settled.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        self.completed >= self.total
    }

    /// Completion as a whole percentage, rounded down.
    #[must_use]
    pub const fn percent(&self) -> usize {
        if self.total == 0 {
            return 0;
        }
        self.completed * 100 / self.total
    }
}

/// Counts settled items and publishes every change.
///
/// Increments are serialized under a mutex, so concurrent [`advance`]
/// calls never lose an update and observers see each value in order.
///
/// [`advance`]: ProgressTracker::advance
#[derive(Debug)]
pub struct ProgressTracker {
    state: Mutex<ProgressSnapshot>,
    sender: Arc<watch::Sender<ProgressSnapshot>>,
}

impl ProgressTracker {
    /// Creates a tracker for `total` items.
    #[must_use]
    pub fn new(total: usize) -> Self {
        let (sender, _) = watch::channel(ProgressSnapshot::new(0, total));
        Self::with_sender(total, Arc::new(sender))
    }

    /// Creates a tracker that publishes on an existing channel.
    ///
    /// The channel is reset to `{0, total}` so subscribers from a previous
    /// batch see the new one start.
    #[must_use]
    pub fn with_sender(total: usize, sender: Arc<watch::Sender<ProgressSnapshot>>) -> Self {
        let initial = ProgressSnapshot::new(0, total);
        sender.send_replace(initial);
        Self {
            state: Mutex::new(initial),
            sender,
        }
    }

    /// Records one settled item and returns the new snapshot.
    ///
    /// Never moves `completed` past `total`; an extra call is logged and the
    /// snapshot is returned unchanged.
    pub fn advance(&self) -> ProgressSnapshot {
        let mut state = self.state.lock();
        if state.completed >= state.total {
            error!(
                completed = state.completed,
                total = state.total,
                "Progress advanced past batch size"
            );
            return *state;
        }
        state.completed += 1;
        let snapshot = *state;
        // Publish while holding the lock so observers see values in order.
        self.sender.send_replace(snapshot);
        snapshot
    }

    /// Reads the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.state.lock()
    }

    /// Subscribes to snapshot changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.sender.subscribe()
    }
}
