//! Dispatcher counters.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct DispatcherStats {
    pub total_submitted: AtomicU64,
    pub total_resolved: AtomicU64,
    pub total_retried: AtomicU64,
    pub total_rejected: AtomicU64,
    pub total_evicted: AtomicU64,
    /// Broadcasts for ids that were not pending.
    pub total_ignored: AtomicU64,
    /// Settled tasks whose caller had already gone away.
    pub total_abandoned: AtomicU64,
}

/// Point-in-time copy of [`DispatcherStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub submitted: u64,
    pub resolved: u64,
    pub retried: u64,
    pub rejected: u64,
    pub evicted: u64,
    pub ignored: u64,
    pub abandoned: u64,
    pub pending: u64,
}

impl DispatcherStats {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self, pending: usize) -> StatsSnapshot {
        StatsSnapshot {
            submitted: self.total_submitted.load(Ordering::Relaxed),
            resolved: self.total_resolved.load(Ordering::Relaxed),
            retried: self.total_retried.load(Ordering::Relaxed),
            rejected: self.total_rejected.load(Ordering::Relaxed),
            evicted: self.total_evicted.load(Ordering::Relaxed),
            ignored: self.total_ignored.load(Ordering::Relaxed),
            abandoned: self.total_abandoned.load(Ordering::Relaxed),
            pending: pending as u64,
        }
    }
}
