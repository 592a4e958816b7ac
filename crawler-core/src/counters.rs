//! Per-bulk-scan atomic job counters.

use crate::status::JobStatus;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Concurrent per-status counters for a single bulk scan.
///
/// One atomic per terminal [`JobStatus`] plus `total_done`. `total_done` is
/// always the sum of the per-status counters — enforced by only ever
/// incrementing both together in [`BulkScanJobCounters::increment`].
#[derive(Debug)]
pub struct BulkScanJobCounters {
    counts: [AtomicU64; JobStatus::TERMINAL.len()],
    total_done: AtomicU64,
}

impl Default for BulkScanJobCounters {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkScanJobCounters {
    pub fn new() -> Self {
        Self {
            counts: std::array::from_fn(|_| AtomicU64::new(0)),
            total_done: AtomicU64::new(0),
        }
    }

    fn index_of(status: JobStatus) -> usize {
        JobStatus::TERMINAL
            .iter()
            .position(|s| *s == status)
            .expect("increment() called with a non-terminal JobStatus")
    }

    /// Increments the counter for `status` and `total_done`. Panics if
    /// `status` is `ToBeExecuted` — callers only ever record terminal
    /// outcomes here.
    pub fn increment(&self, status: JobStatus) {
        let idx = Self::index_of(status);
        self.counts[idx].fetch_add(1, Ordering::SeqCst);
        self.total_done.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self, status: JobStatus) -> u64 {
        self.counts[Self::index_of(status)].load(Ordering::SeqCst)
    }

    pub fn total_done(&self) -> u64 {
        self.total_done.load(Ordering::SeqCst)
    }

    /// Point-in-time snapshot suitable for persisting onto a `BulkScan`
    /// record. Not atomic as a whole — callers take it after the quorum
    /// check, per the finalization ordering the monitor guarantees.
    pub fn snapshot(&self) -> CounterSnapshot {
        let mut by_status = HashMap::with_capacity(JobStatus::TERMINAL.len());
        for status in JobStatus::TERMINAL {
            by_status.insert(status, self.get(status));
        }
        CounterSnapshot { by_status }
    }
}

/// An immutable, serializable snapshot of [`BulkScanJobCounters`], stored on
/// `BulkScan::job_status_counters` once the bulk scan finalizes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CounterSnapshot {
    by_status: HashMap<JobStatus, u64>,
}

impl CounterSnapshot {
    pub fn get(&self, status: JobStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.by_status.values().sum()
    }
}
