//! The scanner capability boundary.
//!
//! Everything in this module is a trait the concrete TLS-scanning engine
//! implements outside this crate; `crawler` itself never looks inside a
//! result document or a `BulkScanWorker`'s internals. This is the
//! capability-interface redesign the component design calls for in place
//! of a dynamic "abstract factory" plug-in.
//!
//! The concurrent TCP-connect scanning engine that used to live in this
//! module (`actions`, `formatter`, `buffer_pool`) implemented the scan
//! engine itself, which is explicitly out of scope and has been removed.

use async_trait::async_trait;
use crawler_core::{Document, ScanJobDescription};
use std::sync::Arc;

/// Callback a `BulkScanWorker` may invoke mid-scan with a partial result.
/// The core never interprets what's inside — it exists purely to be
/// forwarded to whatever is consuming progress externally.
pub type ProgressConsumer = Arc<dyn Fn(Document) + Send + Sync>;

/// The tagged outcome a scan attempt produces, replacing exceptions as
/// control flow (see the component design's redesign note). A single
/// classifier in `worker.rs` maps this, plus the Worker's own
/// timeout/interruption handling, onto a `JobStatus`.
pub enum JobOutcome {
    Success(Document),
    Empty,
    Error(Document),
    CrawlerError(Document),
}

/// Per-bulk-scan holder of scanner resources (pools, warm state).
///
/// Exactly one holder exists per bulk-scan id within a process for its
/// lifetime, owned by [`crate::bulk_scan_worker::BulkScanWorkerManager`].
/// `init` and `cleanup` are each called exactly once by the manager; a
/// `BulkScanWorker` implementation does not need to guard against repeat
/// calls itself.
#[async_trait]
pub trait BulkScanWorker: Send + Sync {
    /// Called once by the manager, before the holder's first job.
    async fn init(&self);

    /// Releases scanner resources. Called once, when the manager
    /// determines the holder's inflight count has dropped back to zero
    /// after being self-triggered.
    async fn cleanup(&self);

    /// Runs the scan for one job. May invoke `on_progress` any number of
    /// times with partial documents before returning the final outcome.
    async fn scan(&self, job: &ScanJobDescription, on_progress: ProgressConsumer) -> JobOutcome;
}

/// Constructs a [`BulkScanWorker`] for a bulk scan, sized to the requested
/// connection/scan thread counts. `ScanConfig::createWorker(...)` in the
/// component design's original form; here it's a capability injected
/// through configuration rather than looked up dynamically.
pub trait ScannerFactory: Send + Sync {
    fn create_worker(
        &self,
        bulk_scan_id: &str,
        parallel_connection_threads: usize,
        parallel_scan_threads: usize,
    ) -> Arc<dyn BulkScanWorker>;
}
