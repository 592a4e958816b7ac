//! Per-process, per-bulk-scan holder cache.
//!
//! Generalizes the concurrency pattern from the teacher's own
//! `scanner::Scanner`/`ActiveTasksGuard`/`execute_tasks` design (bounded
//! `Semaphore`, an RAII guard that decrements a counter on every exit path,
//! `Notify`-driven wakeups) from "run a bounded batch of TCP connects" to
//! "run a bounded batch of dispatched scan jobs against a lazily
//! constructed, bulk-scan-scoped resource holder."

use crate::scanner::{BulkScanWorker, JobOutcome, ScannerFactory};
use crawler_core::ScanJobDescription;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::debug;

tokio::task_local! {
    static CURRENT_JOB: std::cell::RefCell<Option<ScanJobDescription>>;
}

/// Returns the job currently being scanned on this task, if any.
///
/// Only meaningful while inside [`BulkScanWorkerManager::handle`]'s scoped
/// call to the holder's `scan`; returns `None` everywhere else, including
/// after `scan` has returned on the same task.
pub fn current_job_description() -> Option<ScanJobDescription> {
    CURRENT_JOB.try_with(|cell| cell.borrow().clone()).ok().flatten()
}

struct Holder {
    worker: Arc<dyn BulkScanWorker>,
    scan_permits: Arc<Semaphore>,
    inflight: AtomicUsize,
    init_started: Mutex<bool>,
    /// Set once the holder has been told no more jobs are coming for its
    /// bulk scan. Inflight returning to zero is not by itself a signal that
    /// the bulk scan is done — jobs routinely complete in bursts with gaps
    /// between them — so cleanup only runs once both this and inflight == 0
    /// are true.
    closing: AtomicBool,
    cleaned_up: AtomicBool,
}

impl Holder {
    fn new(worker: Arc<dyn BulkScanWorker>, parallel_scan_threads: usize) -> Self {
        Self {
            worker,
            scan_permits: Arc::new(Semaphore::new(parallel_scan_threads.max(1))),
            inflight: AtomicUsize::new(0),
            init_started: Mutex::new(false),
            closing: AtomicBool::new(false),
            cleaned_up: AtomicBool::new(false),
        }
    }

    async fn ensure_init(&self) {
        let mut started = self.init_started.lock().await;
        if !*started {
            self.worker.init().await;
            *started = true;
        }
    }

    /// Runs `cleanup()` at most once for this holder, no matter how many
    /// times it is asked to.
    async fn cleanup_once(&self) {
        if self.cleaned_up.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok() {
            self.worker.cleanup().await;
        }
    }
}

/// Per-process singleton that de-duplicates and owns scanner-resource
/// holders, keyed by bulk-scan id.
pub struct BulkScanWorkerManager {
    factory: Arc<dyn ScannerFactory>,
    holders: Mutex<HashMap<String, Arc<Holder>>>,
}

impl BulkScanWorkerManager {
    pub fn new(factory: Arc<dyn ScannerFactory>) -> Self {
        Self {
            factory,
            holders: Mutex::new(HashMap::new()),
        }
    }

    async fn holder_for(
        &self,
        bulk_scan_id: &str,
        parallel_connection_threads: usize,
        parallel_scan_threads: usize,
    ) -> Arc<Holder> {
        let mut holders = self.holders.lock().await;
        if let Some(holder) = holders.get(bulk_scan_id) {
            return holder.clone();
        }
        let worker = self
            .factory
            .create_worker(bulk_scan_id, parallel_connection_threads, parallel_scan_threads);
        let holder = Arc::new(Holder::new(worker, parallel_scan_threads));
        holders.insert(bulk_scan_id.to_string(), holder.clone());
        holder
    }

    /// Dispatches `job` to its bulk scan's holder, constructing and
    /// lazily initializing the holder on first use. The returned outcome
    /// comes from the holder's `scan`, wrapped so that
    /// [`current_job_description`] observes the right job for the
    /// duration of the call and nothing afterward.
    pub async fn handle(
        &self,
        job: ScanJobDescription,
        parallel_connection_threads: usize,
        parallel_scan_threads: usize,
    ) -> JobOutcome {
        let bulk_scan_id = job.bulk_scan_info.bulk_scan_id.clone();
        let holder = self
            .holder_for(&bulk_scan_id, parallel_connection_threads, parallel_scan_threads)
            .await;
        holder.ensure_init().await;

        let permit = holder
            .scan_permits
            .clone()
            .acquire_owned()
            .await
            .expect("scan semaphore is never closed while a holder is alive");
        holder.inflight.fetch_add(1, Ordering::SeqCst);

        let worker = holder.worker.clone();
        let on_progress: crate::scanner::ProgressConsumer = Arc::new(|_doc| {});
        let job_for_scope = job.clone();

        let outcome = CURRENT_JOB
            .scope(std::cell::RefCell::new(Some(job_for_scope)), async {
                worker.scan(&job, on_progress).await
            })
            .await;

        drop(permit);
        let remaining = holder.inflight.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && holder.closing.load(Ordering::SeqCst) {
            debug!(bulk_scan_id, "last inflight job finished after close_bulk_scan, cleaning up");
            holder.cleanup_once().await;
        }

        outcome
    }

    /// Signals that no more jobs will be dispatched for `bulk_scan_id` — the
    /// owning bulk scan has finalized (or the process is shutting down).
    /// Safe to call more than once, and safe to call while jobs for this
    /// bulk scan are still inflight: cleanup runs exactly once, either here
    /// (if nothing is inflight) or from the last `handle` call to finish.
    ///
    /// Callers must only invoke this once the bulk scan is genuinely done —
    /// it does not itself know whether more jobs might still be published
    /// for this id.
    pub async fn close_bulk_scan(&self, bulk_scan_id: &str) {
        let holder = {
            let holders = self.holders.lock().await;
            holders.get(bulk_scan_id).cloned()
        };
        let Some(holder) = holder else { return };

        holder.closing.store(true, Ordering::SeqCst);
        if holder.inflight.load(Ordering::SeqCst) == 0 {
            holder.cleanup_once().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{job_description_for_test, NoopScannerFactory};

    #[tokio::test]
    async fn handle_creates_exactly_one_holder_per_bulk_scan_id() {
        let factory = Arc::new(NoopScannerFactory::default());
        let manager = BulkScanWorkerManager::new(factory.clone());

        let job_a = job_description_for_test("bulk-1");
        let job_b = job_description_for_test("bulk-1");
        let job_c = job_description_for_test("bulk-2");

        manager.handle(job_a, 1, 1).await;
        manager.handle(job_b, 1, 1).await;
        manager.handle(job_c, 1, 1).await;

        assert_eq!(factory.holders_created(), 2);
    }

    #[tokio::test]
    async fn current_job_description_is_cleared_outside_handle() {
        assert!(current_job_description().is_none());

        let factory = Arc::new(NoopScannerFactory::default());
        let manager = BulkScanWorkerManager::new(factory);
        manager.handle(job_description_for_test("bulk-1"), 1, 1).await;

        assert!(current_job_description().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_jobs_each_observe_their_own_job_id() {
        use crate::testing::ObservingScannerFactory;

        let factory = Arc::new(ObservingScannerFactory::default());
        let manager = Arc::new(BulkScanWorkerManager::new(factory.clone()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let manager = manager.clone();
            let mut job = job_description_for_test("bulk-shared");
            job.scan_target.port = 1000 + i;
            handles.push(tokio::spawn(async move {
                manager.handle(job, 2, 2).await;
            }));
        }

        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(factory.observed_ports().len(), 5);
    }

    #[tokio::test]
    async fn cleanup_does_not_fire_on_a_transient_return_to_zero_inflight() {
        use crate::testing::CountingScannerFactory;

        let factory = Arc::new(CountingScannerFactory::default());
        let manager = BulkScanWorkerManager::new(factory.clone());

        manager.handle(job_description_for_test("bulk-1"), 1, 1).await;
        assert_eq!(factory.init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(factory.cleanup_calls.load(Ordering::SeqCst), 0, "inflight reaching zero must not trigger cleanup by itself");

        // A second job for the same bulk scan reuses the same holder: init
        // must not run again, proving the holder was never torn down.
        manager.handle(job_description_for_test("bulk-1"), 1, 1).await;
        assert_eq!(factory.init_calls.load(Ordering::SeqCst), 1);
        assert_eq!(factory.cleanup_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn close_bulk_scan_cleans_up_exactly_once_even_if_called_twice() {
        use crate::testing::CountingScannerFactory;

        let factory = Arc::new(CountingScannerFactory::default());
        let manager = BulkScanWorkerManager::new(factory.clone());

        manager.handle(job_description_for_test("bulk-1"), 1, 1).await;
        manager.close_bulk_scan("bulk-1").await;
        manager.close_bulk_scan("bulk-1").await;

        assert_eq!(factory.cleanup_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_bulk_scan_while_a_job_is_still_inflight_waits_for_it_to_finish() {
        use crate::testing::CountingScannerFactory;

        let gate = Arc::new(tokio::sync::Notify::new());
        let factory = Arc::new(CountingScannerFactory {
            init_calls: Arc::new(AtomicUsize::new(0)),
            cleanup_calls: Arc::new(AtomicUsize::new(0)),
            gate: Some(gate.clone()),
        });
        let manager = Arc::new(BulkScanWorkerManager::new(factory.clone()));

        let inflight_manager = manager.clone();
        let handle = tokio::spawn(async move {
            inflight_manager.handle(job_description_for_test("bulk-1"), 1, 1).await;
        });

        // Wait for the job to actually be dispatched before closing.
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        manager.close_bulk_scan("bulk-1").await;
        assert_eq!(factory.cleanup_calls.load(Ordering::SeqCst), 0, "must not clean up while the job is still inflight");

        gate.notify_one();
        handle.await.unwrap();
        assert_eq!(factory.cleanup_calls.load(Ordering::SeqCst), 1);
    }
}
