//! In-memory fakes for the capability traits, shared by unit tests across
//! this crate. Never compiled outside `#[cfg(test)]`.

use crate::denylist::Denylist;
use crate::error::{OrchestrationError, PersistenceError};
use crate::orchestration::{DoneConsumer, DoneNotification, JobConsumer, Orchestration};
use crate::persistence::{check_status_matches, Persistence};
use crate::scanner::{BulkScanWorker, JobOutcome, ProgressConsumer, ScannerFactory};
use async_trait::async_trait;
use crawler_core::{
    BulkScan, BulkScanInfo, Document, JobStatus, ScanConfig, ScanDetail, ScanJobDescription, ScanResult, ScanTarget,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

pub fn job_description_for_test(bulk_scan_id: &str) -> ScanJobDescription {
    let target = ScanTarget::new(None, Some("127.0.0.1".parse::<IpAddr>().unwrap()), 443, None);
    let info = BulkScanInfo {
        bulk_scan_id: bulk_scan_id.to_string(),
        scan_config: ScanConfig::new(1_000, 0, ScanDetail::Normal),
        monitored: true,
    };
    ScanJobDescription::new(target, info, "testdb".into(), "testcoll".into(), JobStatus::ToBeExecuted)
}

/// Records every document store call in memory; never errors.
#[derive(Default)]
pub struct InMemoryPersistence {
    pub bulk_scans: Mutex<HashMap<String, BulkScan>>,
    pub results: Mutex<Vec<ScanResult>>,
    next_id: AtomicU64,
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn insert_bulk_scan(&self, scan: &mut BulkScan) -> Result<(), PersistenceError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        scan.id = Some(id.clone());
        self.bulk_scans.lock().insert(id, scan.clone());
        Ok(())
    }

    async fn update_bulk_scan(&self, scan: &BulkScan) -> Result<(), PersistenceError> {
        let id = scan.id.clone().ok_or_else(|| PersistenceError::Rejected {
            operation: "update_bulk_scan",
            reason: "scan has no assigned id".into(),
        })?;
        self.bulk_scans.lock().insert(id, scan.clone());
        Ok(())
    }

    async fn insert_scan_result(
        &self,
        result: ScanResult,
        job: &ScanJobDescription,
    ) -> Result<ScanResult, PersistenceError> {
        check_status_matches(&result, job)?;
        self.results.lock().push(result.clone());
        Ok(result)
    }
}

type Subscriptions = Mutex<HashMap<String, DoneConsumer>>;

/// Routes publishes straight to registered consumers, synchronously, with
/// no network or serialization involved.
#[derive(Default)]
pub struct InMemoryOrchestration {
    pub published_jobs: Mutex<Vec<ScanJobDescription>>,
    pub acked: Mutex<Vec<u64>>,
    pub notifications: Mutex<Vec<DoneNotification>>,
    job_consumer: Mutex<Option<JobConsumer>>,
    done_consumers: Subscriptions,
    next_tag: AtomicU64,
}

#[async_trait]
impl Orchestration for InMemoryOrchestration {
    async fn publish_scan_job(&self, job: &ScanJobDescription) -> Result<(), OrchestrationError> {
        let tag = self.next_tag.fetch_add(1, Ordering::SeqCst);
        let job = job.clone().with_delivery_tag(tag);
        self.published_jobs.lock().push(job.clone());
        if let Some(consumer) = self.job_consumer.lock().clone() {
            consumer(job);
        }
        Ok(())
    }

    async fn register_scan_job_consumer(&self, _prefetch: u16, consumer: JobConsumer) -> Result<(), OrchestrationError> {
        *self.job_consumer.lock() = Some(consumer);
        Ok(())
    }

    async fn register_done_notification_consumer(
        &self,
        bulk_scan_id: &str,
        consumer: DoneConsumer,
    ) -> Result<(), OrchestrationError> {
        self.done_consumers.lock().insert(bulk_scan_id.to_string(), consumer);
        Ok(())
    }

    async fn notify_of_done_scan_job(&self, notification: DoneNotification) -> Result<(), OrchestrationError> {
        self.notifications.lock().push(notification.clone());
        if let Some(consumer) = self.done_consumers.lock().get(&notification.bulk_scan_id).cloned() {
            consumer(notification);
        }
        Ok(())
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), OrchestrationError> {
        self.acked.lock().push(delivery_tag);
        Ok(())
    }

    async fn close_connection(&self) -> Result<(), OrchestrationError> {
        Ok(())
    }
}

/// Always permits every target.
pub struct NoDenylist;

impl Denylist for NoDenylist {
    fn check(&self, _hostname: Option<&str>, _ip: IpAddr) -> Option<crawler_core::DenylistReason> {
        None
    }
}

/// A worker that returns a fixed outcome and otherwise does nothing.
pub struct FixedOutcomeWorker {
    pub outcome: Mutex<Option<JobOutcome>>,
}

impl FixedOutcomeWorker {
    pub fn new(outcome: JobOutcome) -> Self {
        Self { outcome: Mutex::new(Some(outcome)) }
    }
}

#[async_trait]
impl BulkScanWorker for FixedOutcomeWorker {
    async fn init(&self) {}
    async fn cleanup(&self) {}
    async fn scan(&self, _job: &ScanJobDescription, _on_progress: ProgressConsumer) -> JobOutcome {
        self.outcome.lock().take().unwrap_or(JobOutcome::Empty)
    }
}

/// A worker that never returns, for timeout-path tests.
pub struct HangingWorker;

#[async_trait]
impl BulkScanWorker for HangingWorker {
    async fn init(&self) {}
    async fn cleanup(&self) {}
    async fn scan(&self, _job: &ScanJobDescription, _on_progress: ProgressConsumer) -> JobOutcome {
        std::future::pending::<()>().await;
        unreachable!()
    }
}

/// Counts holder creations; every holder returned is a no-op success worker.
#[derive(Default)]
pub struct NoopScannerFactory {
    created: AtomicUsize,
}

impl NoopScannerFactory {
    pub fn holders_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl ScannerFactory for NoopScannerFactory {
    fn create_worker(&self, _bulk_scan_id: &str, _pc: usize, _ps: usize) -> Arc<dyn BulkScanWorker> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Arc::new(FixedOutcomeWorker::new(JobOutcome::Empty))
    }
}

/// Records the target port of every job it scans, to verify task-local
/// isolation under concurrent dispatch.
pub struct ObservingScannerFactory {
    observed: Arc<Mutex<Vec<u16>>>,
}

impl Default for ObservingScannerFactory {
    fn default() -> Self {
        Self { observed: Arc::new(Mutex::new(Vec::new())) }
    }
}

impl ObservingScannerFactory {
    pub fn observed_ports(&self) -> Vec<u16> {
        self.observed.lock().clone()
    }
}

struct ObservingWorker {
    observed: Arc<Mutex<Vec<u16>>>,
}

#[async_trait]
impl BulkScanWorker for ObservingWorker {
    async fn init(&self) {}
    async fn cleanup(&self) {}
    async fn scan(&self, job: &ScanJobDescription, _on_progress: ProgressConsumer) -> JobOutcome {
        tokio::task::yield_now().await;
        let current = crate::bulk_scan_worker::current_job_description();
        assert_eq!(current.map(|j| j.scan_target.port), Some(job.scan_target.port));
        self.observed.lock().push(job.scan_target.port);
        JobOutcome::Empty
    }
}

impl ScannerFactory for ObservingScannerFactory {
    fn create_worker(&self, _bulk_scan_id: &str, _pc: usize, _ps: usize) -> Arc<dyn BulkScanWorker> {
        Arc::new(ObservingWorker { observed: self.observed.clone() })
    }
}

pub fn empty_document() -> Document {
    serde_json::json!({})
}

/// Counts `init`/`cleanup` calls on a single worker; every scan returns
/// `JobOutcome::Empty`, optionally after waiting on a `Notify` so a test can
/// hold a job inflight deliberately.
pub struct CountingWorker {
    pub init_calls: Arc<AtomicUsize>,
    pub cleanup_calls: Arc<AtomicUsize>,
    gate: Option<Arc<tokio::sync::Notify>>,
}

#[async_trait]
impl BulkScanWorker for CountingWorker {
    async fn init(&self) {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
    }
    async fn cleanup(&self) {
        self.cleanup_calls.fetch_add(1, Ordering::SeqCst);
    }
    async fn scan(&self, _job: &ScanJobDescription, _on_progress: ProgressConsumer) -> JobOutcome {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        JobOutcome::Empty
    }
}

/// Hands out `CountingWorker`s sharing the same counters regardless of
/// `bulk_scan_id`, so a test can track init/cleanup across a holder's whole
/// lifecycle.
#[derive(Default)]
pub struct CountingScannerFactory {
    pub init_calls: Arc<AtomicUsize>,
    pub cleanup_calls: Arc<AtomicUsize>,
    pub gate: Option<Arc<tokio::sync::Notify>>,
}

impl ScannerFactory for CountingScannerFactory {
    fn create_worker(&self, _bulk_scan_id: &str, _pc: usize, _ps: usize) -> Arc<dyn BulkScanWorker> {
        Arc::new(CountingWorker {
            init_calls: self.init_calls.clone(),
            cleanup_calls: self.cleanup_calls.clone(),
            gate: self.gate.clone(),
        })
    }
}
