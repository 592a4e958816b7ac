//! The long-lived job consumer.
//!
//! One `Worker` registers a single broker consumer with `prefetch` equal to
//! its own bounded executor size, then classifies and persists exactly one
//! result per delivered job, in the outcome-classification order the
//! component design lays out.

use crate::bulk_scan_worker::BulkScanWorkerManager;
use crate::error::WorkerError;
use crate::orchestration::{DoneNotification, Orchestration};
use crate::persistence::Persistence;
use crate::scanner::JobOutcome;
use crawler_core::document::exception_document;
use crawler_core::{Document, JobStatus, ScanJobDescription, ScanResult};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct WorkerConfig {
    pub parallel_scan_threads: usize,
    pub parallel_connection_threads: usize,
    pub scan_timeout: Duration,
}

/// A long-lived consumer over one job queue.
pub struct Worker {
    persistence: Arc<dyn Persistence>,
    orchestration: Arc<dyn Orchestration>,
    manager: Arc<BulkScanWorkerManager>,
    config: WorkerConfig,
    executor_permits: Arc<Semaphore>,
    shutdown: CancellationToken,
}

/// What to do with a classified job outcome, before ack/notify.
enum Classified {
    Persist(JobStatus, Document),
    /// The scan was interrupted by shutdown before it ever produced an
    /// outcome: per the component design, this case is not persisted and
    /// not acked — only the done notification goes out, so the message
    /// stays on the broker for whichever worker picks it up next.
    Interrupted(JobStatus),
}

impl Worker {
    pub fn new(
        persistence: Arc<dyn Persistence>,
        orchestration: Arc<dyn Orchestration>,
        manager: Arc<BulkScanWorkerManager>,
        config: WorkerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let executor_permits = Arc::new(Semaphore::new(config.parallel_scan_threads.max(1)));
        Self { persistence, orchestration, manager, config, executor_permits, shutdown }
    }

    /// Registers the broker consumer. Every delivered job is dispatched to
    /// its own task, bounded by `executor_permits`; the broker's own
    /// `prefetch` of the same size keeps at most that many messages
    /// unacknowledged at once.
    pub async fn start(self: Arc<Self>) -> Result<(), WorkerError> {
        let prefetch = self.config.parallel_scan_threads.max(1) as u16;
        let worker = self.clone();
        self.orchestration
            .register_scan_job_consumer(
                prefetch,
                Arc::new(move |job| {
                    let worker = worker.clone();
                    tokio::spawn(async move { worker.handle_scan_job(job).await });
                }),
            )
            .await?;
        Ok(())
    }

    /// Runs the per-job procedure from the component design:
    /// dispatch → timeout-bounded wait → classify → persist → ack → notify.
    pub async fn handle_scan_job(&self, mut job: ScanJobDescription) {
        let permit = self
            .executor_permits
            .clone()
            .acquire_owned()
            .await
            .expect("executor semaphore is never closed while the worker runs");

        let classified = self.run_and_classify(&job).await;
        drop(permit);

        let interrupted = matches!(classified, Classified::Interrupted(_));
        let (status, document) = match classified {
            Classified::Persist(status, document) => (status, Some(document)),
            Classified::Interrupted(status) => (status, None),
        };
        job.status = status;

        if let Some(document) = document {
            let result = ScanResult::new(
                job.bulk_scan_info.bulk_scan_id.clone(),
                job.scan_target.clone(),
                status,
                document,
            );
            match self.persistence.insert_scan_result(result, &job).await {
                Ok(persisted) => job.status = persisted.job_status,
                Err(e) => {
                    warn!(error = %e, "insert_scan_result failed, downgrading to INTERNAL_ERROR");
                    job.status = JobStatus::InternalError;
                }
            }
        }

        if !interrupted {
            if let Some(delivery_tag) = job.delivery_tag {
                if let Err(e) = self.orchestration.ack(delivery_tag).await {
                    error!(error = %e, delivery_tag, "failed to ack scan job");
                }
            }
        }

        let notification = DoneNotification {
            bulk_scan_id: job.bulk_scan_info.bulk_scan_id.clone(),
            job_status: job.status,
            scan_target: job.scan_target.clone(),
        };
        if let Err(e) = self.orchestration.notify_of_done_scan_job(notification).await {
            error!(error = %e, "failed to publish done notification");
        }
    }

    async fn run_and_classify(&self, job: &ScanJobDescription) -> Classified {
        let manager = self.manager.clone();
        let job_for_scan = job.clone();
        let pc = self.config.parallel_connection_threads;
        let ps = self.config.parallel_scan_threads;
        let mut handle = tokio::spawn(async move { manager.handle(job_for_scan, pc, ps).await });

        tokio::select! {
            _ = self.shutdown.cancelled() => {
                handle.abort();
                Classified::Interrupted(JobStatus::InternalError)
            }
            outcome = tokio::time::timeout(self.config.scan_timeout, &mut handle) => {
                match outcome {
                    Ok(Ok(outcome)) => Self::classify_outcome(outcome),
                    Ok(Err(join_err)) => {
                        error!(error = %join_err, "scan task panicked");
                        Classified::Persist(
                            JobStatus::CrawlerError,
                            exception_document("panic", join_err.to_string()),
                        )
                    }
                    Err(_elapsed) => {
                        handle.abort();
                        // Second timed wait: give the scanner a chance to release
                        // resources cooperatively before we give up on it for good.
                        let _ = tokio::time::timeout(self.config.scan_timeout, handle).await;
                        Classified::Persist(
                            JobStatus::Cancelled,
                            exception_document("timeout", "scan timed out"),
                        )
                    }
                }
            }
        }
    }

    fn classify_outcome(outcome: JobOutcome) -> Classified {
        match outcome {
            JobOutcome::Success(doc) => Classified::Persist(JobStatus::Success, doc),
            JobOutcome::Empty => Classified::Persist(JobStatus::Empty, serde_json::json!({})),
            JobOutcome::Error(doc) => Classified::Persist(JobStatus::Error, doc),
            JobOutcome::CrawlerError(doc) => Classified::Persist(JobStatus::CrawlerError, doc),
        }
    }
}

pub fn log_worker_started(parallel_scan_threads: usize, parallel_connection_threads: usize) {
    info!(parallel_scan_threads, parallel_connection_threads, "worker registered with broker");
}
