//! Per-process aggregator that tracks bulk scans to completion.
//!
//! One `ProgressMonitor` instance is shared by every bulk scan a process is
//! running; it multiplexes done-notifications across all of them by
//! bulk-scan id.

use crate::error::PersistenceError;
use crate::notify::NotificationSink;
use crate::orchestration::{DoneNotification, Orchestration};
use crate::persistence::Persistence;
use chrono::Utc;
use crawler_core::counters::BulkScanJobCounters;
use crawler_core::{BulkScan, JobStatus};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

struct Entry {
    bulk_scan: Arc<Mutex<BulkScan>>,
    counters: BulkScanJobCounters,
    started_at: Instant,
}

/// Aggregates done-notifications into per-status counters and finalizes a
/// bulk scan once its expected total is reached.
pub struct ProgressMonitor {
    persistence: Arc<dyn Persistence>,
    orchestration: Arc<dyn Orchestration>,
    notifier: Arc<dyn NotificationSink>,
    entries: Mutex<HashMap<String, Arc<Entry>>>,
}

impl ProgressMonitor {
    pub fn new(
        persistence: Arc<dyn Persistence>,
        orchestration: Arc<dyn Orchestration>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { persistence, orchestration, notifier, entries: Mutex::new(HashMap::new()) }
    }

    /// Registers `bulk_scan` for tracking and subscribes to its done channel.
    /// The bulk scan must already carry an assigned id.
    ///
    /// `bulk_scan` is a handle shared with the caller (the Controller keeps
    /// its own clone and keeps incrementing `targetsGiven`/`scanJobsPublished`
    /// and friends on it as it publishes jobs) — this entry and the
    /// Controller's loop observe the exact same counters, so
    /// `expected_total()` is never computed against a stale all-zero
    /// snapshot taken before publishing started.
    pub async fn start_monitoring(
        self: &Arc<Self>,
        bulk_scan: Arc<Mutex<BulkScan>>,
    ) -> Result<(), PersistenceError> {
        let bulk_scan_id = bulk_scan.lock().id.clone().ok_or_else(|| PersistenceError::Rejected {
            operation: "start_monitoring",
            reason: "bulk scan has no assigned id".into(),
        })?;

        let entry = Arc::new(Entry { bulk_scan, counters: BulkScanJobCounters::new(), started_at: Instant::now() });
        self.entries.lock().insert(bulk_scan_id.clone(), entry);

        let monitor = self.clone();
        let id_for_consumer = bulk_scan_id.clone();
        self.orchestration
            .register_done_notification_consumer(
                &bulk_scan_id,
                Arc::new(move |notification| {
                    let monitor = monitor.clone();
                    let id = id_for_consumer.clone();
                    tokio::spawn(async move { monitor.on_done_notification(&id, notification).await });
                }),
            )
            .await
            .map_err(|e| PersistenceError::Connection(e.to_string()))?;

        Ok(())
    }

    /// Whether any bulk scan is currently being tracked. The Cron Gate polls
    /// this to decide whether it is safe to tear down the scheduler.
    pub fn has_active_bulk_scans(&self) -> bool {
        !self.entries.lock().is_empty()
    }

    pub async fn on_done_notification(&self, bulk_scan_id: &str, notification: DoneNotification) {
        let entry = {
            let entries = self.entries.lock();
            match entries.get(bulk_scan_id) {
                Some(entry) => entry.clone(),
                None => {
                    warn!(bulk_scan_id, "done notification for unknown or already-finalized bulk scan");
                    return;
                }
            }
        };

        entry.counters.increment(notification.job_status);
        self.log_throughput(bulk_scan_id, &entry);

        let (expected, total_done) = {
            let bulk_scan = entry.bulk_scan.lock();
            (bulk_scan.expected_total(), entry.counters.total_done())
        };

        if total_done >= expected {
            self.finalize(bulk_scan_id).await;
        }
    }

    /// Finalizes a bulk scan as if quorum had been reached, regardless of
    /// the counters — used for scheduler-driven shutdown.
    pub async fn stop_monitoring_and_finalize(&self, bulk_scan_id: &str) {
        self.finalize(bulk_scan_id).await;
    }

    async fn finalize(&self, bulk_scan_id: &str) {
        let entry = {
            let mut entries = self.entries.lock();
            match entries.remove(bulk_scan_id) {
                Some(entry) => entry,
                None => return,
            }
        };

        let snapshot = entry.counters.snapshot();
        let finalized = {
            let mut bulk_scan = entry.bulk_scan.lock();
            bulk_scan.finished = true;
            bulk_scan.end_time = Some(Utc::now());
            bulk_scan.successful_scans = snapshot.get(JobStatus::Success);
            bulk_scan.job_status_counters = Some(snapshot);
            bulk_scan.clone()
        };

        if let Err(e) = self.persistence.update_bulk_scan(&finalized).await {
            warn!(bulk_scan_id, error = %e, "failed to persist finalized bulk scan");
        }

        if let Some(url) = &finalized.notify_url {
            self.notifier.notify(url, &finalized).await;
        }

        info!(
            bulk_scan_id,
            successful_scans = finalized.successful_scans,
            total_done = entry.counters.total_done(),
            "bulk scan finalized"
        );
    }

    fn log_throughput(&self, bulk_scan_id: &str, entry: &Entry) {
        let total_done = entry.counters.total_done();
        if total_done == 0 || total_done % 100 != 0 {
            return;
        }
        let elapsed = entry.started_at.elapsed().as_secs_f64().max(0.001);
        let rate = total_done as f64 / elapsed;
        let expected = entry.bulk_scan.lock().expected_total();
        let remaining = expected.saturating_sub(total_done);
        let eta_secs = if rate > 0.0 { remaining as f64 / rate } else { f64::INFINITY };
        info!(
            bulk_scan_id,
            total_done,
            rate_per_sec = rate,
            eta = %format_duration_secs(eta_secs),
            "bulk scan throughput"
        );
    }
}

/// Formats a duration in seconds as `ms`, `s`, `min sec`, `h m`, or `d`,
/// per the magnitude table the component design specifies.
pub fn format_duration_secs(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "unknown".to_string();
    }
    if seconds < 1.0 {
        return format!("{}ms", (seconds * 1000.0).round() as i64);
    }
    if seconds < 60.0 {
        return format!("{}s", seconds.round() as i64);
    }
    if seconds < 3600.0 {
        let total = seconds.round() as i64;
        return format!("{}min {}sec", total / 60, total % 60);
    }
    if seconds < 86_400.0 {
        let total = seconds.round() as i64;
        return format!("{}h {}m", total / 3600, (total % 3600) / 60);
    }
    let total = seconds.round() as i64;
    format!("{}d", total / 86_400)
}
