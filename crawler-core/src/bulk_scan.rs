//! A bulk scan campaign and its immutable job-facing projection.

use crate::config::ScanConfig;
use crate::counters::CounterSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A campaign that consumes a target list and produces one result per
/// resolved, non-denylisted target.
///
/// Ownership, per the component design: the Controller exclusively owns
/// mutation until the bulk scan is registered with the progress monitor;
/// thereafter the monitor exclusively owns all mutation until finalization,
/// at which point the record is sealed (`finished = true`, no further
/// writes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkScan {
    /// Assigned by persistence on first insert; `None` until then.
    pub id: Option<String>,
    pub name: String,
    pub collection_name: String,
    pub scan_config: ScanConfig,
    pub monitored: bool,
    pub finished: bool,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub targets_given: u64,
    pub scan_jobs_published: u64,
    pub scan_jobs_resolution_errors: u64,
    pub scan_jobs_denylisted: u64,
    pub successful_scans: u64,
    #[serde(default)]
    pub job_status_counters: Option<CounterSnapshot>,
    pub notify_url: Option<String>,
    pub scanner_version: String,
    pub crawler_version: String,
}

impl BulkScan {
    /// Derives `collectionName` as `name + "_" + yyyy-MM-dd_HH-mm(startTime)`.
    pub fn derive_collection_name(name: &str, start_time: DateTime<Utc>) -> String {
        format!("{name}_{}", start_time.format("%Y-%m-%d_%H-%M"))
    }

    pub fn new(
        name: String,
        scan_config: ScanConfig,
        monitored: bool,
        notify_url: Option<String>,
        scanner_version: String,
        crawler_version: String,
        start_time: DateTime<Utc>,
    ) -> Self {
        let collection_name = Self::derive_collection_name(&name, start_time);
        Self {
            id: None,
            name,
            collection_name,
            scan_config,
            monitored,
            finished: false,
            start_time,
            end_time: None,
            targets_given: 0,
            scan_jobs_published: 0,
            scan_jobs_resolution_errors: 0,
            scan_jobs_denylisted: 0,
            successful_scans: 0,
            job_status_counters: None,
            notify_url,
            scanner_version,
            crawler_version,
        }
    }

    /// `scanJobsPublished + scanJobsResolutionErrors + scanJobsDenylisted`,
    /// used by the monitor to decide when to finalize.
    pub fn expected_total(&self) -> u64 {
        (self.scan_jobs_published + self.scan_jobs_resolution_errors + self.scan_jobs_denylisted)
            .max(self.targets_given)
    }
}

/// Immutable projection of a [`BulkScan`] distributed with every job
/// message. Constant for the duration of the bulk scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkScanInfo {
    pub bulk_scan_id: String,
    pub scan_config: ScanConfig,
    pub monitored: bool,
}

impl From<&BulkScan> for BulkScanInfo {
    fn from(scan: &BulkScan) -> Self {
        Self {
            bulk_scan_id: scan.id.clone().expect("BulkScanInfo requires an assigned id"),
            scan_config: scan.scan_config.clone(),
            monitored: scan.monitored,
        }
    }
}
