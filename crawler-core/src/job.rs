//! An individual unit of work and its persisted outcome.

use crate::bulk_scan::BulkScanInfo;
use crate::document::{exception_document, Document};
use crate::error::CoreError;
use crate::status::JobStatus;
use crate::target::ScanTarget;
use serde::{Deserialize, Serialize};

/// A `(target, scanConfig)` pair dispatched to exactly one worker.
///
/// `delivery_tag` is transport-only: it identifies the broker message for
/// acknowledgement and is never part of the wire payload (`#[serde(skip)]`).
/// `status` is `ToBeExecuted` on publication for a real job, or already
/// terminal for a synthesized pre-publish notification; it is mutated
/// exactly once, on completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJobDescription {
    pub scan_target: ScanTarget,
    pub bulk_scan_info: BulkScanInfo,
    pub db_name: String,
    pub collection_name: String,
    pub status: JobStatus,
    #[serde(skip)]
    pub delivery_tag: Option<u64>,
}

impl ScanJobDescription {
    pub fn new(
        scan_target: ScanTarget,
        bulk_scan_info: BulkScanInfo,
        db_name: String,
        collection_name: String,
        status: JobStatus,
    ) -> Self {
        Self {
            scan_target,
            bulk_scan_info,
            db_name,
            collection_name,
            status,
            delivery_tag: None,
        }
    }

    /// Sets the transport delivery tag. Intended to be called exactly once,
    /// by the orchestration adapter as it hands a delivered message to the
    /// worker; later calls would indicate the job was redelivered under a
    /// new tag, which this type does not track.
    pub fn with_delivery_tag(mut self, tag: u64) -> Self {
        self.delivery_tag = Some(tag);
        self
    }
}

/// The persisted outcome of one scan job.
///
/// `job_status` must equal the status recorded on the owning job at the
/// moment of insertion, and must never be `ToBeExecuted`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub id: Option<String>,
    pub bulk_scan_id: String,
    pub scan_target: ScanTarget,
    pub job_status: JobStatus,
    pub result: Document,
}

impl ScanResult {
    pub fn new(bulk_scan_id: String, scan_target: ScanTarget, job_status: JobStatus, result: Document) -> Self {
        Self {
            id: None,
            bulk_scan_id,
            scan_target,
            job_status,
            result,
        }
    }

    /// Builds an error result from an exception message. Fails fast if
    /// `status` is not an error status — callers never build an exception
    /// document for a success-shaped outcome.
    pub fn from_exception(
        bulk_scan_id: String,
        scan_target: ScanTarget,
        status: JobStatus,
        kind: &str,
        message: impl Into<String>,
    ) -> Result<Self, CoreError> {
        if !status.is_error() {
            return Err(CoreError::NotAnErrorStatus(status));
        }
        Ok(Self::new(bulk_scan_id, scan_target, status, exception_document(kind, message)))
    }
}
