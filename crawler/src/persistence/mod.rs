//! The document-store capability.
//!
//! `Persistence` is the only way the Controller, Worker, and Progress
//! Monitor touch storage. The core never assumes MongoDB specifically —
//! [`mongo::MongoPersistence`] is one concrete adapter; a test suite can
//! substitute [`crate::testing::InMemoryPersistence`] without pulling in a
//! database.

pub mod mongo;

use crate::error::PersistenceError;
use async_trait::async_trait;
use crawler_core::{BulkScan, ScanJobDescription, ScanResult};

/// Operations a document store must support for this orchestrator.
///
/// `insert_scan_result` carries the encoding-failure fallback chain from
/// the component design: if the result document fails to encode, the
/// adapter retries with a `SERIALIZATION_ERROR` record; if *that* also
/// fails to encode, it gives up and returns an `INTERNAL_ERROR` result
/// without attempting a third write. The returned `ScanResult` always
/// reflects the status that was actually persisted, which may differ from
/// the status the caller passed in.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Inserts `scan` into the `bulkScans` collection of the database named
    /// after the scan, assigning its `id`.
    async fn insert_bulk_scan(&self, scan: &mut BulkScan) -> Result<(), PersistenceError>;

    /// Replaces the bulk scan record by id.
    async fn update_bulk_scan(&self, scan: &BulkScan) -> Result<(), PersistenceError>;

    /// Stores `result` in the job's `(db_name, collection_name)`, creating
    /// the secondary indexes on first use for that collection. Rejects the
    /// call outright if `result.job_status != job.status`.
    async fn insert_scan_result(
        &self,
        result: ScanResult,
        job: &ScanJobDescription,
    ) -> Result<ScanResult, PersistenceError>;
}

/// Returns an error if the job and its result disagree on status — callers
/// are expected to have stamped `result.job_status` from
/// `job.status` immediately before persisting.
pub(crate) fn check_status_matches(
    result: &ScanResult,
    job: &ScanJobDescription,
) -> Result<(), PersistenceError> {
    if result.job_status != job.status {
        return Err(PersistenceError::Rejected {
            operation: "insert_scan_result",
            reason: format!(
                "result.job_status ({}) != job.status ({})",
                result.job_status, job.status
            ),
        });
    }
    Ok(())
}
