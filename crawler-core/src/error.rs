//! Error types owned by the data model itself (as opposed to the
//! capability-boundary errors that live in the `crawler` engine crate).

use thiserror::Error;

/// Fails-fast misuse of the data model, as opposed to a scan-time fault.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("ScanResult::from_exception called with a non-error status {0}")]
    NotAnErrorStatus(crate::status::JobStatus),
}
