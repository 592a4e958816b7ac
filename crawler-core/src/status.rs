//! Job lifecycle status.
//!
//! [`JobStatus`] is the closed outcome enum every other component in this
//! crate is seeded from: the parser returns one, the worker classifies one,
//! the progress monitor counts them.

use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Terminal (or pre-terminal) outcome of a scan job.
///
/// `TO_BE_EXECUTED` is the only non-terminal variant; once a job transitions
/// away from it, the transition is one-way — no status ever moves back to
/// `TO_BE_EXECUTED` or between two other variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    ToBeExecuted,
    Success,
    Empty,
    Unresolvable,
    ResolutionError,
    Denylisted,
    Error,
    SerializationError,
    Cancelled,
    InternalError,
    CrawlerError,
}

impl JobStatus {
    /// All terminal variants, in a stable order used for counter iteration
    /// and snapshot serialization.
    pub const TERMINAL: [JobStatus; 10] = [
        JobStatus::Success,
        JobStatus::Empty,
        JobStatus::Unresolvable,
        JobStatus::ResolutionError,
        JobStatus::Denylisted,
        JobStatus::Error,
        JobStatus::SerializationError,
        JobStatus::Cancelled,
        JobStatus::InternalError,
        JobStatus::CrawlerError,
    ];

    /// Whether this status represents a failure of some kind.
    pub fn is_error(self) -> bool {
        !matches!(self, JobStatus::ToBeExecuted | JobStatus::Success | JobStatus::Empty)
    }

    /// Whether this status is terminal (anything but `ToBeExecuted`).
    pub fn is_terminal(self) -> bool {
        !matches!(self, JobStatus::ToBeExecuted)
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::ToBeExecuted => "TO_BE_EXECUTED",
            JobStatus::Success => "SUCCESS",
            JobStatus::Empty => "EMPTY",
            JobStatus::Unresolvable => "UNRESOLVABLE",
            JobStatus::ResolutionError => "RESOLUTION_ERROR",
            JobStatus::Denylisted => "DENYLISTED",
            JobStatus::Error => "ERROR",
            JobStatus::SerializationError => "SERIALIZATION_ERROR",
            JobStatus::Cancelled => "CANCELLED",
            JobStatus::InternalError => "INTERNAL_ERROR",
            JobStatus::CrawlerError => "CRAWLER_ERROR",
        };
        write!(f, "{s}")
    }
}
