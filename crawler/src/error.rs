//! Capability-boundary error types.
//!
//! Each capability (`Persistence`, `Orchestration`, the Controller, the
//! Worker) owns a narrow `thiserror` enum. Nothing in this crate uses
//! `anyhow` — that's reserved for `crawler-cli`'s top-level error
//! reporting, where a flattened, human-readable chain is what actually
//! matters.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("connection to the document store failed: {0}")]
    Connection(String),
    #[error("encoding the document failed: {0}")]
    Encoding(String),
    #[error("{operation} rejected: {reason}")]
    Rejected { operation: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("connection to the broker failed: {0}")]
    Connection(String),
    #[error("publish failed after exhausting retries: {0}")]
    PublishExhausted(String),
    #[error("ack failed for delivery tag {0}")]
    AckFailed(u64),
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),
    #[error("invalid controller configuration: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),
}
