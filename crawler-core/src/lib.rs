//! # crawler-core
//!
//! Data model for a distributed bulk-scan orchestrator: job status, scan
//! targets, bulk scans, scan jobs, results, and their atomic counters.
//!
//! This crate has no async runtime dependency and performs no I/O — it is
//! the set of plain, serializable types that the `crawler` engine crate
//! builds the Controller, Worker, and Progress Monitor on top of. Keeping
//! it free of `tokio` means the data model can be unit-tested, persisted,
//! and passed across an FFI or process boundary without pulling in an
//! executor.
//!
//! ## Layout
//!
//! - [`status`] — the closed [`status::JobStatus`] outcome enum.
//! - [`target`] — [`target::ScanTarget`], the parser's output type.
//! - [`config`] — [`config::ScanConfig`] and [`config::ScanDetail`].
//! - [`bulk_scan`] — [`bulk_scan::BulkScan`] and its [`bulk_scan::BulkScanInfo`]
//!   projection.
//! - [`job`] — [`job::ScanJobDescription`] and [`job::ScanResult`].
//! - [`counters`] — [`counters::BulkScanJobCounters`], the concurrent
//!   per-status tally the progress monitor maintains.
//! - [`document`] — the opaque [`document::Document`] result payload type.
//! - [`error`] — data-model-level error types.

pub mod bulk_scan;
pub mod config;
pub mod counters;
pub mod document;
pub mod error;
pub mod job;
pub mod status;
pub mod target;

pub use bulk_scan::{BulkScan, BulkScanInfo};
pub use config::{ScanConfig, ScanDetail};
pub use counters::{BulkScanJobCounters, CounterSnapshot};
pub use document::Document;
pub use error::CoreError;
pub use job::{ScanJobDescription, ScanResult};
pub use status::JobStatus;
pub use target::{DenylistReason, ScanTarget};
