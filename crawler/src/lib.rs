//! # crawler
//!
//! The distributed bulk-scan orchestration engine: a Controller that
//! expands a bulk scan into per-target jobs and publishes them, a Worker
//! pool that consumes jobs with per-job timeout and structured outcome
//! classification, a per-bulk-scan Worker Manager that owns reusable
//! scanner resources, and a Progress Monitor that tracks completion to a
//! finalized record and an optional HTTP notification.
//!
//! The scan engine itself, the command-line surface, and the target-list
//! providers' live data sources are external collaborators — this crate
//! only defines the capability boundaries ([`scanner`], [`targets`],
//! [`persistence`], [`orchestration`], [`denylist`]) they plug into.
//!
//! ## Layout
//!
//! - [`controller`] — bulk scan lifecycle: register → iterate targets →
//!   publish or synthesize a terminal notification.
//! - [`worker`] — the per-job consume/dispatch/classify/persist/ack loop.
//! - [`bulk_scan_worker`] — the per-bulk-scan holder cache and the
//!   task-local "current job" handle.
//! - [`progress`] — per-bulk-scan counters, finalization, throughput/ETA.
//! - [`cron`] — the scheduler capability and its `croner`-backed adapter.
//! - [`persistence`] / [`orchestration`] — the document-store and
//!   message-broker capabilities and their concrete adapters.
//! - [`scanner`] — the scan-engine capability boundary (`BulkScanWorker`,
//!   `ScannerFactory`).
//! - [`targets`] / [`denylist`] / [`target_parser`] — target-list
//!   providers, the denylist capability, and the parsing algorithm tying
//!   them together.
//! - [`notify`] — the completion-notification HTTP sink.
//! - [`error`] — capability-boundary error types.

pub mod bulk_scan_worker;
pub mod controller;
pub mod cron;
pub mod denylist;
pub mod error;
pub mod notify;
pub mod orchestration;
pub mod persistence;
pub mod progress;
pub mod scanner;
pub mod target_parser;
pub mod targets;
pub mod worker;

#[cfg(test)]
pub mod testing;
