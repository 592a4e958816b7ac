//! The message-broker capability.

pub mod rabbitmq;

use crate::error::OrchestrationError;
use async_trait::async_trait;
use crawler_core::{JobStatus, ScanJobDescription, ScanTarget};
use std::sync::Arc;

/// A terminal notification published on a bulk scan's done channel — either
/// from a completed worker job, or synthesized by the Controller for a
/// pre-publish rejection (`UNRESOLVABLE`, `DENYLISTED`).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DoneNotification {
    pub bulk_scan_id: String,
    pub job_status: JobStatus,
    pub scan_target: ScanTarget,
}

/// A consumer callback invoked once per delivered message, given the raw
/// delivery tag for acknowledgement.
pub type JobConsumer = Arc<dyn Fn(ScanJobDescription) + Send + Sync>;
pub type DoneConsumer = Arc<dyn Fn(DoneNotification) + Send + Sync>;

/// Broker operations the Controller, Worker, and Progress Monitor need.
///
/// One broker adapter backs every bulk scan in a process; per-bulk-scan
/// done-notification routing is the adapter's responsibility (e.g. a topic
/// exchange keyed by bulk scan id), not something this trait parameterizes
/// beyond passing the id along.
#[async_trait]
pub trait Orchestration: Send + Sync {
    /// Delivers `job` to exactly one worker consumer (at-least-once).
    async fn publish_scan_job(&self, job: &ScanJobDescription) -> Result<(), OrchestrationError>;

    /// Starts a subscription; the broker may deliver up to `prefetch`
    /// unacknowledged messages to `consumer` at a time.
    async fn register_scan_job_consumer(
        &self,
        prefetch: u16,
        consumer: JobConsumer,
    ) -> Result<(), OrchestrationError>;

    /// Subscribes to `bulk_scan_id`'s terminal notifications.
    async fn register_done_notification_consumer(
        &self,
        bulk_scan_id: &str,
        consumer: DoneConsumer,
    ) -> Result<(), OrchestrationError>;

    /// Publishes a terminal notification for one job.
    async fn notify_of_done_scan_job(&self, notification: DoneNotification) -> Result<(), OrchestrationError>;

    /// Acknowledges a previously delivered message.
    async fn ack(&self, delivery_tag: u64) -> Result<(), OrchestrationError>;

    /// Tears down broker state. Called once, after the cron gate confirms
    /// no bulk scans remain active.
    async fn close_connection(&self) -> Result<(), OrchestrationError>;
}
