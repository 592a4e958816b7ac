//! `lapin`-backed [`Orchestration`] adapter.
//!
//! Layout: one durable queue `scan.jobs` for job dispatch, and one fanout
//! exchange per bulk scan (`done.<bulkScanId>`) for terminal notifications —
//! the Progress Monitor subscribes to exactly the exchange for the bulk
//! scan it is tracking, so unrelated bulk scans never cross-deliver.

use super::{DoneConsumer, DoneNotification, JobConsumer, Orchestration};
use crate::error::OrchestrationError;
use async_trait::async_trait;
use crawler_core::ScanJobDescription;
use futures::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions, ExchangeDeclareOptions,
    QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::{error, warn};

const JOB_QUEUE: &str = "scan.jobs";
const MAX_PUBLISH_ATTEMPTS: u32 = 5;

pub struct RabbitMqOrchestration {
    connection: Connection,
    channel: Channel,
}

impl RabbitMqOrchestration {
    pub async fn connect(uri: &str) -> Result<Self, OrchestrationError> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(|e| OrchestrationError::Connection(e.to_string()))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| OrchestrationError::Connection(e.to_string()))?;

        channel
            .queue_declare(JOB_QUEUE, QueueDeclareOptions::default(), FieldTable::default())
            .await
            .map_err(|e| OrchestrationError::Connection(e.to_string()))?;

        Ok(Self { connection, channel })
    }

    fn done_exchange(bulk_scan_id: &str) -> String {
        format!("done.{bulk_scan_id}")
    }
}

#[async_trait]
impl Orchestration for RabbitMqOrchestration {
    async fn publish_scan_job(&self, job: &ScanJobDescription) -> Result<(), OrchestrationError> {
        let payload = serde_json::to_vec(job)
            .map_err(|e| OrchestrationError::PublishExhausted(format!("encoding failed: {e}")))?;

        let mut attempt = 0;
        let mut backoff = std::time::Duration::from_millis(50);
        loop {
            attempt += 1;
            let published = self
                .channel
                .basic_publish(
                    "",
                    JOB_QUEUE,
                    BasicPublishOptions::default(),
                    &payload,
                    BasicProperties::default(),
                )
                .await;

            match published {
                Ok(_) => return Ok(()),
                Err(e) if attempt < MAX_PUBLISH_ATTEMPTS => {
                    warn!(attempt, error = %e, "publish_scan_job failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => return Err(OrchestrationError::PublishExhausted(e.to_string())),
            }
        }
    }

    async fn register_scan_job_consumer(
        &self,
        prefetch: u16,
        consumer: JobConsumer,
    ) -> Result<(), OrchestrationError> {
        self.channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(|e| OrchestrationError::Connection(e.to_string()))?;

        let mut delivery_stream = self
            .channel
            .basic_consume(
                JOB_QUEUE,
                "scan-worker",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| OrchestrationError::Connection(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(delivery) = delivery_stream.next().await {
                let Ok(delivery) = delivery else {
                    continue;
                };
                match serde_json::from_slice::<ScanJobDescription>(&delivery.data) {
                    Ok(job) => {
                        let job = job.with_delivery_tag(delivery.delivery_tag);
                        consumer(job);
                    }
                    Err(e) => error!(error = %e, "dropping malformed scan job message"),
                }
            }
        });

        Ok(())
    }

    async fn register_done_notification_consumer(
        &self,
        bulk_scan_id: &str,
        consumer: DoneConsumer,
    ) -> Result<(), OrchestrationError> {
        let exchange = Self::done_exchange(bulk_scan_id);
        self.channel
            .exchange_declare(
                &exchange,
                ExchangeKind::Fanout,
                ExchangeDeclareOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| OrchestrationError::Connection(e.to_string()))?;

        let queue = self
            .channel
            .queue_declare("", QueueDeclareOptions { exclusive: true, ..Default::default() }, FieldTable::default())
            .await
            .map_err(|e| OrchestrationError::Connection(e.to_string()))?;

        self.channel
            .queue_bind(queue.name().as_str(), &exchange, "", QueueBindOptions::default(), FieldTable::default())
            .await
            .map_err(|e| OrchestrationError::Connection(e.to_string()))?;

        let mut delivery_stream = self
            .channel
            .basic_consume(
                queue.name().as_str(),
                "progress-monitor",
                BasicConsumeOptions { no_ack: true, ..Default::default() },
                FieldTable::default(),
            )
            .await
            .map_err(|e| OrchestrationError::Connection(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(delivery) = delivery_stream.next().await {
                let Ok(delivery) = delivery else {
                    continue;
                };
                match serde_json::from_slice::<DoneNotification>(&delivery.data) {
                    Ok(notification) => consumer(notification),
                    Err(e) => error!(error = %e, "dropping malformed done notification"),
                }
            }
        });

        Ok(())
    }

    async fn notify_of_done_scan_job(&self, notification: DoneNotification) -> Result<(), OrchestrationError> {
        let exchange = Self::done_exchange(&notification.bulk_scan_id);
        let payload = serde_json::to_vec(&notification)
            .map_err(|e| OrchestrationError::PublishExhausted(format!("encoding failed: {e}")))?;

        self.channel
            .basic_publish(&exchange, "", BasicPublishOptions::default(), &payload, BasicProperties::default())
            .await
            .map_err(|e| OrchestrationError::PublishExhausted(e.to_string()))?;
        Ok(())
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), OrchestrationError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|_| OrchestrationError::AckFailed(delivery_tag))
    }

    async fn close_connection(&self) -> Result<(), OrchestrationError> {
        self.channel
            .close(0, "shutdown")
            .await
            .map_err(|e| OrchestrationError::Connection(e.to_string()))?;
        self.connection
            .close(0, "shutdown")
            .await
            .map_err(|e| OrchestrationError::Connection(e.to_string()))
    }
}
