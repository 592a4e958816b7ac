//! One-shot HTTP completion notification.
//!
//! Finalization POSTs the finished `BulkScan` record as JSON to
//! `notifyUrl`, if set. Failures are logged and swallowed — the component
//! design is explicit that this is a best-effort sink, not a delivery
//! guarantee.

use async_trait::async_trait;
use crawler_core::BulkScan;
use std::sync::Mutex;
use tracing::warn;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, url: &str, bulk_scan: &BulkScan);
}

/// POSTs the bulk scan as JSON, once, with no retry.
pub struct HttpNotificationSink {
    client: reqwest::Client,
}

impl HttpNotificationSink {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for HttpNotificationSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationSink for HttpNotificationSink {
    async fn notify(&self, url: &str, bulk_scan: &BulkScan) {
        match self.client.post(url).json(bulk_scan).send().await {
            Ok(response) => {
                if !response.status().is_success() {
                    warn!(url, status = %response.status(), "notification endpoint returned a non-success status");
                }
            }
            Err(e) => warn!(url, error = %e, "failed to deliver completion notification"),
        }
    }
}

/// Records calls without making a network request, for tests and dry runs.
#[derive(Default)]
pub struct NoopNotificationSink {
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl NotificationSink for NoopNotificationSink {
    async fn notify(&self, url: &str, _bulk_scan: &BulkScan) {
        self.calls.lock().unwrap().push(url.to_string());
    }
}
