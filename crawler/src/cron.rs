//! The cron scheduler capability.
//!
//! The Controller never talks to a scheduling library directly — it only
//! sees `on_fire`/`all_triggers_finalized`, exactly the two hooks the
//! component design calls for. [`CronerGate`] is the one concrete
//! implementation, backed by the `croner` cron-expression parser.

use async_trait::async_trait;
use chrono::Utc;
use croner::Cron;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// A callback invoked once per trigger firing. Each firing is an
/// independent bulk scan run.
pub type FireCallback = Arc<dyn Fn() -> futures::future::BoxFuture<'static, ()> + Send + Sync>;

#[async_trait]
pub trait CronScheduler: Send + Sync {
    /// Registers a single immediate run. Finalized as soon as `callback`
    /// returns.
    async fn register_once(&self, callback: FireCallback);

    /// Registers a recurring trigger parsed from `cron_expr`. Never
    /// self-finalizes; only [`CronScheduler::shutdown`] ends it.
    async fn register_cron(&self, cron_expr: &str, callback: FireCallback) -> Result<(), String>;

    /// Whether every registered trigger has finalized (a one-shot run that
    /// completed, or a cron trigger that was torn down).
    fn all_triggers_finalized(&self) -> bool;

    /// Tears down every outstanding trigger.
    async fn shutdown(&self);
}

/// `croner`-backed scheduler. Each registered trigger runs on its own task;
/// a shared [`CancellationToken`] stops every cron loop on `shutdown`.
pub struct CronerGate {
    shutdown: CancellationToken,
    pending_triggers: AtomicUsize,
}

impl CronerGate {
    pub fn new() -> Self {
        Self { shutdown: CancellationToken::new(), pending_triggers: AtomicUsize::new(0) }
    }
}

impl Default for CronerGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CronScheduler for CronerGate {
    async fn register_once(&self, callback: FireCallback) {
        self.pending_triggers.fetch_add(1, Ordering::SeqCst);
        callback().await;
        self.pending_triggers.fetch_sub(1, Ordering::SeqCst);
    }

    async fn register_cron(&self, cron_expr: &str, callback: FireCallback) -> Result<(), String> {
        let schedule = Cron::new(cron_expr).parse().map_err(|e| format!("invalid cron expression {cron_expr:?}: {e}"))?;

        self.pending_triggers.fetch_add(1, Ordering::SeqCst);
        let shutdown = self.shutdown.clone();
        let cron_expr = cron_expr.to_string();

        tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let next = match schedule.find_next_occurrence(&now, false) {
                    Ok(next) => next,
                    Err(e) => {
                        error!(cron_expr, error = %e, "failed to compute next cron occurrence, stopping trigger");
                        break;
                    }
                };
                let wait = (next - now).to_std().unwrap_or(std::time::Duration::ZERO);

                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {
                        callback().await;
                    }
                }
            }
        });

        Ok(())
    }

    fn all_triggers_finalized(&self) -> bool {
        self.pending_triggers.load(Ordering::SeqCst) == 0
    }

    async fn shutdown(&self) {
        self.shutdown.cancel();
        self.pending_triggers.store(0, Ordering::SeqCst);
    }
}

/// Immediate-only scheduler for deployments with no `-scanCronInterval`:
/// every registration fires exactly once and is finalized on return.
pub struct ImmediateGate {
    finalized: AtomicBool,
}

impl ImmediateGate {
    pub fn new() -> Self {
        Self { finalized: AtomicBool::new(true) }
    }
}

impl Default for ImmediateGate {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CronScheduler for ImmediateGate {
    async fn register_once(&self, callback: FireCallback) {
        self.finalized.store(false, Ordering::SeqCst);
        callback().await;
        self.finalized.store(true, Ordering::SeqCst);
    }

    async fn register_cron(&self, _cron_expr: &str, _callback: FireCallback) -> Result<(), String> {
        warn!("ImmediateGate does not support cron triggers, ignoring registration");
        Err("cron triggers require CronerGate".to_string())
    }

    fn all_triggers_finalized(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        self.finalized.store(true, Ordering::SeqCst);
    }
}
