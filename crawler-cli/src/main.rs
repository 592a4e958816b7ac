//! Entry point for the `crawler` binary: `controller` and `worker`
//! subcommands over the library crate's Controller/Worker.
//!
//! This is the one place in the workspace allowed to use `anyhow` — every
//! other crate returns typed errors; here they get flattened into a
//! readable exit message.

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Command, ControllerArgs, WorkerArgs};
use crawler::bulk_scan_worker::BulkScanWorkerManager;
use crawler::controller::{Controller, ControllerConfig};
use crawler::cron::{CronScheduler, CronerGate, ImmediateGate};
use crawler::denylist::{Denylist, FileDenylist};
use crawler::notify::HttpNotificationSink;
use crawler::orchestration::rabbitmq::RabbitMqOrchestration;
use crawler::orchestration::Orchestration;
use crawler::persistence::mongo::MongoPersistence;
use crawler::persistence::Persistence;
use crawler::progress::ProgressMonitor;
use crawler::scanner::{BulkScanWorker, JobOutcome, ProgressConsumer, ScannerFactory};
use crawler::targets::{CruxProvider, CruxTier, FileTargetProvider, TargetProvider, TrancoProvider};
use crawler::worker::{log_worker_started, Worker, WorkerConfig};
use crawler_core::document::exception_document;
use crawler_core::{ScanConfig, ScanJobDescription};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    match cli.command {
        Command::Controller(args) => run_controller(args).await,
        Command::Worker(args) => run_worker(args).await,
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

async fn run_controller(args: ControllerArgs) -> Result<()> {
    args.validate().map_err(anyhow::Error::msg)?;

    let persistence: Arc<dyn Persistence> = Arc::new(
        MongoPersistence::connect(&args.store.mongo_uri().context("resolving Mongo credentials")?)
            .await
            .context("connecting to the document store")?,
    );
    let orchestration: Arc<dyn Orchestration> = Arc::new(
        RabbitMqOrchestration::connect(&args.broker.amqp_uri().context("resolving broker credentials")?)
            .await
            .context("connecting to the message broker")?,
    );

    let denylist: Option<Arc<dyn Denylist>> = match &args.denylist {
        Some(path) => Some(Arc::new(
            FileDenylist::load(path).await.with_context(|| format!("loading denylist {}", path.display()))?,
        )),
        None => None,
    };

    let target_provider: Arc<dyn TargetProvider> = target_provider_for(&args)?;

    let notifier = Arc::new(HttpNotificationSink::new());
    let progress_monitor = Arc::new(ProgressMonitor::new(persistence.clone(), orchestration.clone(), notifier));

    let cron: Arc<dyn CronScheduler> = if args.scan_cron_interval.is_some() {
        Arc::new(CronerGate::new())
    } else {
        Arc::new(ImmediateGate::new())
    };

    let controller = Arc::new(Controller::new(
        persistence,
        orchestration.clone(),
        progress_monitor.clone(),
        cron.clone(),
        target_provider,
        denylist,
    ));

    let mut scan_config = ScanConfig::new(args.timeout_ms, args.reexecutions, args.scan_detail);
    scan_config.extra.insert("crux".into(), serde_json::json!(args.crux));

    let config = ControllerConfig {
        scan_name: args.scan_name.clone(),
        default_port: args.port_to_be_scanned,
        scan_config,
        monitored: args.monitor_scan,
        notify_url: args.notify_url.clone(),
        scanner_version: args.scanner_version.clone(),
        crawler_version: args.crawler_version.clone(),
        scan_cron_interval: args.scan_cron_interval.clone(),
    };

    controller.clone().start(config).await.context("starting controller")?;

    // A one-shot run's single trigger is already finalized by the time
    // `start` returns; a cron-driven run keeps firing until interrupted.
    // Either way, wait for `ctrl_c` or for the cron gate to report every
    // trigger finalized and no bulk scan still being tracked before
    // tearing the broker connection down.
    loop {
        if controller.can_shut_down() {
            break;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received, finalizing cron gate");
                cron.shutdown().await;
            }
            _ = tokio::time::sleep(Duration::from_millis(500)) => {}
        }
    }

    orchestration.close_connection().await.context("closing broker connection")?;
    info!("controller shut down cleanly");
    Ok(())
}

/// hostFile → trancoEmail → crux → tranco, per the component design.
fn target_provider_for(args: &ControllerArgs) -> Result<Arc<dyn TargetProvider>> {
    if let Some(path) = &args.host_file {
        return Ok(Arc::new(FileTargetProvider::new(path.clone())));
    }
    if let Some(n) = args.tranco_email.filter(|n| *n > 0) {
        return Ok(Arc::new(TrancoProvider { top_n: n, email_gated: true }));
    }
    if let Some(tier) = &args.crux {
        let tier = CruxTier::from_str(tier).map_err(anyhow::Error::msg)?;
        return Ok(Arc::new(CruxProvider { tier }));
    }
    if let Some(n) = args.tranco.filter(|n| *n > 0) {
        return Ok(Arc::new(TrancoProvider { top_n: n, email_gated: false }));
    }
    bail!("no target-list provider selected (this should have been rejected by validate())")
}

async fn run_worker(args: WorkerArgs) -> Result<()> {
    let persistence: Arc<dyn Persistence> = Arc::new(
        MongoPersistence::connect(&args.store.mongo_uri().context("resolving Mongo credentials")?)
            .await
            .context("connecting to the document store")?,
    );
    let orchestration: Arc<dyn Orchestration> = Arc::new(
        RabbitMqOrchestration::connect(&args.broker.amqp_uri().context("resolving broker credentials")?)
            .await
            .context("connecting to the message broker")?,
    );

    let parallel_scan_threads = args
        .parallel_scan_threads
        .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));
    let config = WorkerConfig {
        parallel_scan_threads,
        parallel_connection_threads: args.parallel_connection_threads,
        scan_timeout: Duration::from_millis(args.scan_timeout_ms),
    };

    let manager = Arc::new(BulkScanWorkerManager::new(Arc::new(UnconfiguredScannerFactory)));
    let shutdown = CancellationToken::new();
    let worker = Arc::new(Worker::new(persistence, orchestration.clone(), manager, config, shutdown.clone()));

    log_worker_started(parallel_scan_threads, args.parallel_connection_threads);
    worker.clone().start().await.context("registering broker consumer")?;

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutdown signal received, finishing inflight jobs");
    shutdown.cancel();
    orchestration.close_connection().await.context("closing broker connection")?;
    Ok(())
}

/// The TLS-scanning engine is an external collaborator this repo never
/// implements — every job dispatched without a real `ScannerFactory`
/// plugged in comes back as `CRAWLER_ERROR` instead of silently hanging or
/// panicking, so a misconfigured deployment fails loud and per-job rather
/// than never starting at all.
struct UnconfiguredScannerFactory;

struct UnconfiguredWorker;

#[async_trait::async_trait]
impl BulkScanWorker for UnconfiguredWorker {
    async fn init(&self) {
        warn!("no scanner engine configured: every job will be recorded as CRAWLER_ERROR");
    }
    async fn cleanup(&self) {}
    async fn scan(&self, job: &ScanJobDescription, _on_progress: ProgressConsumer) -> JobOutcome {
        error!(bulk_scan_id = %job.bulk_scan_info.bulk_scan_id, "dispatched a job with no scanner engine attached");
        JobOutcome::CrawlerError(exception_document(
            "unconfigured_scanner",
            "this crawler binary was built without a concrete ScannerFactory",
        ))
    }
}

impl ScannerFactory for UnconfiguredScannerFactory {
    fn create_worker(&self, _bulk_scan_id: &str, _pc: usize, _ps: usize) -> Arc<dyn BulkScanWorker> {
        Arc::new(UnconfiguredWorker)
    }
}
