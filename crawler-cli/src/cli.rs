//! Command-line argument surface for the `crawler` binary.
//!
//! Flags keep the spec's documented single-dash spelling as a
//! `visible_alias` on top of Clap's default kebab-case long flags, so
//! anything scripted against the original contract keeps working.

use clap::{Args, Parser, Subcommand};
use crawler_core::ScanDetail;

#[derive(Parser)]
#[command(name = "crawler", version, about = "Distributed bulk-scan orchestrator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Runs the Controller: expand a bulk scan into jobs and publish them.
    Controller(ControllerArgs),
    /// Runs a Worker: consume scan jobs and produce persisted results.
    Worker(WorkerArgs),
}

#[derive(Args, Clone)]
pub struct ControllerArgs {
    #[command(flatten)]
    pub broker: BrokerArgs,
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long = "scan-name", visible_alias = "scanName")]
    pub scan_name: String,

    #[arg(long = "port-to-be-scanned", visible_alias = "portToBeScanned", default_value_t = 443)]
    pub port_to_be_scanned: u16,

    #[arg(long = "scan-detail", visible_alias = "scanDetail", default_value = "NORMAL")]
    pub scan_detail: ScanDetail,

    #[arg(long = "timeout", default_value_t = 2000)]
    pub timeout_ms: u64,

    #[arg(long = "reexecutions", default_value_t = 3)]
    pub reexecutions: u32,

    #[arg(long = "scan-cron-interval", visible_alias = "scanCronInterval")]
    pub scan_cron_interval: Option<String>,

    #[arg(long = "host-file", visible_alias = "hostFile")]
    pub host_file: Option<std::path::PathBuf>,

    #[arg(long = "denylist")]
    pub denylist: Option<std::path::PathBuf>,

    #[arg(long = "monitor-scan", visible_alias = "monitorScan", default_value_t = false)]
    pub monitor_scan: bool,

    #[arg(long = "notify-url", visible_alias = "notifyUrl")]
    pub notify_url: Option<String>,

    #[arg(long = "tranco")]
    pub tranco: Option<u32>,

    #[arg(long = "tranco-email", visible_alias = "trancoEmail")]
    pub tranco_email: Option<u32>,

    #[arg(long = "crux")]
    pub crux: Option<String>,

    #[arg(long = "scanner-version", visible_alias = "scannerVersion", default_value = "unknown")]
    pub scanner_version: String,

    #[arg(long = "crawler-version", visible_alias = "crawlerVersion", default_value = env!("CARGO_PKG_VERSION"))]
    pub crawler_version: String,
}

impl ControllerArgs {
    /// Validates the target-list provider selection: exactly one of
    /// `{hostFile, tranco>0, trancoEmail>0, crux set}`, and `notifyUrl`
    /// requires `monitorScan`.
    pub fn validate(&self) -> Result<(), String> {
        let providers = [
            self.host_file.is_some(),
            self.tranco.is_some_and(|n| n > 0),
            self.tranco_email.is_some_and(|n| n > 0),
            self.crux.is_some(),
        ];
        let selected = providers.iter().filter(|p| **p).count();
        if selected != 1 {
            return Err(format!(
                "exactly one of --host-file, --tranco, --tranco-email, --crux must be given (got {selected})"
            ));
        }
        if let Some(url) = &self.notify_url {
            if !self.monitor_scan {
                return Err("--notify-url requires --monitor-scan".to_string());
            }
            if reqwest::Url::parse(url).is_err() {
                return Err(format!("--notify-url {url:?} is not a valid URL"));
            }
        }
        Ok(())
    }
}

#[derive(Args, Clone)]
pub struct WorkerArgs {
    #[command(flatten)]
    pub broker: BrokerArgs,
    #[command(flatten)]
    pub store: StoreArgs,

    #[arg(long = "parallel-scan-threads", visible_alias = "parallelScanThreads")]
    pub parallel_scan_threads: Option<usize>,

    #[arg(long = "parallel-connection-threads", visible_alias = "parallelConnectionThreads", default_value_t = 20)]
    pub parallel_connection_threads: usize,

    #[arg(long = "scan-timeout", visible_alias = "scanTimeout", default_value_t = 840_000)]
    pub scan_timeout_ms: u64,
}

#[derive(Args, Clone)]
pub struct BrokerArgs {
    #[arg(long = "rabbit-mq-host", visible_alias = "rabbitMqHost", default_value = "localhost")]
    pub host: String,

    #[arg(long = "rabbit-mq-port", visible_alias = "rabbitMqPort", default_value_t = 5672)]
    pub port: u16,

    #[arg(long = "rabbit-mq-user", visible_alias = "rabbitMqUser", default_value = "guest")]
    pub user: String,

    #[arg(long = "rabbit-mq-pass", visible_alias = "rabbitMqPass")]
    pub pass: Option<String>,

    #[arg(long = "rabbit-mq-pass-file", visible_alias = "rabbitMqPassFile")]
    pub pass_file: Option<std::path::PathBuf>,

    #[arg(long = "rabbit-mq-tls", visible_alias = "rabbitMqTLS", default_value_t = false)]
    pub tls: bool,
}

impl BrokerArgs {
    pub fn resolve_password(&self) -> std::io::Result<String> {
        if let Some(path) = &self.pass_file {
            return Ok(std::fs::read_to_string(path)?.trim().to_string());
        }
        Ok(self.pass.clone().unwrap_or_default())
    }

    pub fn amqp_uri(&self) -> std::io::Result<String> {
        let password = self.resolve_password()?;
        let scheme = if self.tls { "amqps" } else { "amqp" };
        Ok(format!("{scheme}://{}:{}@{}:{}/%2f", self.user, password, self.host, self.port))
    }
}

#[derive(Args, Clone)]
pub struct StoreArgs {
    #[arg(long = "mongo-db-host", visible_alias = "mongoDbHost", default_value = "localhost")]
    pub host: String,

    #[arg(long = "mongo-db-port", visible_alias = "mongoDbPort", default_value_t = 27017)]
    pub port: u16,

    #[arg(long = "mongo-db-user", visible_alias = "mongoDbUser")]
    pub user: Option<String>,

    #[arg(long = "mongo-db-pass", visible_alias = "mongoDbPass")]
    pub pass: Option<String>,

    #[arg(long = "mongo-db-pass-file", visible_alias = "mongoDbPassFile")]
    pub pass_file: Option<std::path::PathBuf>,

    #[arg(long = "mongo-db-auth-source", visible_alias = "mongoDbAuthSource", default_value = "admin")]
    pub auth_source: String,
}

impl StoreArgs {
    pub fn resolve_password(&self) -> std::io::Result<Option<String>> {
        if let Some(path) = &self.pass_file {
            return Ok(Some(std::fs::read_to_string(path)?.trim().to_string()));
        }
        Ok(self.pass.clone())
    }

    pub fn mongo_uri(&self) -> std::io::Result<String> {
        match (&self.user, self.resolve_password()?) {
            (Some(user), Some(pass)) => {
                Ok(format!("mongodb://{user}:{pass}@{}:{}/?authSource={}", self.host, self.port, self.auth_source))
            }
            _ => Ok(format!("mongodb://{}:{}", self.host, self.port)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> ControllerArgs {
        ControllerArgs {
            broker: BrokerArgs { host: "localhost".into(), port: 5672, user: "guest".into(), pass: None, pass_file: None, tls: false },
            store: StoreArgs {
                host: "localhost".into(),
                port: 27017,
                user: None,
                pass: None,
                pass_file: None,
                auth_source: "admin".into(),
            },
            scan_name: "night-sweep".into(),
            port_to_be_scanned: 443,
            scan_detail: ScanDetail::Normal,
            timeout_ms: 2000,
            reexecutions: 3,
            scan_cron_interval: None,
            host_file: Some("targets.txt".into()),
            denylist: None,
            monitor_scan: false,
            notify_url: None,
            tranco: None,
            tranco_email: None,
            crux: None,
            scanner_version: "unknown".into(),
            crawler_version: "1.0".into(),
        }
    }

    #[test]
    fn rejects_zero_providers_selected() {
        let mut args = base_args();
        args.host_file = None;
        assert!(args.validate().is_err());
    }

    #[test]
    fn rejects_more_than_one_provider_selected() {
        let mut args = base_args();
        args.tranco = Some(1000);
        assert!(args.validate().is_err());
    }

    #[test]
    fn notify_url_requires_monitor_scan() {
        let mut args = base_args();
        args.notify_url = Some("https://example.com/hook".into());
        assert_eq!(args.validate(), Err("--notify-url requires --monitor-scan".to_string()));
    }

    #[test]
    fn rejects_a_malformed_notify_url() {
        let mut args = base_args();
        args.monitor_scan = true;
        args.notify_url = Some("not a url".into());
        assert!(args.validate().is_err());
    }

    #[test]
    fn accepts_a_well_formed_notify_url() {
        let mut args = base_args();
        args.monitor_scan = true;
        args.notify_url = Some("https://example.com/hook".into());
        assert!(args.validate().is_ok());
    }
}
