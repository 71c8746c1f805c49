//! etcd-backup - Main entry point
//!
//! One-shot run: back up the host etcd, then every guest cluster's etcd,
//! and exit non-zero if any target failed.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use etcd_backup::catalog::{KubeClient, TargetCatalog};
use etcd_backup::config::Config;
use etcd_backup::models::BackupTarget;
use etcd_backup::pipeline::Etcdctl;
use etcd_backup::storage::S3Store;
use etcd_backup::{telemetry, utils, Orchestrator};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Exit status for a configuration that cannot run.
const EXIT_CONFIG: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", env = "ETCDBACKUP_CONFIG")]
    config: Option<PathBuf>,

    /// Artifact name prefix (overrides config)
    #[arg(long)]
    prefix: Option<String>,

    /// Guest provider: aws, azure or kvm (overrides config)
    #[arg(long)]
    provider: Option<String>,

    /// Host etcd v2 data directory (overrides config)
    #[arg(long, value_name = "DIR")]
    etcd_v2_datadir: Option<PathBuf>,

    /// Host etcd v3 endpoints (overrides config)
    #[arg(long)]
    etcd_v3_endpoints: Option<String>,

    /// Host etcd client certificate
    #[arg(long, value_name = "FILE")]
    etcd_v3_cert: Option<PathBuf>,

    /// Host etcd client CA certificate
    #[arg(long, value_name = "FILE")]
    etcd_v3_cacert: Option<PathBuf>,

    /// Host etcd client key
    #[arg(long, value_name = "FILE")]
    etcd_v3_key: Option<PathBuf>,

    /// S3 bucket (overrides config)
    #[arg(long)]
    aws_s3_bucket: Option<String>,

    /// S3 region (overrides config)
    #[arg(long)]
    aws_s3_region: Option<String>,

    /// Prometheus push gateway URL (overrides config)
    #[arg(long)]
    prometheus_url: Option<String>,

    /// Prometheus push gateway job name (overrides config)
    #[arg(long)]
    prometheus_job: Option<String>,

    #[arg(long, env = "ETCDBACKUP_AWS_ACCESS_KEY", hide_env_values = true)]
    aws_access_key: Option<String>,

    #[arg(long, env = "ETCDBACKUP_AWS_SECRET_KEY", hide_env_values = true)]
    aws_secret_key: Option<String>,

    /// Encryption passphrase; empty disables encryption
    #[arg(long, env = "ETCDBACKUP_PASSPHRASE", hide_env_values = true)]
    passphrase: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print version information
    Version,
}

impl Args {
    fn apply(self, config: &mut Config) {
        fn set<T>(slot: &mut T, value: Option<T>) {
            if let Some(value) = value {
                *slot = value;
            }
        }
        fn set_opt<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        set(&mut config.backup.prefix, self.prefix);
        set_opt(&mut config.backup.provider, self.provider);
        set_opt(&mut config.etcd.v2_data_dir, self.etcd_v2_datadir);
        set(&mut config.etcd.endpoints, self.etcd_v3_endpoints);
        set_opt(&mut config.etcd.cert, self.etcd_v3_cert);
        set_opt(&mut config.etcd.cacert, self.etcd_v3_cacert);
        set_opt(&mut config.etcd.key, self.etcd_v3_key);
        set(&mut config.storage.bucket, self.aws_s3_bucket);
        set(&mut config.storage.region, self.aws_s3_region);
        set_opt(&mut config.telemetry.pushgateway_url, self.prometheus_url);
        set(&mut config.telemetry.job, self.prometheus_job);
        set_opt(&mut config.storage.access_key, self.aws_access_key);
        set_opt(&mut config.storage.secret_key, self.aws_secret_key);
        set_opt(&mut config.encryption.passphrase, self.passphrase);
        set(&mut config.log.level, self.log_level);
    }
}

fn print_version() {
    println!("Name: {}", env!("CARGO_PKG_NAME"));
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!("Description: {}", env!("CARGO_PKG_DESCRIPTION"));
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let args = Args::parse();
    if let Some(Command::Version) = args.command {
        print_version();
        return Ok(ExitCode::SUCCESS);
    }

    // Load configuration
    let mut config = match args.config.as_deref().map(Config::from_file).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            eprintln!("{}", e);
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };
    args.apply(&mut config);

    // Initialize logging
    utils::logger::init(&config.log.level)?;

    tracing::info!("Starting etcd-backup v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return Ok(ExitCode::from(EXIT_CONFIG));
    }

    let orchestrator = match build(&config) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!("Failed to initialise backup run: {:#}", e);
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };

    let batch = orchestrator.run().await;

    if batch.any_failed() {
        tracing::error!("Backup run finished with failures");
    } else {
        tracing::info!("Backup run finished successfully");
    }
    Ok(ExitCode::from(batch.exit_code() as u8))
}

fn build(config: &Config) -> Result<Orchestrator> {
    let (access_key, secret_key) = config.storage_credentials()?;
    let store = Arc::new(S3Store::new(&config.storage, access_key, secret_key));
    let snapshot = Arc::new(Etcdctl::new(config.etcd.etcdctl.clone()));
    let sink = telemetry::from_config(&config.telemetry).context("telemetry setup failed")?;

    let host = BackupTarget::host(
        config.backup.prefix.clone(),
        config.etcd.endpoints.clone(),
        config.etcd.tls(),
        config.etcd.v2_data_dir.clone(),
    );

    let mut orchestrator = Orchestrator::new(host, snapshot, store, sink)
        .with_passphrase(config.passphrase())
        .with_retry(config.retry.policy())
        .with_scratch_root(config.backup.scratch_dir.clone());

    if let Some(provider) = config.provider()? {
        let api = KubeClient::new(&config.kubernetes).context("cluster API client setup failed")?;
        orchestrator = orchestrator.with_guests(provider, TargetCatalog::new(Arc::new(api)));
    }

    Ok(orchestrator)
}
