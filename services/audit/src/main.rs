//! Event archive audit for the Nier surveillance platform
//!
//! Runs a single audit pass, or keeps auditing every `--delay` seconds.
//!
//! # Configuration
//!
//! Configuration is loaded from:
//! 1. Configuration files (config/audit.toml, /etc/nier/audit.toml, `--config`)
//! 2. Environment variables (prefixed with AUDIT__)
//!
//! See `config.rs` for detailed configuration options.

use anyhow::{Context, Result};
use archive_audit::config::LoggingConfig;
use archive_audit::{Auditor, Config, ConfirmationPolicy, MysqlArchive, RunMode};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "archive-audit", version)]
#[command(about = "Reconcile the surveillance event database against the event archive on disk")]
struct Cli {
    /// Report discrepancies without changing anything
    #[arg(short, long, conflicts_with = "yes")]
    report: bool,

    /// Act on every discrepancy without asking
    #[arg(short, long)]
    yes: bool,

    /// Seconds between audit passes; 0 runs a single pass
    #[arg(short, long, value_name = "SECONDS", default_value_t = 0)]
    delay: u64,

    /// Additional configuration file
    #[arg(long, env = "AUDIT_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mode = RunMode::from_flags(cli.report, cli.yes)?;

    // Load configuration
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.logging)?;

    let settings = config.audit_settings(mode, Duration::from_secs(cli.delay));

    info!(
        service = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        mode = ?settings.mode,
        delay_secs = cli.delay,
        events_path = %settings.events_path.display(),
        "Starting archive audit"
    );

    if let Some(port) = config.service.metrics_port {
        if settings.is_continuous() {
            init_metrics(port)?;
        }
    }

    let archive = MysqlArchive::connect(&config.database)
        .await
        .context("Failed to connect to event database")?;

    let policy = ConfirmationPolicy::with_stdin(settings.mode);
    let mut auditor = Auditor::new(Box::new(archive), settings, policy);

    let result = tokio::select! {
        result = auditor.run() => result,
        _ = shutdown_signal() => {
            info!("Archive audit interrupted");
            return Ok(());
        }
    };

    match result {
        Ok(()) => {
            info!("Archive audit finished");
            Ok(())
        }
        Err(e) if e.is_quit() => {
            info!("Archive audit stopped by operator");
            Ok(())
        }
        Err(e) => Err(e).context("Archive audit failed"),
    }
}

/// Initialize tracing/logging
fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(env_filter);
    let json = config.format == "json";

    match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let writer = Arc::new(file);

            if json {
                registry.with(fmt::layer().json().with_writer(writer)).init();
            } else {
                registry
                    .with(fmt::layer().with_ansi(false).with_writer(writer))
                    .init();
            }
        }
        None if json => {
            registry
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        None => {
            registry
                .with(fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_interactive_single_pass() {
        let cli = Cli::try_parse_from(["archive-audit"]).unwrap();
        assert_eq!(cli.delay, 0);
        assert_eq!(
            RunMode::from_flags(cli.report, cli.yes).unwrap(),
            RunMode::Interactive
        );
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from(["archive-audit", "-y", "--delay=60"]).unwrap();
        assert!(cli.yes);
        assert_eq!(cli.delay, 60);

        let cli = Cli::try_parse_from(["archive-audit", "--report", "-d", "5"]).unwrap();
        assert!(cli.report);
        assert_eq!(cli.delay, 5);
    }

    #[test]
    fn test_cli_rejects_report_with_yes() {
        assert!(Cli::try_parse_from(["archive-audit", "-r", "-y"]).is_err());
        assert!(Cli::try_parse_from(["archive-audit", "--delay", "soon"]).is_err());
    }
}
