//! `pumadash` - CLI for the UAV telemetry dashboard
//!
//! This binary runs the live terminal dashboard and a few one-shot commands
//! against the telemetry backend.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use pumadash::cli::{AnomaliesCommand, Cli, Command, ConfigCommand, SnapshotCommand, WatchCommand};
use pumadash::telemetry::HealthStatus;
use pumadash::view::{StatusCards, TableView, ViewOptions};
use pumadash::{init_file_logging, init_logging, report, tui, Config, HttpSource, TelemetrySource};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration, then apply command-line overrides
    let mut config =
        Config::load_from(cli.config.clone()).context("failed to load configuration")?;
    if let Some(base_url) = &cli.base_url {
        config.api.base_url.clone_from(base_url);
    }
    if let Command::Watch(WatchCommand {
        interval_ms: Some(ms),
        ..
    }) = &cli.command
    {
        config.poll.interval_ms = *ms;
    }
    config.validate().context("invalid command-line overrides")?;

    // The dashboard owns the terminal, so it logs to a file
    if matches!(cli.command, Command::Watch(_)) {
        let log_file = config.log_file_path();
        init_file_logging(cli.verbosity(), &log_file)
            .with_context(|| format!("failed to open log file {}", log_file.display()))?;
    } else {
        init_logging(cli.verbosity());
    }
    debug!(base_url = config.base_url(), "configuration loaded");

    match cli.command {
        Command::Watch(cmd) => handle_watch(&config, &cmd).await,
        Command::Snapshot(cmd) => handle_snapshot(&config, &cmd).await,
        Command::Anomalies(cmd) => handle_anomalies(&config, &cmd).await,
        Command::Status(cmd) => handle_status(&config, cmd.json).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

async fn handle_watch(config: &Config, cmd: &WatchCommand) -> Result<()> {
    let source: Arc<dyn TelemetrySource> = Arc::new(HttpSource::from_config(config)?);
    let limit = cmd.limit.unwrap_or(config.poll.history_limit);
    tui::run_dashboard(
        source,
        config.poll_interval(),
        limit,
        ViewOptions {
            table_rows: config.display.table_rows,
        },
    )
    .await
    .context("dashboard failed")?;
    Ok(())
}

async fn handle_snapshot(config: &Config, cmd: &SnapshotCommand) -> Result<()> {
    let source = HttpSource::from_config(config)?;
    let limit = cmd.limit.unwrap_or(config.poll.history_limit);
    let snapshot = source
        .fetch_snapshot(limit)
        .await
        .with_context(|| format!("failed to fetch snapshot from {}", source.base_url()))?;
    info!(records = snapshot.history.len(), "snapshot fetched");

    let cards = StatusCards::from_latest(snapshot.latest.as_ref());
    let table = TableView::from_history(&snapshot.history, config.display.table_rows);
    print!("{}", report::snapshot(&cards, &table, limit, cmd.format)?);
    Ok(())
}

async fn handle_anomalies(config: &Config, cmd: &AnomaliesCommand) -> Result<()> {
    let source = HttpSource::from_config(config)?;
    let records = source
        .fetch_anomalies()
        .await
        .with_context(|| format!("failed to fetch anomalies from {}", source.base_url()))?;
    print!("{}", report::anomalies(&records, cmd.format)?);
    Ok(())
}

async fn handle_status(config: &Config, json: bool) -> Result<()> {
    let source = HttpSource::from_config(config)?;
    let status = match source.health_status().await {
        Ok(status) => status,
        Err(e) => {
            debug!(error = %e, "health check failed");
            HealthStatus {
                connected: false,
                status: Some("unreachable".to_string()),
                message: Some(e.to_string()),
            }
        }
    };
    print!("{}", report::health(source.base_url(), &status, json)?);
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[API]");
                println!("  Base URL:           {}", config.base_url());
                println!("  Timeout (ms):       {}", config.api.timeout_ms);
                println!("  Layout:             {:?}", config.api.layout);
                println!();
                println!("[Poll]");
                println!("  Interval (ms):      {}", config.poll.interval_ms);
                println!("  History limit:      {}", config.poll.history_limit);
                println!();
                println!("[Display]");
                println!("  Table rows:         {}", config.display.table_rows);
                println!();
                println!("[Logging]");
                println!("  Log file:           {}", config.log_file_path().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
