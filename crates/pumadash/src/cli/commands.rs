//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::state::HistoryLimit;

/// Parse a `--limit` value into one of the allowed history windows.
fn parse_history_limit(value: &str) -> Result<HistoryLimit, String> {
    let n: u32 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a number"))?;
    HistoryLimit::try_from(n).map_err(|e| e.to_string())
}

/// Live dashboard arguments.
#[derive(Debug, Args)]
pub struct WatchCommand {
    /// History window (50, 100, 150 or 300 records)
    #[arg(short, long, value_parser = parse_history_limit)]
    pub limit: Option<HistoryLimit>,

    /// Poll interval in milliseconds
    #[arg(short, long, value_name = "MS")]
    pub interval_ms: Option<u64>,
}

/// One-shot snapshot arguments.
#[derive(Debug, Args)]
pub struct SnapshotCommand {
    /// History window (50, 100, 150 or 300 records)
    #[arg(short, long, value_parser = parse_history_limit)]
    pub limit: Option<HistoryLimit>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Anomaly listing arguments.
#[derive(Debug, Args)]
pub struct AnomaliesCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}
