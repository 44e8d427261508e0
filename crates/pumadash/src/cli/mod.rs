//! Command-line interface for pumadash.
//!
//! This module provides the CLI structure for the `pumadash` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AnomaliesCommand, ConfigCommand, OutputFormat, SnapshotCommand, StatusCommand, WatchCommand,
};

/// pumadash - Terminal dashboard for UAV telemetry
///
/// Polls a telemetry backend for flight data and anomaly-detection results
/// and shows them as status cards, charts and a table.
#[derive(Debug, Parser)]
#[command(name = "pumadash")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override the backend base URL
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the live terminal dashboard
    Watch(WatchCommand),

    /// Fetch one snapshot and print it
    Snapshot(SnapshotCommand),

    /// List records classified as anomalous
    Anomalies(AnomaliesCommand),

    /// Check backend health
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
