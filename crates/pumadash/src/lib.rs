//! `pumadash` - A terminal dashboard for UAV telemetry
//!
//! This library polls a telemetry backend for flight data and
//! anomaly-detection results, holds the latest snapshot, and renders it as
//! status cards, time-series charts and a table.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod poller;
pub mod report;
pub mod state;
pub mod telemetry;
pub mod tui;
pub mod view;

pub use client::{HttpSource, TelemetrySource};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::{init_file_logging, init_logging};
pub use poller::{Control, Poller};
pub use state::{DashboardState, HistoryLimit};
pub use telemetry::{Snapshot, TelemetryRecord};
