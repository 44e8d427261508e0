//! Configuration management for pumadash.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::HistoryLimit;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "pumadash";

/// Default log file name for the live dashboard.
const LOG_FILE_NAME: &str = "pumadash.log";

/// Smallest accepted poll interval.
const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `PUMADASH_`)
/// 2. TOML config file at `~/.config/pumadash/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend API configuration.
    pub api: ApiConfig,
    /// Polling configuration.
    pub poll: PollConfig,
    /// Display configuration.
    pub display: DisplayConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Which backend URL shape to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointLayout {
    /// `GET /telemetry/latest?history_limit=<n>` returning `{ latest, history }`.
    #[default]
    Latest,
    /// `GET /telemetry?limit=<n>` returning a newest-first list.
    List,
}

impl EndpointLayout {
    /// Path of the health endpoint served alongside this layout.
    #[must_use]
    pub fn health_path(self) -> &'static str {
        match self {
            Self::Latest => "/status",
            Self::List => "/health",
        }
    }
}

/// Backend API configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the telemetry backend, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Endpoint layout used for snapshots.
    pub layout: EndpointLayout,
}

/// Polling configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Interval between poll ticks in milliseconds.
    pub interval_ms: u64,
    /// Initial history window.
    pub history_limit: HistoryLimit,
}

/// Display configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Maximum number of rows in the telemetry table.
    pub table_rows: usize,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log file used while the live dashboard owns the terminal.
    /// Defaults to `~/.local/share/pumadash/pumadash.log`
    pub file: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_ms: 10_000,
            layout: EndpointLayout::Latest,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1_000,
            history_limit: HistoryLimit::default(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { table_rows: 50 }
    }
}

impl Config {
    /// Load configuration with an optional custom config path.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `PUMADASH_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("PUMADASH_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let base = self.api.base_url.trim();
        match reqwest::Url::parse(base) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(Error::ConfigValidation {
                    message: format!("base_url must use http or https, got '{}'", url.scheme()),
                });
            }
            Err(e) => {
                return Err(Error::ConfigValidation {
                    message: format!("invalid base_url '{base}': {e}"),
                });
            }
        }

        if self.api.timeout_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "timeout_ms must be greater than 0".to_string(),
            });
        }

        if self.poll.interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(Error::ConfigValidation {
                message: format!(
                    "interval_ms ({}) must be at least {MIN_POLL_INTERVAL_MS}",
                    self.poll.interval_ms
                ),
            });
        }

        if self.display.table_rows == 0 {
            return Err(Error::ConfigValidation {
                message: "table_rows must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Base URL with any trailing slash removed.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.api.base_url.trim().trim_end_matches('/')
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.api.timeout_ms)
    }

    /// Get the poll interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms)
    }

    /// Get the log file path, resolving defaults if not set.
    #[must_use]
    pub fn log_file_path(&self) -> PathBuf {
        self.logging
            .file
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(LOG_FILE_NAME))
    }
}
