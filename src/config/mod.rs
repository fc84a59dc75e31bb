//! Configuration Module - TOML-based Monitor Configuration
//!
//! Loads `config.toml` (optional) and applies environment variable
//! overrides, including values from a `.env` file. Every section has
//! defaults; only the database URL and the ticker list are required.

pub mod loader;

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::policy::{
  EvaluationPolicy, DEFAULT_MAX_LAG_SECONDS, DEFAULT_MIN_TICKS_IN_WINDOW, DEFAULT_WINDOW_SECONDS,
};
use crate::domain::series::SeriesId;

/// Top-level monitor configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// HTTP listener settings.
  pub server: ServerConfig,
  /// Datastore connection and timing.
  pub database: DatabaseConfig,
  /// Tickers and freshness thresholds.
  pub monitor: MonitorConfig,
  /// Log output.
  pub logging: LoggingConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  /// Bind address for /health, /metrics and /ready.
  pub addr: String,
  /// Grace period for in-flight requests on shutdown (milliseconds).
  pub shutdown_timeout_ms: u64,
  /// Time a client gets to send complete request headers (milliseconds).
  pub read_header_timeout_ms: u64,
}

/// Datastore configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
  /// Postgres connection URL. Required.
  pub url: String,
  /// Pool size upper bound.
  pub max_connections: u32,
  /// Budget for probe + stats query per request (milliseconds).
  pub probe_timeout_ms: u64,
  /// Startup gate deadline (milliseconds).
  pub startup_timeout_ms: u64,
  /// Startup gate retry interval (milliseconds).
  pub startup_interval_ms: u64,
}

/// Ticker list and evaluation thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
  /// Tickers in evaluation order. Required.
  pub tickers: Vec<SeriesId>,
  /// Trailing window for tick counting (seconds).
  pub window_seconds: i64,
  /// Maximum tolerated freshness (seconds).
  pub max_lag_seconds: i64,
  /// Minimum ticks required inside the window.
  pub min_ticks_in_window: i64,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
  pub log_level: String,
  /// JSON lines instead of human-readable output.
  pub json: bool,
}

impl AppConfig {
  /// Evaluation thresholds; non-positive values fall back to defaults.
  pub const fn policy(&self) -> EvaluationPolicy {
    EvaluationPolicy::new(
      self.monitor.window_seconds,
      self.monitor.max_lag_seconds,
      self.monitor.min_ticks_in_window,
    )
  }

  pub const fn probe_timeout(&self) -> Duration {
    Duration::from_millis(self.database.probe_timeout_ms)
  }

  pub const fn startup_timeout(&self) -> Duration {
    Duration::from_millis(self.database.startup_timeout_ms)
  }

  pub const fn startup_interval(&self) -> Duration {
    Duration::from_millis(self.database.startup_interval_ms)
  }

  pub const fn shutdown_timeout(&self) -> Duration {
    Duration::from_millis(self.server.shutdown_timeout_ms)
  }

  pub const fn read_header_timeout(&self) -> Duration {
    Duration::from_millis(self.server.read_header_timeout_ms)
  }
}

/// One-line summary for startup logs. Never includes the database URL.
impl fmt::Display for AppConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let policy = self.policy();
    write!(
      f,
      "addr={} tickers={:?} window={}s max_lag={}s min_ticks={}",
      self.server.addr,
      self.monitor.tickers,
      policy.window_seconds(),
      policy.max_lag_seconds(),
      policy.min_ticks_in_window()
    )
  }
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      addr: default_addr(),
      shutdown_timeout_ms: 10_000,
      read_header_timeout_ms: 5_000,
    }
  }
}

impl Default for DatabaseConfig {
  fn default() -> Self {
    Self {
      url: String::new(),
      max_connections: 5,
      probe_timeout_ms: 2_000,
      startup_timeout_ms: 30_000,
      startup_interval_ms: 500,
    }
  }
}

impl Default for MonitorConfig {
  fn default() -> Self {
    Self {
      tickers: Vec::new(),
      window_seconds: DEFAULT_WINDOW_SECONDS,
      max_lag_seconds: DEFAULT_MAX_LAG_SECONDS,
      min_ticks_in_window: DEFAULT_MIN_TICKS_IN_WINDOW,
    }
  }
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      log_level: "info".to_string(),
      json: true,
    }
  }
}

fn default_addr() -> String {
  "0.0.0.0:9100".to_string()
}
