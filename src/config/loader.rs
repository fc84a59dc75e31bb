//! Configuration Loader - File Loading, Env Overrides and Validation
//!
//! Precedence: environment > `config.toml` > built-in defaults.
//! A missing config file is not an error; container deployments
//! usually configure everything through the environment.
//!
//! Loading runs before the tracing subscriber exists, so nothing here
//! logs directly. Problems worth reporting are collected in
//! [`LoadedConfig::warnings`] and emitted by [`LoadedConfig::log`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::AppConfig;
use crate::domain::error::MonitorError;
use crate::domain::series::SeriesId;

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "MONITOR_CONFIG";
/// Config file used when `MONITOR_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Validated configuration plus what happened while loading it.
#[derive(Debug)]
pub struct LoadedConfig {
  pub config: AppConfig,
  /// Config file that was read, `None` when running from env + defaults.
  pub source: Option<PathBuf>,
  /// Non-fatal problems, e.g. an ignored malformed override.
  pub warnings: Vec<String>,
}

impl LoadedConfig {
  /// Emit the load summary and every collected warning.
  ///
  /// Call after the subscriber is installed.
  pub fn log(&self) {
    let source = self
      .source
      .as_deref()
      .map_or_else(|| "<env only>".to_string(), |p| p.display().to_string());
    info!(
      tickers = self.config.monitor.tickers.len(),
      source = %source,
      "Configuration loaded successfully"
    );
    for warning in &self.warnings {
      warn!(warning = %warning, "Configuration warning");
    }
  }
}

/// Load `.env` into the process environment.
///
/// A missing `.env` is normal. Any other failure (unreadable file,
/// malformed line) is returned as a warning for [`LoadedConfig::log`].
pub fn load_dotenv() -> Option<String> {
  dotenv_warning(dotenvy::dotenv())
}

fn dotenv_warning<T>(result: dotenvy::Result<T>) -> Option<String> {
  match result {
    Ok(_) => None,
    Err(e) if e.not_found() => None,
    Err(e) => Some(format!("Failed to load .env: {e}")),
  }
}

/// Load configuration from `path`, then apply process environment overrides.
///
/// # Errors
/// Returns detailed error if:
/// - The file exists but can't be read or parsed
/// - Validation rules are violated (wrapped as `ConfigurationError`)
pub fn load_config(path: &str) -> Result<LoadedConfig> {
  load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an injectable environment lookup.
///
/// # Errors
/// See [`load_config`].
pub fn load_config_with<F>(path: &str, env: F) -> Result<LoadedConfig>
where
  F: Fn(&str) -> Option<String>,
{
  let path = Path::new(path);

  let (mut config, source) = if path.exists() {
    let content = std::fs::read_to_string(path)
      .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = toml::from_str::<AppConfig>(&content)
      .with_context(|| format!("Failed to parse {}", path.display()))?;
    (config, Some(path.to_path_buf()))
  } else {
    (AppConfig::default(), None)
  };

  let warnings = apply_env_overrides(&mut config, env);
  normalize(&mut config);

  validate_config(&config).map_err(|e| MonitorError::Configuration(format!("{e:#}")))?;

  Ok(LoadedConfig {
    config,
    source,
    warnings,
  })
}

/// Apply the sidecar's environment surface on top of file values.
///
/// Malformed integers keep the current value; one warning is returned
/// per ignored override.
pub fn apply_env_overrides<F>(config: &mut AppConfig, env: F) -> Vec<String>
where
  F: Fn(&str) -> Option<String>,
{
  let lookup = |key: &str| {
    env(key)
      .map(|v| v.trim().to_string())
      .filter(|v| !v.is_empty())
  };

  if let Some(addr) = lookup("ADDR") {
    config.server.addr = addr;
  }
  if let Some(url) = lookup("DATABASE_URL") {
    config.database.url = url;
  }
  if let Some(raw) = lookup("TICKERS") {
    config.monitor.tickers = parse_tickers(&raw);
  }
  if let Some(level) = lookup("LOG_LEVEL") {
    config.logging.log_level = level.to_lowercase();
  }

  let monitor = &mut config.monitor;
  [
    ("WINDOW_SECONDS", &mut monitor.window_seconds),
    ("MAX_LAG_SECONDS", &mut monitor.max_lag_seconds),
    ("MIN_TICKS_IN_WINDOW", &mut monitor.min_ticks_in_window),
  ]
  .into_iter()
  .filter_map(|(key, target)| override_i64(&lookup, key, target))
  .collect()
}

fn override_i64<F>(lookup: &F, key: &str, target: &mut i64) -> Option<String>
where
  F: Fn(&str) -> Option<String>,
{
  let raw = lookup(key)?;
  match raw.parse::<i64>() {
    Ok(value) => {
      *target = value;
      None
    }
    Err(_) => Some(format!(
      "Invalid integer {key}={raw:?}, keeping current value {target}"
    )),
  }
}

/// Parse a ticker list from either a JSON array or a comma-separated string.
///
/// Entries are trimmed and empty entries dropped. Order is preserved.
pub fn parse_tickers(raw: &str) -> Vec<SeriesId> {
  let raw = raw.trim();

  if raw.starts_with('[') {
    if let Ok(items) = serde_json::from_str::<Vec<String>>(raw) {
      return clean(items.iter().map(String::as_str));
    }
  }

  clean(raw.split(','))
}

fn clean<'a>(items: impl Iterator<Item = &'a str>) -> Vec<SeriesId> {
  items
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .map(str::to_string)
    .collect()
}

fn normalize(config: &mut AppConfig) {
  // Go-style ":9100" means all interfaces.
  if config.server.addr.starts_with(':') {
    config.server.addr = format!("0.0.0.0{}", config.server.addr);
  }
}

/// Validate all configuration parameters.
///
/// Non-positive policy values are accepted: the policy falls back to
/// its defaults.
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.database.url.is_empty(),
    "DATABASE_URL (database.url) is required"
  );

  anyhow::ensure!(
    !config.monitor.tickers.is_empty(),
    "TICKERS is required, example: TICKERS=btc_usd,eth_usd"
  );
  for (i, ticker) in config.monitor.tickers.iter().enumerate() {
    anyhow::ensure!(!ticker.trim().is_empty(), "Ticker {i} is empty");
  }

  anyhow::ensure!(!config.server.addr.is_empty(), "server.addr must not be empty");
  anyhow::ensure!(
    config.database.max_connections > 0,
    "database.max_connections must be positive"
  );
  anyhow::ensure!(
    config.database.probe_timeout_ms > 0,
    "database.probe_timeout_ms must be positive"
  );
  anyhow::ensure!(
    config.database.startup_timeout_ms > 0,
    "database.startup_timeout_ms must be positive"
  );
  anyhow::ensure!(
    config.database.startup_interval_ms > 0,
    "database.startup_interval_ms must be positive"
  );
  anyhow::ensure!(
    config.server.shutdown_timeout_ms > 0,
    "server.shutdown_timeout_ms must be positive"
  );
  anyhow::ensure!(
    config.server.read_header_timeout_ms > 0,
    "server.read_header_timeout_ms must be positive"
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
      .iter()
      .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
      .collect();
    move |key| map.get(key).cloned()
  }

  #[test]
  fn test_parse_tickers_csv() {
    assert_eq!(parse_tickers(" btc_usd, ,eth_usd ,"), vec!["btc_usd", "eth_usd"]);
  }

  #[test]
  fn test_parse_tickers_json_array() {
    assert_eq!(parse_tickers(r#"["btc_usd", " eth_usd", ""]"#), vec!["btc_usd", "eth_usd"]);
  }

  #[test]
  fn test_parse_tickers_malformed_json_falls_back_to_csv() {
    assert_eq!(parse_tickers("[btc_usd,eth_usd"), vec!["[btc_usd", "eth_usd"]);
  }

  #[test]
  fn test_missing_file_uses_defaults_and_env() {
    let loaded = load_config_with(
      "nonexistent.toml",
      env(&[
        ("DATABASE_URL", "postgres://app:app@db:5432/crypto"),
        ("TICKERS", "btc_usd,eth_usd"),
        ("ADDR", ":9200"),
        ("WINDOW_SECONDS", "600"),
        ("MAX_LAG_SECONDS", "abc"),
      ]),
    )
    .unwrap();
    let config = &loaded.config;

    assert!(loaded.source.is_none());
    assert_eq!(config.server.addr, "0.0.0.0:9200");
    assert_eq!(config.monitor.tickers, vec!["btc_usd", "eth_usd"]);
    assert_eq!(config.policy().window_seconds(), 600);
    assert_eq!(config.policy().max_lag_seconds(), 120);
    assert_eq!(config.probe_timeout().as_millis(), 2_000);
    assert_eq!(config.read_header_timeout().as_millis(), 5_000);
    assert_eq!(loaded.warnings.len(), 1);
    assert!(loaded.warnings[0].contains("MAX_LAG_SECONDS"));
  }

  #[test]
  fn test_malformed_overrides_are_reported_not_dropped() {
    let mut config = AppConfig::default();
    let warnings = apply_env_overrides(
      &mut config,
      env(&[
        ("WINDOW_SECONDS", "5m"),
        ("MAX_LAG_SECONDS", "90"),
        ("MIN_TICKS_IN_WINDOW", "four"),
      ]),
    );

    assert_eq!(config.monitor.max_lag_seconds, 90);
    assert_eq!(config.monitor.window_seconds, 300);
    assert_eq!(warnings.len(), 2);
    assert!(warnings[0].contains("WINDOW_SECONDS=\"5m\""));
    assert!(warnings[1].contains("MIN_TICKS_IN_WINDOW"));
  }

  #[test]
  fn test_clean_env_has_no_warnings() {
    let loaded = load_config_with(
      "nonexistent.toml",
      env(&[("DATABASE_URL", "postgres://x"), ("TICKERS", "btc_usd"), ("WINDOW_SECONDS", "600")]),
    )
    .unwrap();

    assert!(loaded.warnings.is_empty());
  }

  #[test]
  fn test_missing_dotenv_is_silent() {
    let missing = std::env::temp_dir().join(format!("monitor-missing-{}.env", std::process::id()));
    assert_eq!(dotenv_warning(dotenvy::from_path(&missing)), None);
  }

  #[test]
  fn test_malformed_dotenv_is_reported() {
    let path = std::env::temp_dir().join(format!("monitor-malformed-{}.env", std::process::id()));
    std::fs::write(&path, "NOT A VALID LINE\n").unwrap();

    let warning = dotenv_warning(dotenvy::from_path(&path));
    std::fs::remove_file(&path).ok();

    assert!(warning.unwrap().starts_with("Failed to load .env"));
  }

  #[test]
  fn test_missing_required_values_rejected() {
    let err = load_config_with("nonexistent.toml", env(&[("TICKERS", "btc_usd")])).unwrap_err();
    assert!(matches!(
      err.downcast_ref::<MonitorError>(),
      Some(MonitorError::Configuration(_))
    ));

    let err = load_config_with("nonexistent.toml", env(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
    assert!(err.to_string().contains("TICKERS"));
  }

  #[test]
  fn test_non_positive_policy_is_not_an_error() {
    let config = load_config_with(
      "nonexistent.toml",
      env(&[
        ("DATABASE_URL", "postgres://x"),
        ("TICKERS", "btc_usd"),
        ("MIN_TICKS_IN_WINDOW", "0"),
      ]),
    )
    .unwrap()
    .config;

    assert_eq!(config.policy().min_ticks_in_window(), 4);
  }

  #[test]
  fn test_toml_file_with_env_precedence() {
    let path = std::env::temp_dir().join(format!("monitor-config-{}.toml", std::process::id()));
    std::fs::write(
      &path,
      r#"
[server]
addr = "127.0.0.1:9300"
read_header_timeout_ms = 1500

[database]
url = "postgres://file"
probe_timeout_ms = 500

[monitor]
tickers = ["sol_usd", "btc_usd"]
max_lag_seconds = 60
"#,
    )
    .unwrap();

    let loaded = load_config_with(
      path.to_str().unwrap(),
      env(&[("DATABASE_URL", "postgres://env")]),
    )
    .unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(loaded.source.as_deref(), Some(path.as_path()));
    let config = loaded.config;

    assert_eq!(config.server.addr, "127.0.0.1:9300");
    assert_eq!(config.read_header_timeout().as_millis(), 1_500);
    assert_eq!(config.database.url, "postgres://env");
    assert_eq!(config.monitor.tickers, vec!["sol_usd", "btc_usd"]);
    assert_eq!(config.policy().max_lag_seconds(), 60);
    assert_eq!(config.probe_timeout().as_millis(), 500);
    assert_eq!(config.database.startup_interval_ms, 500);
  }

  #[test]
  fn test_display_hides_database_url() {
    let config = load_config_with(
      "nonexistent.toml",
      env(&[("DATABASE_URL", "postgres://secret"), ("TICKERS", "btc_usd")]),
    )
    .unwrap()
    .config;

    let summary = config.to_string();
    assert!(summary.contains("btc_usd"));
    assert!(!summary.contains("secret"));
  }
}
