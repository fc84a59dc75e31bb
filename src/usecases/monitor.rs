//! Freshness Monitor Use Case - Per-Request Evaluation Pipeline
//!
//! Orchestrates one evaluation per inbound request:
//! 1. Bounded liveness probe
//! 2. Bounded stats fetch for the configured tickers
//! 3. Pure evaluation into a report, verdict or exposition
//!
//! Probe and fetch share a single deadline. Expiry is a failure like
//! any other, and nothing is retried inside a request.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, instrument, warn};

use crate::domain::error::MonitorError;
use crate::domain::exposition::Scrape;
use crate::domain::freshness::{evaluate, FreshnessReport};
use crate::domain::policy::EvaluationPolicy;
use crate::domain::readiness::{readiness_verdict, ReadinessVerdict};
use crate::domain::series::SeriesId;
use crate::ports::stats_repository::StatsRepository;

/// Stateless evaluator bound to a repository and the configured tickers.
#[derive(Clone)]
pub struct FreshnessMonitor {
  repo: Arc<dyn StatsRepository>,
  /// Tickers in configured order.
  series: Arc<[SeriesId]>,
  policy: EvaluationPolicy,
  /// Budget for probe + fetch of a single request.
  request_timeout: Duration,
}

impl FreshnessMonitor {
  /// Create a new monitor.
  pub fn new(
    repo: Arc<dyn StatsRepository>,
    series: Vec<SeriesId>,
    policy: EvaluationPolicy,
    request_timeout: Duration,
  ) -> Self {
    Self {
      repo,
      series: series.into(),
      policy,
      request_timeout,
    }
  }

  pub fn series(&self) -> &[SeriesId] {
    &self.series
  }

  pub const fn policy(&self) -> &EvaluationPolicy {
    &self.policy
  }

  /// Liveness only: probe the datastore within the request budget.
  ///
  /// # Errors
  /// Returns `ProbeFailure` if the probe fails or times out.
  #[instrument(skip(self))]
  pub async fn health(&self) -> Result<(), MonitorError> {
    self.probe(Instant::now() + self.request_timeout).await
  }

  /// Probe, fetch and evaluate at wall-clock now.
  ///
  /// # Errors
  /// Returns `ProbeFailure` or `QueryFailure`.
  pub async fn evaluate(&self) -> Result<FreshnessReport, MonitorError> {
    self.evaluate_at(Utc::now().timestamp()).await
  }

  /// Probe, fetch and evaluate at the given Unix time.
  ///
  /// # Errors
  /// Returns `ProbeFailure` or `QueryFailure`.
  #[instrument(skip(self))]
  pub async fn evaluate_at(&self, now: i64) -> Result<FreshnessReport, MonitorError> {
    let deadline = Instant::now() + self.request_timeout;

    self.probe(deadline).await?;

    let window_start = self.policy.window_start(now);
    let snapshot = match timeout_at(deadline, self.repo.fetch(&self.series, window_start)).await {
      Ok(Ok(snapshot)) => snapshot,
      Ok(Err(e)) => {
        warn!(error = %format!("{e:#}"), "Failed to query ticker stats");
        return Err(MonitorError::QueryFailure(format!("{e:#}")));
      }
      Err(_) => {
        warn!(timeout_ms = self.request_timeout.as_millis(), "Ticker stats query timed out");
        return Err(MonitorError::query_timeout(self.request_timeout));
      }
    };

    let report = evaluate(&snapshot, &self.series, now, &self.policy);
    debug!(
      tickers = report.series.len(),
      all_ok = report.all_ok(),
      last_ts_overall = report.overall.last_ts,
      "Freshness evaluated"
    );
    Ok(report)
  }

  /// Everything `/metrics` renders, at wall-clock now.
  pub async fn scrape(&self) -> Scrape {
    self.scrape_at(Utc::now().timestamp()).await
  }

  /// Everything `/metrics` renders, at the given Unix time.
  pub async fn scrape_at(&self, now: i64) -> Scrape {
    match self.evaluate_at(now).await {
      Ok(report) => Scrape::Evaluated(report),
      Err(MonitorError::ProbeFailure(_)) => Scrape::DbDown,
      Err(_) => Scrape::QueryFailed,
    }
  }

  /// Readiness verdict at wall-clock now.
  pub async fn readiness(&self) -> ReadinessVerdict {
    self.readiness_at(Utc::now().timestamp()).await
  }

  /// Readiness verdict at the given Unix time.
  pub async fn readiness_at(&self, now: i64) -> ReadinessVerdict {
    match self.evaluate_at(now).await {
      Ok(report) => readiness_verdict(&report),
      Err(MonitorError::ProbeFailure(_)) => ReadinessVerdict::db_unavailable(),
      Err(_) => ReadinessVerdict::stats_unavailable(),
    }
  }

  async fn probe(&self, deadline: Instant) -> Result<(), MonitorError> {
    match timeout_at(deadline, self.repo.probe()).await {
      Ok(Ok(())) => Ok(()),
      Ok(Err(e)) => {
        debug!(error = %format!("{e:#}"), "Datastore probe failed");
        Err(MonitorError::ProbeFailure(format!("{e:#}")))
      }
      Err(_) => Err(MonitorError::probe_timeout(self.request_timeout)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::series::{RawSeriesStat, StatsSnapshot};
  use async_trait::async_trait;

  const NOW: i64 = 1_700_000_000;

  /// Hand-rolled fake with fixed behavior per call.
  struct FixedRepo {
    probe_ok: bool,
    rows: Option<Vec<RawSeriesStat>>,
    hang_fetch: bool,
    hang_probe: bool,
  }

  #[async_trait]
  impl StatsRepository for FixedRepo {
    async fn fetch(&self, series: &[SeriesId], _window_start_ts: i64) -> anyhow::Result<StatsSnapshot> {
      if self.hang_fetch {
        std::future::pending::<()>().await;
      }
      match &self.rows {
        Some(rows) => Ok(StatsSnapshot::from_rows(series, rows.clone())),
        None => anyhow::bail!("relation \"price_ticks\" does not exist"),
      }
    }

    async fn probe(&self) -> anyhow::Result<()> {
      if self.hang_probe {
        std::future::pending::<()>().await;
      }
      if self.probe_ok {
        Ok(())
      } else {
        anyhow::bail!("connection refused")
      }
    }
  }

  fn monitor(repo: FixedRepo) -> FreshnessMonitor {
    FreshnessMonitor::new(
      Arc::new(repo),
      vec!["btc_usd".to_string(), "eth_usd".to_string()],
      EvaluationPolicy::default(),
      Duration::from_secs(2),
    )
  }

  fn stat(id: &str, last_ts: i64, count: i64) -> RawSeriesStat {
    RawSeriesStat {
      series_id: id.to_string(),
      last_ts,
      count_in_window: count,
    }
  }

  #[tokio::test]
  async fn test_probe_failure_short_circuits() {
    let m = monitor(FixedRepo { probe_ok: false, rows: Some(vec![]), hang_fetch: false, hang_probe: false });

    assert!(matches!(m.health().await, Err(MonitorError::ProbeFailure(_))));
    assert_eq!(m.scrape_at(NOW).await, Scrape::DbDown);
    assert_eq!(m.readiness_at(NOW).await, ReadinessVerdict::db_unavailable());
  }

  #[tokio::test]
  async fn test_query_failure_degrades() {
    let m = monitor(FixedRepo { probe_ok: true, rows: None, hang_fetch: false, hang_probe: false });

    assert!(m.health().await.is_ok());
    assert_eq!(m.scrape_at(NOW).await, Scrape::QueryFailed);
    assert_eq!(m.readiness_at(NOW).await, ReadinessVerdict::stats_unavailable());
  }

  #[tokio::test(start_paused = true)]
  async fn test_fetch_timeout_is_query_failure() {
    let m = monitor(FixedRepo { probe_ok: true, rows: Some(vec![]), hang_fetch: true, hang_probe: false });

    let err = m.evaluate_at(NOW).await.unwrap_err();
    assert!(matches!(err, MonitorError::QueryFailure(_)));
  }

  #[tokio::test(start_paused = true)]
  async fn test_hanging_datastore_is_db_down() {
    let m = monitor(FixedRepo { probe_ok: true, rows: Some(vec![]), hang_fetch: false, hang_probe: true });
    let started = Instant::now();

    assert!(matches!(m.health().await, Err(MonitorError::ProbeFailure(_))));
    assert_eq!(started.elapsed(), Duration::from_secs(2));
    assert_eq!(m.scrape_at(NOW).await, Scrape::DbDown);
    assert_eq!(m.readiness_at(NOW).await, ReadinessVerdict::db_unavailable());
  }

  #[tokio::test]
  async fn test_no_data_for_second_ticker() {
    let m = monitor(FixedRepo {
      probe_ok: true,
      rows: Some(vec![stat("btc_usd", NOW, 10)]),
      hang_fetch: false,
      hang_probe: false,
    });

    let verdict = m.readiness_at(NOW).await;
    assert_eq!(
      serde_json::to_string(&verdict.body()).unwrap(),
      r#"{"status":"no_data","ticker":"eth_usd"}"#
    );
  }

  #[tokio::test]
  async fn test_healthy_pipeline_is_ready() {
    let m = monitor(FixedRepo {
      probe_ok: true,
      rows: Some(vec![stat("btc_usd", NOW - 1, 10), stat("eth_usd", NOW - 2, 10)]),
      hang_fetch: false,
      hang_probe: false,
    });

    assert!(m.readiness_at(NOW).await.is_ready());
    let report = m.evaluate_at(NOW).await.unwrap();
    assert_eq!(report.overall.last_ts, NOW - 1);
  }
}
