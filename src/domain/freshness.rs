//! Freshness Evaluator - Per-Ticker and Overall Ingestion Health
//!
//! Pure function of (stats, configured order, now, policy). No I/O and
//! no caching: every request evaluates from scratch so staleness is
//! never reported from a stale computation.
//!
//! `freshness_seconds = now - last_ts` for observed tickers and 0
//! otherwise. A `now` earlier than `last_ts` passes the negative
//! difference through unchanged.

use serde::Serialize;

use super::policy::EvaluationPolicy;
use super::series::{RawSeriesStat, SeriesId, StatsSnapshot};

/// Evaluated health of a single ticker for one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesHealth {
    /// Ticker identifier.
    pub series_id: SeriesId,
    /// Unix seconds of the last tick, 0 if never observed.
    pub last_ts: i64,
    /// Ticks counted in the trailing window.
    pub count_in_window: i64,
    /// Seconds since the last tick, 0 if never observed.
    pub freshness_seconds: i64,
    /// Observed, fresh enough and complete enough.
    pub ingestion_ok: bool,
}

/// Aggregate over every evaluated ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OverallHealth {
    /// Newest tick across all tickers, 0 if none.
    pub last_ts: i64,
    /// Seconds since `last_ts`, 0 if none.
    pub freshness_seconds: i64,
}

/// Everything the readiness gate and the metrics renderer need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FreshnessReport {
    /// Per-ticker health in configured order.
    pub series: Vec<SeriesHealth>,
    /// Aggregate health.
    pub overall: OverallHealth,
    /// Policy the report was evaluated against.
    pub policy: EvaluationPolicy,
    /// Evaluation time (Unix seconds).
    pub evaluated_at: i64,
}

impl FreshnessReport {
    /// Whether every ticker is ingesting within policy.
    pub fn all_ok(&self) -> bool {
        self.series.iter().all(|s| s.ingestion_ok)
    }
}

/// Evaluate one ticker against the policy.
pub fn evaluate_series(stat: &RawSeriesStat, now: i64, policy: &EvaluationPolicy) -> SeriesHealth {
    let freshness_seconds = freshness(stat.last_ts, now);

    let ingestion_ok = stat.observed()
        && freshness_seconds <= policy.max_lag_seconds()
        && stat.count_in_window >= policy.min_ticks_in_window();

    SeriesHealth {
        series_id: stat.series_id.clone(),
        last_ts: stat.last_ts,
        count_in_window: stat.count_in_window,
        freshness_seconds,
        ingestion_ok,
    }
}

/// Evaluate every ticker in `order` plus the overall aggregate.
///
/// Iteration is driven by `order`, never by the snapshot, so callers
/// see tickers in the configured sequence.
pub fn evaluate(
    snapshot: &StatsSnapshot,
    order: &[SeriesId],
    now: i64,
    policy: &EvaluationPolicy,
) -> FreshnessReport {
    let series = order
        .iter()
        .map(|id| evaluate_series(&snapshot.get(id), now, policy))
        .collect();

    let last_ts = snapshot.last_ts_overall();

    FreshnessReport {
        series,
        overall: OverallHealth {
            last_ts,
            freshness_seconds: freshness(last_ts, now),
        },
        policy: *policy,
        evaluated_at: now,
    }
}

const fn freshness(last_ts: i64, now: i64) -> i64 {
    if last_ts > 0 { now - last_ts } else { 0 }
}
