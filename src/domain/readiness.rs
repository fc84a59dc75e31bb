//! Readiness Gate - Fail-Fast Verdict over Evaluated Tickers
//!
//! Walks tickers in configured order and reports only the first
//! failure. `db_unavailable` and `stats_unavailable` are decided by the
//! caller before any ticker is inspected.

use serde::Serialize;

use super::freshness::{FreshnessReport, SeriesHealth};
use super::series::SeriesId;

/// Why the pipeline is not ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotReadyReason {
    /// Liveness probe failed or timed out.
    DbUnavailable,
    /// Aggregation query failed or timed out.
    StatsUnavailable,
    /// A ticker has never been written.
    NoData,
    /// A ticker is stale or below the minimum tick count.
    IngestionLagging,
}

impl NotReadyReason {
    /// Wire name used in JSON bodies.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DbUnavailable => "db_unavailable",
            Self::StatsUnavailable => "stats_unavailable",
            Self::NoData => "no_data",
            Self::IngestionLagging => "ingestion_lagging",
        }
    }
}

/// Facts about a lagging ticker, echoed back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LagDiagnostics {
    pub freshness_seconds: i64,
    pub last_ts: i64,
    #[serde(rename = "cnt_window")]
    pub count_in_window: i64,
    pub max_lag_seconds: i64,
    pub min_ticks_in_window: i64,
    pub window_seconds: i64,
}

/// Outcome of a readiness evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessVerdict {
    Ready,
    NotReady {
        reason: NotReadyReason,
        offending_series: Option<SeriesId>,
        diagnostics: Option<LagDiagnostics>,
    },
}

impl ReadinessVerdict {
    /// Verdict for a failed liveness probe.
    pub const fn db_unavailable() -> Self {
        Self::NotReady {
            reason: NotReadyReason::DbUnavailable,
            offending_series: None,
            diagnostics: None,
        }
    }

    /// Verdict for a failed stats fetch.
    pub const fn stats_unavailable() -> Self {
        Self::NotReady {
            reason: NotReadyReason::StatsUnavailable,
            offending_series: None,
            diagnostics: None,
        }
    }

    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// JSON body returned by `/ready`.
    pub fn body(&self) -> ReadinessBody<'_> {
        match self {
            Self::Ready => ReadinessBody {
                status: "ready",
                ticker: None,
                diagnostics: None,
            },
            Self::NotReady {
                reason,
                offending_series,
                diagnostics,
            } => ReadinessBody {
                status: reason.as_str(),
                ticker: offending_series.as_deref(),
                diagnostics: *diagnostics,
            },
        }
    }
}

/// Serialized form of a verdict. Field order is the wire order.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessBody<'a> {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<&'a str>,
    #[serde(flatten)]
    pub diagnostics: Option<LagDiagnostics>,
}

/// Return the verdict for the first failing ticker, or `Ready`.
pub fn readiness_verdict(report: &FreshnessReport) -> ReadinessVerdict {
    report
        .series
        .iter()
        .find_map(|health| series_verdict(health, report))
        .unwrap_or(ReadinessVerdict::Ready)
}

fn series_verdict(health: &SeriesHealth, report: &FreshnessReport) -> Option<ReadinessVerdict> {
    if health.last_ts == 0 {
        return Some(ReadinessVerdict::NotReady {
            reason: NotReadyReason::NoData,
            offending_series: Some(health.series_id.clone()),
            diagnostics: None,
        });
    }

    if health.ingestion_ok {
        return None;
    }

    Some(ReadinessVerdict::NotReady {
        reason: NotReadyReason::IngestionLagging,
        offending_series: Some(health.series_id.clone()),
        diagnostics: Some(LagDiagnostics {
            freshness_seconds: health.freshness_seconds,
            last_ts: health.last_ts,
            count_in_window: health.count_in_window,
            max_lag_seconds: report.policy.max_lag_seconds(),
            min_ticks_in_window: report.policy.min_ticks_in_window(),
            window_seconds: report.policy.window_seconds(),
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::freshness::evaluate;
    use crate::domain::policy::EvaluationPolicy;
    use crate::domain::series::{RawSeriesStat, StatsSnapshot};

    const NOW: i64 = 1_700_000_000;

    fn report(rows: &[(&str, i64, i64)]) -> FreshnessReport {
        let order: Vec<SeriesId> = rows.iter().map(|(id, _, _)| (*id).to_string()).collect();
        let snapshot = StatsSnapshot::from_rows(
            &order,
            rows.iter().map(|(id, last_ts, count)| RawSeriesStat {
                series_id: (*id).to_string(),
                last_ts: *last_ts,
                count_in_window: *count,
            }),
        );
        evaluate(&snapshot, &order, NOW, &EvaluationPolicy::default())
    }

    #[test]
    fn test_all_healthy_is_ready() {
        let verdict = readiness_verdict(&report(&[("btc_usd", NOW, 10), ("eth_usd", NOW - 5, 6)]));
        assert!(verdict.is_ready());
        assert_eq!(serde_json::to_string(&verdict.body()).unwrap(), r#"{"status":"ready"}"#);
    }

    #[test]
    fn test_no_data_reported_for_first_unobserved() {
        let verdict = readiness_verdict(&report(&[("btc_usd", NOW, 10), ("eth_usd", 0, 0)]));
        assert_eq!(
            serde_json::to_string(&verdict.body()).unwrap(),
            r#"{"status":"no_data","ticker":"eth_usd"}"#
        );
    }

    #[test]
    fn test_only_first_failure_is_reported() {
        let facts = report(&[("a", NOW, 10), ("b", NOW - 500, 10), ("c", 0, 0)]);

        let first = readiness_verdict(&facts);
        let second = readiness_verdict(&facts);

        assert_eq!(first, second);
        match first {
            ReadinessVerdict::NotReady {
                reason,
                offending_series,
                ..
            } => {
                assert_eq!(reason, NotReadyReason::IngestionLagging);
                assert_eq!(offending_series.as_deref(), Some("b"));
            }
            ReadinessVerdict::Ready => panic!("expected not ready"),
        }
    }

    #[test]
    fn test_lagging_body_carries_diagnostics_in_wire_order() {
        let verdict = readiness_verdict(&report(&[("btc_usd", NOW - 200, 2)]));
        assert_eq!(
            serde_json::to_string(&verdict.body()).unwrap(),
            concat!(
                r#"{"status":"ingestion_lagging","ticker":"btc_usd","freshness_seconds":200,"#,
                r#""last_ts":1699999800,"cnt_window":2,"max_lag_seconds":120,"#,
                r#""min_ticks_in_window":4,"window_seconds":300}"#
            )
        );
    }

    #[test]
    fn test_caller_decided_verdicts() {
        assert_eq!(
            serde_json::to_string(&ReadinessVerdict::db_unavailable().body()).unwrap(),
            r#"{"status":"db_unavailable"}"#
        );
        assert_eq!(
            serde_json::to_string(&ReadinessVerdict::stats_unavailable().body()).unwrap(),
            r#"{"status":"stats_unavailable"}"#
        );
    }
}
