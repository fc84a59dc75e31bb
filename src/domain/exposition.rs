//! Metrics Exposition - Prometheus Text Format Encoding
//!
//! Renders evaluated facts as `text/plain; version=0.0.4` lines in a
//! fixed order. Pure: the same scrape always renders to the same bytes.
//!
//! Line order:
//! 1. `crypto_client_db_up` (stop if 0)
//! 2. `crypto_client_metrics_query_ok` (+ `crypto_client_metrics_error`, stop on failure)
//! 3. five labelled lines per ticker, in configured order
//! 4. unlabelled overall `last_tick_ts` and `ticks_freshness_seconds`

use std::fmt::{self, Write};

use super::freshness::FreshnessReport;

/// Content type served with the exposition.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// What one `/metrics` request managed to observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scrape {
    /// Liveness probe failed.
    DbDown,
    /// Probe succeeded, aggregation query failed.
    QueryFailed,
    /// Probe and query succeeded.
    Evaluated(FreshnessReport),
}

/// Render a scrape to exposition text.
pub fn render_metrics(scrape: &Scrape) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_metrics(&mut out, scrape);
    out
}

/// Write a scrape to any formatter sink.
pub fn write_metrics<W: Write>(out: &mut W, scrape: &Scrape) -> fmt::Result {
    let report = match scrape {
        Scrape::DbDown => return writeln!(out, "crypto_client_db_up 0"),
        Scrape::QueryFailed => {
            writeln!(out, "crypto_client_db_up 1")?;
            writeln!(out, "crypto_client_metrics_query_ok 0")?;
            return writeln!(out, "crypto_client_metrics_error 1");
        }
        Scrape::Evaluated(report) => report,
    };

    writeln!(out, "crypto_client_db_up 1")?;
    writeln!(out, "crypto_client_metrics_query_ok 1")?;

    let window = report.policy.window_seconds();
    let max_lag = report.policy.max_lag_seconds();
    let min_ticks = report.policy.min_ticks_in_window();

    for health in &report.series {
        let ticker = LabelValue(&health.series_id);

        writeln!(out, "crypto_client_last_tick_ts{{ticker={ticker}}} {}", health.last_ts)?;
        writeln!(
            out,
            "crypto_client_ticks_freshness_seconds{{ticker={ticker}}} {}",
            health.freshness_seconds
        )?;
        writeln!(
            out,
            "crypto_client_ticks_last_window_total{{ticker={ticker},window_seconds=\"{window}\"}} {}",
            health.count_in_window
        )?;
        writeln!(
            out,
            "crypto_client_ingestion_lag_seconds{{ticker={ticker}}} {}",
            health.freshness_seconds
        )?;
        writeln!(
            out,
            "crypto_client_ingestion_ok{{ticker={ticker},max_lag_seconds=\"{max_lag}\",min_ticks_in_window=\"{min_ticks}\",window_seconds=\"{window}\"}} {}",
            u8::from(health.ingestion_ok)
        )?;
    }

    writeln!(out, "crypto_client_last_tick_ts {}", report.overall.last_ts)?;
    writeln!(
        out,
        "crypto_client_ticks_freshness_seconds {}",
        report.overall.freshness_seconds
    )
}

/// Quoted label value with Prometheus escaping (`\\`, `\"`, `\n`).
struct LabelValue<'a>(&'a str);

impl fmt::Display for LabelValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_char('"')?;
        for c in self.0.chars() {
            match c {
                '\\' => f.write_str("\\\\")?,
                '"' => f.write_str("\\\"")?,
                '\n' => f.write_str("\\n")?,
                other => f.write_char(other)?,
            }
        }
        f.write_char('"')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::freshness::evaluate;
    use crate::domain::policy::EvaluationPolicy;
    use crate::domain::series::{RawSeriesStat, SeriesId, StatsSnapshot};

    const NOW: i64 = 1_700_000_000;

    fn scrape(rows: &[(&str, i64, i64)]) -> Scrape {
        let order: Vec<SeriesId> = rows.iter().map(|(id, _, _)| (*id).to_string()).collect();
        let snapshot = StatsSnapshot::from_rows(
            &order,
            rows.iter().map(|(id, last_ts, count)| RawSeriesStat {
                series_id: (*id).to_string(),
                last_ts: *last_ts,
                count_in_window: *count,
            }),
        );
        Scrape::Evaluated(evaluate(&snapshot, &order, NOW, &EvaluationPolicy::default()))
    }

    #[test]
    fn test_db_down_is_single_line() {
        assert_eq!(render_metrics(&Scrape::DbDown), "crypto_client_db_up 0\n");
    }

    #[test]
    fn test_query_failure_stops_after_error_line() {
        assert_eq!(
            render_metrics(&Scrape::QueryFailed),
            "crypto_client_db_up 1\ncrypto_client_metrics_query_ok 0\ncrypto_client_metrics_error 1\n"
        );
    }

    #[test]
    fn test_full_exposition() {
        let text = render_metrics(&scrape(&[("btc_usd", NOW - 10, 12), ("eth_usd", 0, 0)]));

        let expected = "\
crypto_client_db_up 1
crypto_client_metrics_query_ok 1
crypto_client_last_tick_ts{ticker=\"btc_usd\"} 1699999990
crypto_client_ticks_freshness_seconds{ticker=\"btc_usd\"} 10
crypto_client_ticks_last_window_total{ticker=\"btc_usd\",window_seconds=\"300\"} 12
crypto_client_ingestion_lag_seconds{ticker=\"btc_usd\"} 10
crypto_client_ingestion_ok{ticker=\"btc_usd\",max_lag_seconds=\"120\",min_ticks_in_window=\"4\",window_seconds=\"300\"} 1
crypto_client_last_tick_ts{ticker=\"eth_usd\"} 0
crypto_client_ticks_freshness_seconds{ticker=\"eth_usd\"} 0
crypto_client_ticks_last_window_total{ticker=\"eth_usd\",window_seconds=\"300\"} 0
crypto_client_ingestion_lag_seconds{ticker=\"eth_usd\"} 0
crypto_client_ingestion_ok{ticker=\"eth_usd\",max_lag_seconds=\"120\",min_ticks_in_window=\"4\",window_seconds=\"300\"} 0
crypto_client_last_tick_ts 1699999990
crypto_client_ticks_freshness_seconds 10
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let facts = scrape(&[("btc_usd", NOW - 3, 9), ("eth_usd", NOW - 400, 1)]);
        assert_eq!(render_metrics(&facts), render_metrics(&facts));
    }

    #[test]
    fn test_label_values_are_escaped() {
        let text = render_metrics(&scrape(&[("we\"ird\\id", NOW, 5)]));
        assert!(text.contains(r#"crypto_client_last_tick_ts{ticker="we\"ird\\id"} 1700000000"#));
    }
}
