//! Postgres Stats Repository - Concrete Adapter for the StatsRepository Port
//!
//! Aggregates `price_ticks` per requested ticker in a single query.
//! The pool is created lazily so the startup gate, not pool creation,
//! decides when the datastore counts as available.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, instrument};

use crate::domain::series::{RawSeriesStat, SeriesId, StatsSnapshot};
use crate::ports::stats_repository::StatsRepository;

/// Last tick and in-window count per requested ticker.
///
/// `$1` is the ticker list, `$2` the inclusive window start. Tickers
/// without rows come back as `(ticker, 0, 0)` through the left join.
/// `wanted` must hold each ticker once: a repeated ticker would join its
/// ticks twice and double `cnt_window`.
const FETCH_TICKER_STATS_QUERY: &str = r"
WITH wanted AS (
    SELECT DISTINCT unnest($1::text[]) AS ticker
)
SELECT
    w.ticker,
    COALESCE(MAX(p.ts), 0)::bigint AS last_ts,
    COUNT(p.*) FILTER (WHERE p.ts >= $2) AS cnt_window
FROM wanted w
LEFT JOIN price_ticks p ON p.ticker = w.ticker
GROUP BY w.ticker
ORDER BY w.ticker
";

const PROBE_QUERY: &str = "SELECT 1";

/// Each ticker once, first occurrence wins.
fn distinct_series(series: &[SeriesId]) -> Vec<SeriesId> {
    let mut seen = HashSet::with_capacity(series.len());
    series
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// Connection settings for the Postgres adapter.
#[derive(Debug, Clone)]
pub struct PgRepositoryConfig {
    /// `postgres://` connection URL.
    pub url: String,
    /// Pool size upper bound.
    pub max_connections: u32,
    /// How long a request may wait for a pooled connection.
    pub acquire_timeout: Duration,
}

/// `price_ticks` aggregation over a shared connection pool.
#[derive(Debug, Clone)]
pub struct PgStatsRepository {
    pool: PgPool,
}

impl PgStatsRepository {
    /// Wrap an existing pool.
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a lazily connecting pool. No connection is opened here.
    ///
    /// # Errors
    /// Returns error if the URL cannot be parsed.
    pub fn connect_lazy(config: &PgRepositoryConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_lazy(&config.url)
            .context("Failed to create Postgres pool")?;

        Ok(Self::new(pool))
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl StatsRepository for PgStatsRepository {
    #[instrument(skip(self, series), fields(tickers = series.len()))]
    async fn fetch(&self, series: &[SeriesId], window_start_ts: i64) -> Result<StatsSnapshot> {
        let rows: Vec<(String, i64, i64)> = sqlx::query_as(FETCH_TICKER_STATS_QUERY)
            .bind(distinct_series(series))
            .bind(window_start_ts)
            .fetch_all(&self.pool)
            .await
            .context("query ticker stats")?;

        debug!(rows = rows.len(), "Ticker stats fetched");

        Ok(StatsSnapshot::from_rows(
            series,
            rows.into_iter()
                .map(|(series_id, last_ts, count_in_window)| RawSeriesStat {
                    series_id,
                    last_ts,
                    count_in_window,
                }),
        ))
    }

    async fn probe(&self) -> Result<()> {
        sqlx::query(PROBE_QUERY)
            .execute(&self.pool)
            .await
            .context("ping database")?;
        Ok(())
    }
}
