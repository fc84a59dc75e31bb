//! Series Statistics - Raw Per-Ticker Facts from the Datastore
//!
//! One `RawSeriesStat` per configured ticker per evaluation cycle.
//! The snapshot keeps the configured order so every consumer iterates
//! the same sequence.

use serde::{Deserialize, Serialize};

/// Opaque ticker identifier (e.g. `btc_usd`).
pub type SeriesId = String;

/// Last write timestamp and in-window row count for one ticker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSeriesStat {
    /// Ticker this stat belongs to.
    pub series_id: SeriesId,
    /// Unix seconds of the most recent tick, 0 if never observed.
    pub last_ts: i64,
    /// Ticks with `ts >= window_start`.
    pub count_in_window: i64,
}

impl RawSeriesStat {
    /// Stat for a ticker with no rows at all.
    pub fn empty(series_id: impl Into<SeriesId>) -> Self {
        Self {
            series_id: series_id.into(),
            last_ts: 0,
            count_in_window: 0,
        }
    }

    /// Whether at least one tick was ever recorded.
    pub const fn observed(&self) -> bool {
        self.last_ts > 0
    }
}

/// Result of one aggregation query: exactly one stat per requested ticker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    stats: Vec<RawSeriesStat>,
}

impl StatsSnapshot {
    /// Build a snapshot ordered like `requested` from unordered rows.
    ///
    /// Tickers without a row get the zero stat. Rows for tickers that
    /// were not requested are dropped; duplicates in `requested` reuse
    /// the same row.
    pub fn from_rows<I>(requested: &[SeriesId], rows: I) -> Self
    where
        I: IntoIterator<Item = RawSeriesStat>,
    {
        let rows: Vec<RawSeriesStat> = rows.into_iter().collect();

        let stats = requested
            .iter()
            .map(|id| {
                rows.iter()
                    .find(|row| &row.series_id == id)
                    .cloned()
                    .unwrap_or_else(|| RawSeriesStat::empty(id.clone()))
            })
            .collect();

        Self { stats }
    }

    /// Stat for `id`, or the zero stat if the snapshot has none.
    pub fn get(&self, id: &str) -> RawSeriesStat {
        self.stats
            .iter()
            .find(|s| s.series_id == id)
            .cloned()
            .unwrap_or_else(|| RawSeriesStat::empty(id))
    }

    /// All stats in requested order.
    pub fn stats(&self) -> &[RawSeriesStat] {
        &self.stats
    }

    /// Maximum `last_ts` over the returned rows, 0 when none observed.
    pub fn last_ts_overall(&self) -> i64 {
        self.stats.iter().map(|s| s.last_ts).max().unwrap_or(0).max(0)
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}
