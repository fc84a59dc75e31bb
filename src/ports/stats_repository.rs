//! Stats Repository Port - Tick Aggregation Interface
//!
//! One aggregation query per evaluation cycle plus a cheap liveness
//! probe. Timeouts are applied by the caller; implementations must not
//! retry internally.

use async_trait::async_trait;

use crate::domain::series::{SeriesId, StatsSnapshot};

/// Trait for tick statistics providers.
///
/// `fetch` must return a stat for every requested ticker (zero stat
/// when the ticker has no rows), in requested order.
#[async_trait]
pub trait StatsRepository: Send + Sync + 'static {
  /// Last tick timestamp and count of ticks at or after `window_start_ts`.
  ///
  /// # Errors
  /// Returns error if the aggregation query fails.
  async fn fetch(
    &self,
    series: &[SeriesId],
    window_start_ts: i64,
  ) -> anyhow::Result<StatsSnapshot>;

  /// Check that the datastore answers at all.
  async fn probe(&self) -> anyhow::Result<()>;
}
