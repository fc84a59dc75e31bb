//! Persistence Adapters - Postgres Tick Statistics
//!
//! Implements the StatsRepository port against the `price_ticks`
//! table written by the ingestion pipeline. Read-only.

pub mod postgres;

pub use postgres::{PgRepositoryConfig, PgStatsRepository};
