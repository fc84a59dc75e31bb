//! Domain layer - Freshness evaluation core.
//!
//! Pure functions and value types: no I/O, no clocks, no shared state.
//! Everything here is recomputed per request by the usecases layer.

pub mod error;
pub mod exposition;
pub mod freshness;
pub mod policy;
pub mod readiness;
pub mod series;

// Re-export core types for convenience
pub use error::MonitorError;
pub use exposition::{render_metrics, Scrape};
pub use freshness::{evaluate, FreshnessReport, OverallHealth, SeriesHealth};
pub use policy::EvaluationPolicy;
pub use readiness::{readiness_verdict, LagDiagnostics, NotReadyReason, ReadinessVerdict};
pub use series::{RawSeriesStat, SeriesId, StatsSnapshot};
