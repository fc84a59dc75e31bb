//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies, and exposes the usecases over HTTP.
//!
//! Adapter categories:
//! - `metrics`: /health, /metrics and /ready over axum
//! - `persistence`: Postgres tick aggregation via sqlx

pub mod metrics;
pub mod persistence;
