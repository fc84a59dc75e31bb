//! Metrics and Monitoring Adapters
//!
//! HTTP exposition of the freshness monitor: liveness, Prometheus
//! scrape and readiness endpoints via axum 0.7.

pub mod server;

pub use server::{router, MonitorServer};
