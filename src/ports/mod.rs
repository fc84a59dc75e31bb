//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the usecases layer requires
//! from the outside world. Adapters implement these traits.
//!
//! Port categories:
//! - `StatsRepository`: per-ticker tick aggregation and datastore liveness

pub mod stats_repository;

pub use stats_repository::StatsRepository;
