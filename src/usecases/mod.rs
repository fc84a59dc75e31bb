//! Use Cases Layer - Application Workflows
//!
//! Orchestrates domain logic with port interfaces.
//!
//! Use cases:
//! - `FreshnessMonitor`: per-request probe → fetch → evaluate pipeline
//! - `StartupGate`: bounded wait for the datastore before serving

pub mod monitor;
pub mod startup_gate;

pub use monitor::FreshnessMonitor;
pub use startup_gate::{GateState, StartupGate};
