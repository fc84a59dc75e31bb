//! Monitor Error Taxonomy
//!
//! Probe and query failures degrade a single response and are never
//! retried within a request. Startup failures are fatal.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// Datastore unreachable or probe timed out.
    #[error("datastore probe failed: {0}")]
    ProbeFailure(String),

    /// Aggregation query failed or timed out.
    #[error("stats query failed: {0}")]
    QueryFailure(String),

    /// Startup gate ran out of time before a probe succeeded.
    #[error("datastore not ready after {attempts} attempts within {deadline:?}")]
    StartupDeadlineExceeded { attempts: u32, deadline: Duration },

    /// Shutdown was requested while the startup gate was waiting.
    #[error("startup cancelled after {attempts} attempts")]
    StartupCancelled { attempts: u32 },

    /// Missing or invalid settings.
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl MonitorError {
    /// Probe timeout, reported exactly like a hard probe failure.
    pub fn probe_timeout(timeout: Duration) -> Self {
        Self::ProbeFailure(format!("timed out after {timeout:?}"))
    }

    /// Query timeout, reported exactly like a hard query failure.
    pub fn query_timeout(timeout: Duration) -> Self {
        Self::QueryFailure(format!("timed out after {timeout:?}"))
    }

    /// Whether the process must stop instead of serving.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::StartupDeadlineExceeded { .. } | Self::StartupCancelled { .. } | Self::Configuration(_)
        )
    }
}
