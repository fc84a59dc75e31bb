//! Startup Gate Use Case - Bounded Wait for the Datastore
//!
//! Blocks serving until a liveness probe succeeds. Probes run on a
//! fixed cadence (default 500ms) until the overall deadline (default
//! 30s) elapses or the shared shutdown token is cancelled.
//!
//! State machine:
//! `Waiting → Ready | DeadlineExceeded | Cancelled`

use std::time::Duration;

use tokio::time::{interval, sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::error::MonitorError;
use crate::ports::stats_repository::StatsRepository;

/// Gate state. Every variant carries the number of probes issued so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
  /// Still probing.
  Waiting { attempts: u32 },
  /// A probe succeeded.
  Ready { attempts: u32 },
  /// Deadline elapsed before any probe succeeded.
  DeadlineExceeded { attempts: u32 },
  /// Shutdown requested while waiting.
  Cancelled { attempts: u32 },
}

impl GateState {
  pub const fn attempts(self) -> u32 {
    match self {
      Self::Waiting { attempts }
      | Self::Ready { attempts }
      | Self::DeadlineExceeded { attempts }
      | Self::Cancelled { attempts } => attempts,
    }
  }

  pub const fn is_terminal(self) -> bool {
    !matches!(self, Self::Waiting { .. })
  }
}

/// Startup gate timing.
#[derive(Debug, Clone, Copy)]
pub struct StartupGate {
  /// Pause between probe starts.
  retry_interval: Duration,
  /// Overall budget for the gate.
  deadline: Duration,
  /// Budget for each individual probe.
  probe_timeout: Duration,
}

impl Default for StartupGate {
  fn default() -> Self {
    Self {
      retry_interval: Duration::from_millis(500),
      deadline: Duration::from_secs(30),
      probe_timeout: Duration::from_secs(2),
    }
  }
}

/// Shortest accepted retry interval; `tokio::time::interval` rejects zero.
const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(1);

impl StartupGate {
  /// Create a gate with explicit timing.
  ///
  /// A zero `retry_interval` is raised to 1ms.
  pub const fn new(retry_interval: Duration, deadline: Duration, probe_timeout: Duration) -> Self {
    Self {
      retry_interval: if retry_interval.is_zero() {
        MIN_RETRY_INTERVAL
      } else {
        retry_interval
      },
      deadline,
      probe_timeout,
    }
  }

  /// Drive the state machine to a terminal state.
  #[instrument(skip(self, repo, cancel))]
  pub async fn run(&self, repo: &dyn StatsRepository, cancel: &CancellationToken) -> GateState {
    let deadline = Instant::now() + self.deadline;

    let mut ticker = interval(self.retry_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately; the first probe is not delayed.
    ticker.tick().await;

    let mut state = GateState::Waiting { attempts: 0 };
    while let GateState::Waiting { attempts } = state {
      state = self.step(repo, cancel, deadline, &mut ticker, attempts).await;
    }

    match state {
      GateState::Ready { attempts } => info!(attempts, "Datastore is ready"),
      GateState::DeadlineExceeded { attempts } => {
        warn!(attempts, deadline_ms = self.deadline.as_millis(), "Datastore not ready before deadline");
      }
      GateState::Cancelled { attempts } => info!(attempts, "Startup wait cancelled"),
      GateState::Waiting { .. } => {}
    }

    state
  }

  /// Run the gate and map failure states to errors.
  ///
  /// # Errors
  /// Returns `StartupDeadlineExceeded` or `StartupCancelled`; both are fatal.
  pub async fn wait_until_ready(
    &self,
    repo: &dyn StatsRepository,
    cancel: &CancellationToken,
  ) -> Result<u32, MonitorError> {
    match self.run(repo, cancel).await {
      GateState::Ready { attempts } => Ok(attempts),
      GateState::Cancelled { attempts } => Err(MonitorError::StartupCancelled { attempts }),
      GateState::DeadlineExceeded { attempts } | GateState::Waiting { attempts } => {
        Err(MonitorError::StartupDeadlineExceeded {
          attempts,
          deadline: self.deadline,
        })
      }
    }
  }

  /// One probe plus, on failure, the wait for the next tick.
  async fn step(
    &self,
    repo: &dyn StatsRepository,
    cancel: &CancellationToken,
    deadline: Instant,
    ticker: &mut tokio::time::Interval,
    prior_attempts: u32,
  ) -> GateState {
    if cancel.is_cancelled() {
      return GateState::Cancelled { attempts: prior_attempts };
    }
    if Instant::now() >= deadline {
      return GateState::DeadlineExceeded { attempts: prior_attempts };
    }
    let attempts = prior_attempts + 1;

    let probe = tokio::select! {
      biased;
      () = cancel.cancelled() => return GateState::Cancelled { attempts },
      () = sleep_until(deadline) => return GateState::DeadlineExceeded { attempts },
      probe = timeout(self.probe_timeout, repo.probe()) => probe,
    };

    match probe {
      Ok(Ok(())) => return GateState::Ready { attempts },
      Ok(Err(e)) => debug!(attempts, error = %format!("{e:#}"), "Datastore probe failed"),
      Err(_) => debug!(attempts, timeout_ms = self.probe_timeout.as_millis(), "Datastore probe timed out"),
    }

    tokio::select! {
      biased;
      () = cancel.cancelled() => GateState::Cancelled { attempts },
      () = sleep_until(deadline) => GateState::DeadlineExceeded { attempts },
      _ = ticker.tick() => GateState::Waiting { attempts },
    }
  }
}
