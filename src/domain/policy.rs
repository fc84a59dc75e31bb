//! Evaluation Policy - Staleness and Completeness Thresholds
//!
//! A ticker is healthy when its last tick is at most `max_lag_seconds`
//! old and the trailing window of `window_seconds` holds at least
//! `min_ticks_in_window` ticks.

use serde::Serialize;

/// Default trailing window for tick counting.
pub const DEFAULT_WINDOW_SECONDS: i64 = 300;
/// Default maximum tolerated freshness.
pub const DEFAULT_MAX_LAG_SECONDS: i64 = 120;
/// Default minimum ticks inside the window.
pub const DEFAULT_MIN_TICKS_IN_WINDOW: i64 = 4;

/// Thresholds applied to every ticker. Always strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EvaluationPolicy {
    window_seconds: i64,
    max_lag_seconds: i64,
    min_ticks_in_window: i64,
}

impl EvaluationPolicy {
    /// Create a policy; non-positive values fall back to the defaults.
    pub const fn new(window_seconds: i64, max_lag_seconds: i64, min_ticks_in_window: i64) -> Self {
        Self {
            window_seconds: positive_or(window_seconds, DEFAULT_WINDOW_SECONDS),
            max_lag_seconds: positive_or(max_lag_seconds, DEFAULT_MAX_LAG_SECONDS),
            min_ticks_in_window: positive_or(min_ticks_in_window, DEFAULT_MIN_TICKS_IN_WINDOW),
        }
    }

    pub const fn window_seconds(&self) -> i64 {
        self.window_seconds
    }

    pub const fn max_lag_seconds(&self) -> i64 {
        self.max_lag_seconds
    }

    pub const fn min_ticks_in_window(&self) -> i64 {
        self.min_ticks_in_window
    }

    /// First timestamp (inclusive) counted in the window ending at `now`.
    pub const fn window_start(&self, now: i64) -> i64 {
        now - self.window_seconds
    }
}

impl Default for EvaluationPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_WINDOW_SECONDS,
            DEFAULT_MAX_LAG_SECONDS,
            DEFAULT_MIN_TICKS_IN_WINDOW,
        )
    }
}

const fn positive_or(value: i64, fallback: i64) -> i64 {
    if value > 0 { value } else { fallback }
}
