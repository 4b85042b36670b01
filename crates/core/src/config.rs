// Run configuration
//
// Controls how many virtual users run and for how long. The scenario itself
// (request, checks, thresholds) lives in scenario.rs.

use std::time::Duration;

use crate::error::{LoadTestError, Result};

/// Request timeout applied when nothing else is configured
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Interval between progress log lines
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for a single load test run
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Number of virtual users (concurrent iteration loops)
    pub vus: usize,
    /// Total iterations shared across all VUs
    pub iterations: Option<u64>,
    /// Run length; VUs keep iterating until it elapses
    pub duration: Option<Duration>,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// How often progress is logged while running
    pub progress_interval: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            vus: 1,
            iterations: None,
            duration: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl RunConfig {
    /// Reject configurations that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if self.vus == 0 {
            return Err(LoadTestError::config("vus must be at least 1"));
        }
        if self.iterations == Some(0) {
            return Err(LoadTestError::config("iterations must be at least 1"));
        }
        if self.duration == Some(Duration::ZERO) {
            return Err(LoadTestError::config("duration must be greater than zero"));
        }
        if self.request_timeout.is_zero() {
            return Err(LoadTestError::config(
                "request timeout must be greater than zero",
            ));
        }
        if self.progress_interval.is_zero() {
            return Err(LoadTestError::config(
                "progress interval must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Iteration budget for the run
    ///
    /// With neither iterations nor duration set, a single iteration runs.
    /// With only a duration set, iterations are unbounded.
    pub fn iteration_budget(&self) -> Option<u64> {
        match (self.iterations, self.duration) {
            (Some(n), _) => Some(n),
            (None, Some(_)) => None,
            (None, None) => Some(1),
        }
    }
}

/// Parse a human-readable duration such as `500ms`, `30s`, `1m 30s` or `2h`
///
/// Usable directly as a clap `value_parser`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    humantime::parse_duration(input.trim())
        .map_err(|e| LoadTestError::config(format!("invalid duration '{input}': {e}")))
}
