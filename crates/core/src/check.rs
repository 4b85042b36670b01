// Checks: named per-iteration assertions over an HTTP observation

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome of one HTTP request as seen by checks
///
/// `status` is `None` when the request never produced a response
/// (connection refused, timeout, DNS failure).
#[derive(Debug, Clone, PartialEq)]
pub struct HttpObservation {
    pub status: Option<u16>,
    pub duration: Duration,
    pub body_bytes: u64,
    pub error: Option<String>,
}

impl HttpObservation {
    /// Observation for a request that returned a response
    pub fn response(status: u16, duration: Duration, body_bytes: u64) -> Self {
        Self {
            status: Some(status),
            duration,
            body_bytes,
            error: None,
        }
    }

    /// Observation for a request that failed before a response arrived
    pub fn transport_error(error: impl Into<String>, duration: Duration) -> Self {
        Self {
            status: None,
            duration,
            body_bytes: 0,
            error: Some(error.into()),
        }
    }

    /// Whether the request counts towards `http_req_failed`
    ///
    /// Statuses 200..=399 are expected; anything else, or no response at
    /// all, is a failed request.
    pub fn is_failed(&self) -> bool {
        !matches!(self.status, Some(200..=399))
    }
}

/// Predicate applied to an observation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckCondition {
    /// Response status is one of the listed codes
    StatusIn { codes: Vec<u16> },
}

impl CheckCondition {
    pub fn matches(&self, observation: &HttpObservation) -> bool {
        match self {
            CheckCondition::StatusIn { codes } => observation
                .status
                .map(|status| codes.contains(&status))
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for CheckCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckCondition::StatusIn { codes } => {
                let codes: Vec<String> = codes.iter().map(u16::to_string).collect();
                write!(f, "status in [{}]", codes.join(", "))
            }
        }
    }
}

/// A named assertion recorded on every iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub condition: CheckCondition,
}

impl Check {
    pub fn new(name: impl Into<String>, condition: CheckCondition) -> Self {
        Self {
            name: name.into(),
            condition,
        }
    }

    /// Check passing on any of the given status codes
    pub fn status_in(name: impl Into<String>, codes: impl IntoIterator<Item = u16>) -> Self {
        Self::new(
            name,
            CheckCondition::StatusIn {
                codes: codes.into_iter().collect(),
            },
        )
    }

    pub fn evaluate(&self, observation: &HttpObservation) -> bool {
        self.condition.matches(observation)
    }
}

/// Aggregated results of one check across the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

impl CheckSummary {
    pub fn total(&self) -> u64 {
        self.passes + self.fails
    }

    /// Pass ratio in [0, 1]; 0 when never evaluated
    pub fn pass_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.passes as f64 / total as f64
    }
}
