// Error types for scenario loading and run orchestration
//
// Nothing in here is produced by a single iteration: request failures are
// metric observations, not errors.

use thiserror::Error;

/// Result type alias for load test operations
pub type Result<T> = std::result::Result<T, LoadTestError>;

/// Errors that can occur while preparing or running a load test
#[derive(Debug, Error)]
pub enum LoadTestError {
    /// Run configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Threshold expression could not be parsed
    #[error("Invalid threshold expression '{expression}': {reason}")]
    InvalidThreshold { expression: String, reason: String },

    /// Threshold declared on a metric the runner does not record
    #[error("Unknown metric '{0}'")]
    UnknownMetric(String),

    /// Aggregation not supported by the metric kind
    #[error("Aggregation '{aggregation}' is not valid for {kind} metric '{metric}'")]
    AggregationMismatch {
        metric: String,
        kind: String,
        aggregation: String,
    },

    /// Scenario definition is invalid
    #[error("Scenario error: {0}")]
    Scenario(String),

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Webhook sink failed to bind or serve
    #[error("Webhook sink error: {0}")]
    Webhook(String),

    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON or YAML (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LoadTestError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        LoadTestError::InvalidConfig(msg.into())
    }

    /// Create a threshold parse error
    pub fn threshold(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        LoadTestError::InvalidThreshold {
            expression: expression.into(),
            reason: reason.into(),
        }
    }

    /// Create a scenario error
    pub fn scenario(msg: impl Into<String>) -> Self {
        LoadTestError::Scenario(msg.into())
    }

    /// Whether the error stems from user-supplied configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            LoadTestError::InvalidConfig(_)
                | LoadTestError::InvalidThreshold { .. }
                | LoadTestError::UnknownMetric(_)
                | LoadTestError::AggregationMismatch { .. }
                | LoadTestError::Scenario(_)
        )
    }
}

impl From<serde_json::Error> for LoadTestError {
    fn from(err: serde_json::Error) -> Self {
        LoadTestError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for LoadTestError {
    fn from(err: serde_yaml::Error) -> Self {
        LoadTestError::Serialization(err.to_string())
    }
}
