// Signing Service Load Test
//
// This crate provides the declarative load-test scenario for the message
// signing endpoint together with the runner that executes it.
//
// Key design decisions:
// - A Scenario is pure data (request, checks, thresholds) and can be loaded from YAML
// - Checks are evaluated per iteration; thresholds are evaluated once over aggregates
// - Transport failures never abort an iteration: they surface as failed checks and requests
// - Metrics follow the k6 vocabulary (counter, rate, trend) so threshold expressions carry over
// - The runner is driven by RunConfig and stops on a watch-channel shutdown signal

pub mod check;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod runner;
pub mod scenario;
pub mod summary;
pub mod threshold;
pub mod webhook;

pub use check::{Check, CheckCondition, CheckSummary, HttpObservation};
pub use config::{parse_duration, RunConfig};
pub use error::{LoadTestError, Result};
pub use logging::{init_logging, LogConfig};
pub use metrics::{
    CounterMetric, MetricKind, MetricSummary, RateMetric, RunMetrics, TrendMetric, TrendSummary,
};
pub use runner::{LoadRunner, ShutdownHandle};
pub use scenario::{RequestSpec, Scenario, DEFAULT_BASE_URL, DEFAULT_WEBHOOK_URL};
pub use summary::RunSummary;
pub use threshold::{Aggregation, Comparison, ThresholdExpr, ThresholdOutcome, ThresholdSet};
pub use webhook::WebhookSink;
