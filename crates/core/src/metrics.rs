//! Metrics collection for load test runs
//!
//! Records the built-in k6-style metrics (counters, rates and trends) that
//! thresholds and the end-of-test summary are computed from.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::check::{Check, CheckSummary, HttpObservation};
use crate::error::{LoadTestError, Result};
use crate::threshold::Aggregation;

pub const HTTP_REQS: &str = "http_reqs";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const ITERATIONS: &str = "iterations";
pub const ITERATION_DURATION: &str = "iteration_duration";
pub const CHECKS: &str = "checks";
pub const DATA_RECEIVED: &str = "data_received";
pub const WEBHOOK_NOTIFICATIONS: &str = "webhook_notifications";

/// Every metric the runner records, with its kind
pub const BUILTIN_METRICS: &[(&str, MetricKind)] = &[
    (HTTP_REQS, MetricKind::Counter),
    (HTTP_REQ_FAILED, MetricKind::Rate),
    (HTTP_REQ_DURATION, MetricKind::Trend),
    (ITERATIONS, MetricKind::Counter),
    (ITERATION_DURATION, MetricKind::Trend),
    (CHECKS, MetricKind::Rate),
    (DATA_RECEIVED, MetricKind::Counter),
    (WEBHOOK_NOTIFICATIONS, MetricKind::Counter),
];

/// Look up the kind of a built-in metric
pub fn metric_kind(name: &str) -> Option<MetricKind> {
    BUILTIN_METRICS
        .iter()
        .find(|(metric, _)| *metric == name)
        .map(|(_, kind)| *kind)
}

/// Kind of a metric, deciding which aggregations it supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Monotonic total
    Counter,
    /// Ratio of non-zero samples
    Rate,
    /// Distribution of millisecond samples
    Trend,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Rate => write!(f, "rate"),
            MetricKind::Trend => write!(f, "trend"),
        }
    }
}

/// Distribution of duration samples, reported in milliseconds
///
/// Percentiles interpolate linearly between the two nearest ranks, the
/// way k6 computes `p(N)` and `med`: over `[100, 300]` the median is 200.
#[derive(Debug, Default)]
pub struct TrendMetric {
    samples: Mutex<TrendSamples>,
}

#[derive(Debug, Default)]
struct TrendSamples {
    /// Milliseconds; sorted lazily on the first percentile query
    values: Vec<f64>,
    sorted: bool,
    sum: f64,
    min: f64,
    max: f64,
}

impl TrendSamples {
    fn sorted_values(&mut self) -> &[f64] {
        if !self.sorted {
            self.values.sort_by(f64::total_cmp);
            self.sorted = true;
        }
        &self.values
    }
}

impl TrendMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, duration: Duration) {
        let ms = as_millis_f64(duration);
        let mut samples = self.samples.lock();

        if samples.values.is_empty() {
            samples.min = ms;
            samples.max = ms;
        } else {
            samples.min = samples.min.min(ms);
            samples.max = samples.max.max(ms);
        }
        samples.sum += ms;
        samples.sorted = false;
        samples.values.push(ms);
    }

    pub fn count(&self) -> u64 {
        self.samples.lock().values.len() as u64
    }

    pub fn avg(&self) -> f64 {
        let samples = self.samples.lock();
        if samples.values.is_empty() {
            return 0.0;
        }
        samples.sum / samples.values.len() as f64
    }

    pub fn min(&self) -> f64 {
        self.samples.lock().min
    }

    pub fn max(&self) -> f64 {
        self.samples.lock().max
    }

    pub fn med(&self) -> f64 {
        self.percentile(50.0)
    }

    /// Interpolated percentile, `pct` in 0.0..=100.0; 0 when empty
    pub fn percentile(&self, pct: f64) -> f64 {
        let mut samples = self.samples.lock();
        interpolate(samples.sorted_values(), pct)
    }

    pub fn summary(&self) -> TrendSummary {
        let mut samples = self.samples.lock();
        let count = samples.values.len() as u64;
        let avg = if count == 0 {
            0.0
        } else {
            samples.sum / count as f64
        };
        let (min, max) = (samples.min, samples.max);
        let sorted = samples.sorted_values();

        TrendSummary {
            count,
            avg,
            min,
            med: interpolate(sorted, 50.0),
            max,
            p90: interpolate(sorted, 90.0),
            p95: interpolate(sorted, 95.0),
            p99: interpolate(sorted, 99.0),
        }
    }
}

/// Linear interpolation between closest ranks: `i = p * (n - 1)`
fn interpolate(sorted: &[f64], pct: f64) -> f64 {
    match sorted {
        [] => 0.0,
        [only] => *only,
        _ => {
            let rank = (pct / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
            let lower = sorted[rank.floor() as usize];
            let upper = sorted[rank.ceil() as usize];
            lower + (upper - lower) * rank.fract()
        }
    }
}

/// Summary statistics for a trend, all values in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub count: u64,
    pub avg: f64,
    pub min: f64,
    pub med: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Monotonic counter with a sampled time series for progress reporting
#[derive(Debug, Default)]
pub struct CounterMetric {
    count: AtomicU64,
    /// (elapsed_ms, cumulative_count)
    timeseries: Mutex<Vec<(u64, u64)>>,
}

impl CounterMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_by(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Average per-second rate over `elapsed`
    pub fn rate_over(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.total() as f64 / secs
    }

    /// Sample current value for the time series (call periodically)
    pub fn sample(&self, elapsed: Duration) {
        let elapsed_ms = elapsed.as_millis() as u64;
        self.timeseries.lock().push((elapsed_ms, self.total()));
    }

    /// Per-second rate between the last two samples
    pub fn recent_rate(&self) -> f64 {
        let series = self.timeseries.lock();
        match series.as_slice() {
            [.., (t1, c1), (t2, c2)] if t2 > t1 => {
                (c2 - c1) as f64 / ((t2 - t1) as f64 / 1000.0)
            }
            _ => 0.0,
        }
    }

}

/// Ratio of passing samples
#[derive(Debug, Default)]
pub struct RateMetric {
    passes: AtomicU64,
    fails: AtomicU64,
}

impl RateMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, value: bool) {
        if value {
            self.passes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fails.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    pub fn fails(&self) -> u64 {
        self.fails.load(Ordering::Relaxed)
    }

    /// Share of `true` samples; 0 when empty
    pub fn rate(&self) -> f64 {
        let passes = self.passes();
        let total = passes + self.fails();
        if total == 0 {
            return 0.0;
        }
        passes as f64 / total as f64
    }
}

/// Aggregated view of one metric at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricSummary {
    Counter { count: u64, rate: f64 },
    Rate { rate: f64, passes: u64, fails: u64 },
    Trend(TrendSummary),
}

impl MetricSummary {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricSummary::Counter { .. } => MetricKind::Counter,
            MetricSummary::Rate { .. } => MetricKind::Rate,
            MetricSummary::Trend(_) => MetricKind::Trend,
        }
    }
}

/// All metrics recorded during one run
pub struct RunMetrics {
    pub http_reqs: CounterMetric,
    pub http_req_failed: RateMetric,
    pub http_req_duration: TrendMetric,
    pub iterations: CounterMetric,
    pub iteration_duration: TrendMetric,
    pub checks: RateMetric,
    pub data_received: CounterMetric,
    /// Shared with the webhook sink
    pub webhook_notifications: Arc<CounterMetric>,
    check_results: Vec<(String, RateMetric)>,
    status_codes: Mutex<BTreeMap<u16, u64>>,
    started: Mutex<Option<Instant>>,
    finished: Mutex<Option<Instant>>,
}

impl RunMetrics {
    /// Create metrics with one result slot per declared check
    pub fn new(checks: &[Check]) -> Self {
        Self {
            http_reqs: CounterMetric::new(),
            http_req_failed: RateMetric::new(),
            http_req_duration: TrendMetric::new(),
            iterations: CounterMetric::new(),
            iteration_duration: TrendMetric::new(),
            checks: RateMetric::new(),
            data_received: CounterMetric::new(),
            webhook_notifications: Arc::new(CounterMetric::new()),
            check_results: checks
                .iter()
                .map(|check| (check.name.clone(), RateMetric::new()))
                .collect(),
            status_codes: Mutex::new(BTreeMap::new()),
            started: Mutex::new(None),
            finished: Mutex::new(None),
        }
    }

    pub fn mark_started(&self) {
        *self.started.lock() = Some(Instant::now());
    }

    pub fn mark_finished(&self) {
        *self.finished.lock() = Some(Instant::now());
    }

    /// Time between start and finish (or now, while running)
    pub fn elapsed(&self) -> Duration {
        let Some(started) = *self.started.lock() else {
            return Duration::ZERO;
        };
        match *self.finished.lock() {
            Some(finished) => finished.duration_since(started),
            None => started.elapsed(),
        }
    }

    /// Record the HTTP request metrics for one observation
    pub fn record_request(&self, observation: &HttpObservation) {
        self.http_reqs.increment();
        self.http_req_failed.add(observation.is_failed());

        if let Some(status) = observation.status {
            self.http_req_duration.add(observation.duration);
            self.data_received.increment_by(observation.body_bytes);
            *self.status_codes.lock().entry(status).or_insert(0) += 1;
        }
    }

    /// Evaluate every check against the observation and record the results
    pub fn record_checks(&self, checks: &[Check], observation: &HttpObservation) {
        for (check, (_, result)) in checks.iter().zip(self.check_results.iter()) {
            let passed = check.evaluate(observation);
            result.add(passed);
            self.checks.add(passed);
        }
    }

    /// Record a completed iteration
    pub fn record_iteration(&self, duration: Duration) {
        self.iterations.increment();
        self.iteration_duration.add(duration);
    }

    /// Sample counter time series (call periodically)
    pub fn sample(&self) {
        let elapsed = self.elapsed();
        self.http_reqs.sample(elapsed);
        self.iterations.sample(elapsed);
    }

    pub fn check_summaries(&self) -> Vec<CheckSummary> {
        self.check_results
            .iter()
            .map(|(name, result)| CheckSummary {
                name: name.clone(),
                passes: result.passes(),
                fails: result.fails(),
            })
            .collect()
    }

    pub fn status_codes(&self) -> BTreeMap<u16, u64> {
        self.status_codes.lock().clone()
    }

    /// Summary of a single built-in metric
    pub fn summary(&self, name: &str) -> Result<MetricSummary> {
        let elapsed = self.elapsed();
        let counter = |metric: &CounterMetric| MetricSummary::Counter {
            count: metric.total(),
            rate: metric.rate_over(elapsed),
        };
        let rate = |metric: &RateMetric| MetricSummary::Rate {
            rate: metric.rate(),
            passes: metric.passes(),
            fails: metric.fails(),
        };

        let summary = match name {
            HTTP_REQS => counter(&self.http_reqs),
            HTTP_REQ_FAILED => rate(&self.http_req_failed),
            HTTP_REQ_DURATION => MetricSummary::Trend(self.http_req_duration.summary()),
            ITERATIONS => counter(&self.iterations),
            ITERATION_DURATION => MetricSummary::Trend(self.iteration_duration.summary()),
            CHECKS => rate(&self.checks),
            DATA_RECEIVED => counter(&self.data_received),
            WEBHOOK_NOTIFICATIONS => counter(self.webhook_notifications.as_ref()),
            other => return Err(LoadTestError::UnknownMetric(other.to_string())),
        };
        Ok(summary)
    }

    /// Summaries of every built-in metric, keyed by name
    pub fn summaries(&self) -> Result<BTreeMap<String, MetricSummary>> {
        BUILTIN_METRICS
            .iter()
            .map(|(name, _)| Ok((name.to_string(), self.summary(name)?)))
            .collect()
    }

    /// Value of `aggregation` over the named metric, as thresholds see it
    ///
    /// Trend values are milliseconds; counter `rate` is per second.
    pub fn aggregate(&self, name: &str, aggregation: &Aggregation) -> Result<f64> {
        let mismatch = |kind: MetricKind| LoadTestError::AggregationMismatch {
            metric: name.to_string(),
            kind: kind.to_string(),
            aggregation: aggregation.to_string(),
        };

        let trend = |metric: &TrendMetric| -> Result<f64> {
            match aggregation {
                Aggregation::Avg => Ok(metric.avg()),
                Aggregation::Min => Ok(metric.min()),
                Aggregation::Max => Ok(metric.max()),
                Aggregation::Med => Ok(metric.med()),
                Aggregation::Percentile(p) => Ok(metric.percentile(*p)),
                _ => Err(mismatch(MetricKind::Trend)),
            }
        };

        let elapsed = self.elapsed();
        let counter = |metric: &CounterMetric| -> Result<f64> {
            match aggregation {
                Aggregation::Count => Ok(metric.total() as f64),
                Aggregation::Rate => Ok(metric.rate_over(elapsed)),
                _ => Err(mismatch(MetricKind::Counter)),
            }
        };

        let rate = |metric: &RateMetric| -> Result<f64> {
            match aggregation {
                Aggregation::Rate => Ok(metric.rate()),
                _ => Err(mismatch(MetricKind::Rate)),
            }
        };

        match name {
            HTTP_REQS => counter(&self.http_reqs),
            HTTP_REQ_FAILED => rate(&self.http_req_failed),
            HTTP_REQ_DURATION => trend(&self.http_req_duration),
            ITERATIONS => counter(&self.iterations),
            ITERATION_DURATION => trend(&self.iteration_duration),
            CHECKS => rate(&self.checks),
            DATA_RECEIVED => counter(&self.data_received),
            WEBHOOK_NOTIFICATIONS => counter(self.webhook_notifications.as_ref()),
            other => Err(LoadTestError::UnknownMetric(other.to_string())),
        }
    }
}

fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_min_max_avg() {
        let trend = TrendMetric::new();
        for ms in [40, 10, 30, 20] {
            trend.add(Duration::from_millis(ms));
        }

        assert_eq!(trend.count(), 4);
        assert_eq!(trend.min(), 10.0);
        assert_eq!(trend.max(), 40.0);
        assert_eq!(trend.avg(), 25.0);
    }

    #[test]
    fn test_percentile_interpolates_between_ranks() {
        let trend = TrendMetric::new();
        trend.add(Duration::from_millis(300));
        trend.add(Duration::from_millis(100));

        // Mean of the two middle values, not the upper one
        assert_eq!(trend.med(), 200.0);
        assert_eq!(trend.percentile(0.0), 100.0);
        assert_eq!(trend.percentile(100.0), 300.0);
        assert!((trend.percentile(95.0) - 290.0).abs() < 1e-9);
    }

    #[test]
    fn test_p95_with_single_outlier() {
        let metrics = RunMetrics::new(&[]);
        for _ in 0..9 {
            metrics.http_req_duration.add(Duration::from_millis(1000));
        }
        metrics.http_req_duration.add(Duration::from_millis(2500));

        // i = 0.95 * 9 = 8.55 -> 1000 + 1500 * 0.55
        let p95 = metrics
            .aggregate(HTTP_REQ_DURATION, &Aggregation::Percentile(95.0))
            .unwrap();
        assert!((p95 - 1825.0).abs() < 1e-6, "p95 = {p95}");

        let outcomes = crate::threshold::ThresholdSet::new()
            .with(HTTP_REQ_DURATION, "p(95)<2000")
            .unwrap()
            .evaluate(&metrics)
            .unwrap();
        assert!(outcomes[0].passed);

        let summary = metrics.http_req_duration.summary();
        assert!((summary.p95 - 1825.0).abs() < 1e-6);
        assert!((summary.p99 - 2365.0).abs() < 1e-6);
        assert_eq!(summary.med, 1000.0);
    }

    #[test]
    fn test_single_sample_percentiles() {
        let trend = TrendMetric::new();
        trend.add(Duration::from_millis(42));
        assert_eq!(trend.percentile(95.0), 42.0);
        assert_eq!(trend.med(), 42.0);
    }

    #[test]
    fn test_empty_trend_reports_zeros() {
        let summary = TrendMetric::new().summary();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.avg, 0.0);
        assert_eq!(summary.min, 0.0);
        assert_eq!(summary.p95, 0.0);
    }

    #[test]
    fn test_rate_metric() {
        let rate = RateMetric::new();
        assert_eq!(rate.rate(), 0.0);

        rate.add(true);
        rate.add(false);
        rate.add(false);
        rate.add(false);

        assert_eq!(rate.passes(), 1);
        assert_eq!(rate.fails(), 3);
        assert!((rate.rate() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_counter_recent_rate() {
        let counter = CounterMetric::new();
        counter.sample(Duration::from_millis(0));
        counter.increment_by(50);
        counter.sample(Duration::from_millis(500));

        assert_eq!(counter.total(), 50);
        assert!((counter.recent_rate() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_record_request_and_checks() {
        let checks = vec![Check::status_in("is successful status code", [200, 202])];
        let metrics = RunMetrics::new(&checks);

        let observations = [
            HttpObservation::response(200, Duration::from_millis(10), 5),
            HttpObservation::response(202, Duration::from_millis(20), 0),
            HttpObservation::response(500, Duration::from_millis(30), 12),
            HttpObservation::transport_error("connection refused", Duration::from_millis(1)),
        ];
        for obs in &observations {
            metrics.record_request(obs);
            metrics.record_checks(&checks, obs);
        }

        assert_eq!(metrics.http_reqs.total(), 4);
        assert_eq!(metrics.http_req_failed.passes(), 2);
        assert_eq!(metrics.http_req_duration.count(), 3);
        assert_eq!(metrics.data_received.total(), 17);
        assert_eq!(metrics.checks.passes(), 2);
        assert_eq!(metrics.checks.fails(), 2);

        let codes = metrics.status_codes();
        assert_eq!(codes.get(&200), Some(&1));
        assert_eq!(codes.get(&202), Some(&1));
        assert_eq!(codes.get(&500), Some(&1));

        let summaries = metrics.check_summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].passes, 2);
        assert_eq!(summaries[0].fails, 2);
    }

    #[test]
    fn test_aggregate_rejects_mismatched_aggregation() {
        let metrics = RunMetrics::new(&[]);

        let err = metrics
            .aggregate(HTTP_REQ_FAILED, &Aggregation::Percentile(95.0))
            .unwrap_err();
        assert!(matches!(err, LoadTestError::AggregationMismatch { .. }));

        let err = metrics.aggregate("vus_max", &Aggregation::Count).unwrap_err();
        assert!(matches!(err, LoadTestError::UnknownMetric(_)));
    }

    #[test]
    fn test_summaries_cover_builtin_metrics() {
        let metrics = RunMetrics::new(&[]);
        let summaries = metrics.summaries().unwrap();

        assert_eq!(summaries.len(), BUILTIN_METRICS.len());
        assert_eq!(summaries[HTTP_REQ_DURATION].kind(), MetricKind::Trend);
        assert_eq!(summaries[HTTP_REQ_FAILED].kind(), MetricKind::Rate);
        assert_eq!(summaries[HTTP_REQS].kind(), MetricKind::Counter);
    }
}
