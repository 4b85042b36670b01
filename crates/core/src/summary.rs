// End-of-test summary
//
// Serializable snapshot of a finished run, rendered as k6-style text or
// written out as JSON.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::check::CheckSummary;
use crate::config::RunConfig;
use crate::error::Result;
use crate::metrics::{MetricSummary, RunMetrics};
use crate::scenario::Scenario;
use crate::threshold::ThresholdOutcome;

/// Result of a finished load test run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub scenario: String,
    pub url: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub vus: usize,
    pub iterations: u64,
    /// Shutdown was requested before the run completed on its own
    pub interrupted: bool,
    pub checks: Vec<CheckSummary>,
    pub metrics: BTreeMap<String, MetricSummary>,
    pub status_codes: BTreeMap<u16, u64>,
    pub thresholds: Vec<ThresholdOutcome>,
}

impl RunSummary {
    /// Snapshot the metrics of a finished run
    pub fn collect(
        run_id: Uuid,
        scenario: &Scenario,
        config: &RunConfig,
        metrics: &RunMetrics,
        started_at: DateTime<Utc>,
        thresholds: Vec<ThresholdOutcome>,
        interrupted: bool,
    ) -> Result<Self> {
        Ok(Self {
            run_id,
            scenario: scenario.name.clone(),
            url: scenario.request.url.to_string(),
            started_at,
            elapsed_ms: metrics.elapsed().as_millis() as u64,
            vus: config.vus,
            iterations: metrics.iterations.total(),
            interrupted,
            checks: metrics.check_summaries(),
            metrics: metrics.summaries()?,
            status_codes: metrics.status_codes(),
            thresholds,
        })
    }

    /// True when no threshold failed
    pub fn thresholds_passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdOutcome> {
        self.thresholds.iter().filter(|t| !t.passed)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Write the JSON summary to `path`, returning its absolute path
    pub fn export_json(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;

        // Return absolute path for clickable terminal links
        Ok(path.canonicalize().unwrap_or_else(|_| path.to_path_buf()))
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "  scenario: {}", self.scenario)?;
        writeln!(f, "  url:      {}", self.url)?;
        writeln!(
            f,
            "  run:      {} VUs, {} iterations in {:.2}s{}",
            self.vus,
            self.iterations,
            self.elapsed_ms as f64 / 1000.0,
            if self.interrupted { " (interrupted)" } else { "" }
        )?;
        writeln!(f)?;

        for check in &self.checks {
            if check.fails == 0 {
                writeln!(f, "  ✓ {}", check.name)?;
            } else {
                writeln!(f, "  ✗ {}", check.name)?;
                writeln!(
                    f,
                    "   ↳  {:.0}% — ✓ {} / ✗ {}",
                    check.pass_rate() * 100.0,
                    check.passes,
                    check.fails
                )?;
            }
        }
        if !self.checks.is_empty() {
            writeln!(f)?;
        }

        for (name, metric) in &self.metrics {
            writeln!(f, "  {:.<32}: {}", name, format_metric(metric))?;
        }

        if !self.status_codes.is_empty() {
            let codes: Vec<String> = self
                .status_codes
                .iter()
                .map(|(code, count)| format!("{code}={count}"))
                .collect();
            writeln!(f)?;
            writeln!(f, "  status codes: {}", codes.join(" "))?;
        }

        if !self.thresholds.is_empty() {
            writeln!(f)?;
            writeln!(f, "  thresholds:")?;
            for outcome in &self.thresholds {
                writeln!(
                    f,
                    "  {} {}: {} (observed {:.4})",
                    if outcome.passed { "✓" } else { "✗" },
                    outcome.metric,
                    outcome.expression,
                    outcome.observed
                )?;
            }
        }

        Ok(())
    }
}

fn format_metric(metric: &MetricSummary) -> String {
    match metric {
        MetricSummary::Counter { count, rate } => format!("{count:<8} {rate:.2}/s"),
        MetricSummary::Rate {
            rate,
            passes,
            fails,
        } => format!("{:.2}%  ✓ {passes}  ✗ {fails}", rate * 100.0),
        MetricSummary::Trend(t) => format!(
            "avg={:.2}ms min={:.2}ms med={:.2}ms max={:.2}ms p(90)={:.2}ms p(95)={:.2}ms",
            t.avg, t.min, t.med, t.max, t.p90, t.p95
        ),
    }
}
