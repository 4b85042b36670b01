//! Load test runner
//!
//! Runs a scenario with a fixed number of virtual users (VUs). Each VU is a
//! tokio task looping over iterations until the shared iteration budget is
//! exhausted, the configured duration elapses, or shutdown is requested.
//! In-flight iterations always complete and are counted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::RunConfig;
use crate::error::Result;
use crate::metrics::RunMetrics;
use crate::scenario::Scenario;
use crate::summary::RunSummary;

/// Requests a running test to stop starting new iterations
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

/// Executes a scenario according to a run configuration
pub struct LoadRunner {
    config: RunConfig,
    scenario: Arc<Scenario>,
    client: reqwest::Client,
    metrics: Arc<RunMetrics>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl LoadRunner {
    /// Validate the inputs and prepare the HTTP client
    pub fn new(config: RunConfig, scenario: Scenario) -> Result<Self> {
        config.validate()?;
        scenario.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("signload/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            metrics: Arc::new(RunMetrics::new(&scenario.checks)),
            scenario: Arc::new(scenario),
            client,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
            config,
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    /// Metrics for custom analysis or to share with the webhook sink
    pub fn metrics(&self) -> Arc<RunMetrics> {
        self.metrics.clone()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Run the scenario to completion and evaluate its thresholds
    pub async fn run(&self) -> Result<RunSummary> {
        let run_id = Uuid::now_v7();
        let budget = self.config.iteration_budget();

        info!(
            %run_id,
            scenario = %self.scenario.name,
            url = %self.scenario.request.url,
            vus = self.config.vus,
            iterations = ?budget,
            duration = ?self.config.duration,
            "Starting load test"
        );

        let started_at = Utc::now();
        self.metrics.mark_started();
        let deadline = self.config.duration.map(|d| Instant::now() + d);
        let claimed = Arc::new(AtomicU64::new(0));

        // Progress sampler
        let metrics = self.metrics.clone();
        let interval = self.config.progress_interval;
        let sampler = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                metrics.sample();
                info!(
                    elapsed_secs = metrics.elapsed().as_secs(),
                    iterations = metrics.iterations.total(),
                    http_reqs = metrics.http_reqs.total(),
                    rps = metrics.http_reqs.recent_rate(),
                    "Progress"
                );
            }
        });

        let mut vus = JoinSet::new();
        for vu in 1..=self.config.vus {
            let worker = VirtualUser {
                id: vu,
                scenario: self.scenario.clone(),
                client: self.client.clone(),
                metrics: self.metrics.clone(),
                claimed: claimed.clone(),
                budget,
                deadline,
                shutdown: self.shutdown_rx.clone(),
            };
            vus.spawn(worker.run());
        }

        while let Some(result) = vus.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "VU task failed");
            }
        }

        sampler.abort();
        self.metrics.mark_finished();
        self.metrics.sample();

        let interrupted = *self.shutdown_rx.borrow();
        if interrupted {
            warn!("Load test interrupted before completion");
        }

        let thresholds = self.scenario.thresholds.evaluate(&self.metrics)?;
        let summary = RunSummary::collect(
            run_id,
            &self.scenario,
            &self.config,
            &self.metrics,
            started_at,
            thresholds,
            interrupted,
        )?;

        info!(
            %run_id,
            iterations = summary.iterations,
            elapsed_ms = summary.elapsed_ms,
            thresholds_passed = summary.thresholds_passed(),
            "Load test complete"
        );

        Ok(summary)
    }
}

struct VirtualUser {
    id: usize,
    scenario: Arc<Scenario>,
    client: reqwest::Client,
    metrics: Arc<RunMetrics>,
    claimed: Arc<AtomicU64>,
    budget: Option<u64>,
    deadline: Option<Instant>,
    shutdown: watch::Receiver<bool>,
}

impl VirtualUser {
    async fn run(self) {
        debug!(vu = self.id, "VU started");

        while self.claim_iteration() {
            let start = Instant::now();

            let observation = self.scenario.request.send(&self.client).await;
            if let Some(error) = &observation.error {
                debug!(vu = self.id, error = %error, "Request failed");
            }

            self.metrics.record_request(&observation);
            self.metrics.record_checks(&self.scenario.checks, &observation);
            self.metrics.record_iteration(start.elapsed());
        }

        debug!(vu = self.id, "VU finished");
    }

    /// Whether this VU may start another iteration
    fn claim_iteration(&self) -> bool {
        if *self.shutdown.borrow() {
            return false;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return false;
            }
        }
        match self.budget {
            Some(budget) => self.claimed.fetch_add(1, Ordering::AcqRel) < budget,
            None => true,
        }
    }
}
