// Load test execution command

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use crate::output::OutputFormat;
use anyhow::{Context, Result};
use clap::Args;
use signload_core::{parse_duration, LoadRunner, RunConfig, RunSummary, WebhookSink};

use super::ScenarioSource;

/// Exit code when the run completed but a threshold was crossed
pub const THRESHOLDS_FAILED_EXIT_CODE: u8 = 99;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: ScenarioSource,

    /// Number of concurrent virtual users
    #[arg(long, env = "SIGNLOAD_VUS")]
    pub vus: Option<usize>,

    /// Total iterations shared across all virtual users
    #[arg(long, short, env = "SIGNLOAD_ITERATIONS")]
    pub iterations: Option<u64>,

    /// Run for this long (e.g. 30s, 1m30s)
    #[arg(long, short, env = "SIGNLOAD_DURATION", value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Per-request timeout
    #[arg(long, env = "SIGNLOAD_TIMEOUT", value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Serve GET /webhook on this address and count callbacks
    #[arg(long)]
    pub webhook_listen: Option<SocketAddr>,

    /// Write the JSON summary to this file
    #[arg(long)]
    pub summary_export: Option<PathBuf>,

    /// Run checks but skip threshold evaluation
    #[arg(long)]
    pub no_thresholds: bool,
}

impl RunArgs {
    /// Defaults with flags (or their environment fallbacks) layered on top
    fn run_config(&self) -> RunConfig {
        let mut config = RunConfig::default();
        if let Some(vus) = self.vus {
            config.vus = vus;
        }
        if let Some(iterations) = self.iterations {
            config.iterations = Some(iterations);
        }
        if let Some(duration) = self.duration {
            config.duration = Some(duration);
        }
        if let Some(timeout) = self.timeout {
            config.request_timeout = timeout;
        }
        config
    }
}

/// Process exit code for a finished run
pub fn exit_code(summary: &RunSummary) -> u8 {
    if summary.thresholds_passed() {
        0
    } else {
        THRESHOLDS_FAILED_EXIT_CODE
    }
}

pub async fn run(args: RunArgs, format: OutputFormat, quiet: bool) -> Result<ExitCode> {
    let mut scenario = args.source.load()?;
    if args.no_thresholds {
        scenario = scenario.without_thresholds();
    }

    let runner =
        LoadRunner::new(args.run_config(), scenario).context("Invalid load test configuration")?;

    let sink = match args.webhook_listen {
        Some(addr) => Some(
            WebhookSink::bind(addr, runner.metrics().webhook_notifications.clone())
                .await
                .with_context(|| format!("Failed to start webhook listener on {addr}"))?,
        ),
        None => None,
    };

    let shutdown = runner.shutdown_handle();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received shutdown signal");
            shutdown.shutdown();
        }
    });

    let result = runner.run().await;
    signal_task.abort();

    if let Some(sink) = sink {
        if let Err(e) = sink.shutdown().await {
            tracing::warn!(error = %e, "Webhook listener did not shut down cleanly");
        }
    }

    let summary = result.context("Load test failed")?;

    if let Some(path) = &args.summary_export {
        let written = summary
            .export_json(path)
            .with_context(|| format!("Failed to export summary to {}", path.display()))?;
        if !quiet {
            eprintln!("Summary written to {}", written.display());
        }
    }

    format.emit(&summary, |summary| print!("{summary}"))?;

    for failed in summary.failed_thresholds() {
        tracing::warn!(
            metric = %failed.metric,
            expression = %failed.expression,
            observed = failed.observed,
            "Threshold crossed"
        );
    }

    Ok(ExitCode::from(exit_code(&summary)))
}
