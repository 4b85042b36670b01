// CLI subcommands

pub mod run;
pub mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use signload_core::{Scenario, DEFAULT_BASE_URL, DEFAULT_WEBHOOK_URL};

/// Where the scenario comes from: a YAML file or the built-in signing request
#[derive(Args, Debug, Clone)]
pub struct ScenarioSource {
    /// Base URL of the signing service
    #[arg(long, env = "SIGNLOAD_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Callback URL passed to the service as `webhookUrl`
    #[arg(long, default_value = DEFAULT_WEBHOOK_URL)]
    pub webhook_url: String,

    /// Scenario file (YAML); overrides --base-url and --webhook-url
    #[arg(long, short)]
    pub scenario: Option<PathBuf>,
}

impl ScenarioSource {
    pub fn load(&self) -> Result<Scenario> {
        match &self.scenario {
            Some(path) => Scenario::from_yaml_file(path)
                .with_context(|| format!("Failed to load scenario from {}", path.display())),
            None => Scenario::sign(&self.base_url, &self.webhook_url)
                .context("Failed to build signing scenario"),
        }
    }
}
