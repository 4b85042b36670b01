// Signload CLI
//
// Design Decision: Use clap derive for ergonomic argument parsing.
// Design Decision: Support text/json/yaml output formats for scripting.
// Design Decision: Exit with 99 when thresholds fail, matching k6, so CI can gate on it.

mod commands;
mod output;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use output::OutputFormat;
use signload_core::{init_logging, LogConfig};

#[derive(Parser)]
#[command(name = "signload")]
#[command(about = "Signload CLI - Load test the message signing service")]
#[command(version)]
pub struct Cli {
    /// Output format
    #[arg(long, short, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the load test and evaluate thresholds
    Run(commands::run::RunArgs),

    /// Print the scenario that would run
    Scenario(commands::scenario::ScenarioArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env();
    if cli.quiet && log_config.log_filter.is_none() {
        log_config.log_filter = Some("warn".to_string());
    }
    init_logging(log_config);

    match cli.command {
        Commands::Run(args) => commands::run::run(args, cli.output, cli.quiet).await,
        Commands::Scenario(args) => {
            commands::scenario::run(args, cli.output)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
