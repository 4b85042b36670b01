// Scenario inspection command

use crate::output::{print_field, OutputFormat, Table};
use anyhow::Result;
use clap::Args;
use signload_core::Scenario;

use super::ScenarioSource;

#[derive(Args, Debug)]
pub struct ScenarioArgs {
    #[command(flatten)]
    pub source: ScenarioSource,
}

pub fn run(args: ScenarioArgs, format: OutputFormat) -> Result<()> {
    let scenario = args.source.load()?;
    format.emit(&scenario, print_scenario)
}

fn print_scenario(scenario: &Scenario) {
    print_field("Name", &scenario.name);
    print_field(
        "Request",
        &format!("{:?} {}", scenario.request.method, scenario.request.url),
    );

    let mut checks = Table::new(&["CHECK", "CONDITION"]);
    for check in &scenario.checks {
        checks.row([check.name.clone(), check.condition.to_string()]);
    }
    if !checks.is_empty() {
        println!();
        print!("{checks}");
    }

    let mut thresholds = Table::new(&["METRIC", "THRESHOLD"]);
    for (metric, expr) in scenario.thresholds.iter() {
        thresholds.row([metric, expr.source()]);
    }
    if !thresholds.is_empty() {
        println!();
        print!("{thresholds}");
    }
}
