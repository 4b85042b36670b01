// Output formatting for CLI

use std::fmt;

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

/// How command results are written to stdout
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report
    #[default]
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Serialized form of `value`, or `None` for the text format
    pub fn render<T: Serialize>(&self, value: &T) -> Result<Option<String>> {
        Ok(match self {
            OutputFormat::Text => None,
            OutputFormat::Json => Some(serde_json::to_string_pretty(value)? + "\n"),
            OutputFormat::Yaml => Some(serde_yaml::to_string(value)?),
        })
    }

    /// Print `value` as JSON/YAML, or hand it to `text` for the text format
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> Result<()> {
        match self.render(value)? {
            Some(rendered) => print!("{rendered}"),
            None => text(value),
        }
        Ok(())
    }
}

/// Print a key-value line for text output
pub fn print_field(label: &str, value: &str) {
    println!("{:<10} {}", format!("{label}:"), value);
}

/// Left-aligned table, each column as wide as its widest cell
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: impl IntoIterator<Item = impl Into<String>>) {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let len = cell.chars().count();
                match widths.get_mut(i) {
                    Some(width) => *width = (*width).max(len),
                    None => widths.push(len),
                }
            }
        }
        widths
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        for line in std::iter::once(&self.headers).chain(&self.rows) {
            let cells: Vec<String> = line
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect();
            writeln!(f, "{}", cells.join("  ").trim_end())?;
        }
        Ok(())
    }
}
