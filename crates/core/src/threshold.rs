//! Threshold expressions
//!
//! Parses k6-style expressions such as `rate<0.01` or `p(95)<2000` and
//! evaluates them against the aggregates recorded in [`RunMetrics`].
//!
//! Grammar: `aggregation operator number`, whitespace allowed around the
//! operator. Aggregations: `count`, `rate`, `avg`, `min`, `max`, `med`,
//! `p(N)` with N in 0..=100. Operators: `<`, `<=`, `>`, `>=`, `==`, `!=`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LoadTestError, Result};
use crate::metrics::{metric_kind, MetricKind, RunMetrics};

/// How a metric is reduced to a single number
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Count,
    Rate,
    Avg,
    Min,
    Max,
    Med,
    /// Percentile in 0..=100
    Percentile(f64),
}

impl Aggregation {
    /// Whether a metric of `kind` can be reduced with this aggregation
    pub fn supported_by(&self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::Counter => matches!(self, Aggregation::Count | Aggregation::Rate),
            MetricKind::Rate => matches!(self, Aggregation::Rate),
            MetricKind::Trend => matches!(
                self,
                Aggregation::Avg
                    | Aggregation::Min
                    | Aggregation::Max
                    | Aggregation::Med
                    | Aggregation::Percentile(_)
            ),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Count => write!(f, "count"),
            Aggregation::Rate => write!(f, "rate"),
            Aggregation::Avg => write!(f, "avg"),
            Aggregation::Min => write!(f, "min"),
            Aggregation::Max => write!(f, "max"),
            Aggregation::Med => write!(f, "med"),
            Aggregation::Percentile(p) => write!(f, "p({p})"),
        }
    }
}

/// Comparison operator of a threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    pub fn holds(&self, observed: f64, limit: f64) -> bool {
        match self {
            Comparison::Lt => observed < limit,
            Comparison::Le => observed <= limit,
            Comparison::Gt => observed > limit,
            Comparison::Ge => observed >= limit,
            Comparison::Eq => observed == limit,
            Comparison::Ne => observed != limit,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A single parsed threshold expression
///
/// Serializes back to the exact source text it was parsed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ThresholdExpr {
    source: String,
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub value: f64,
}

impl ThresholdExpr {
    pub fn parse(expression: &str) -> Result<Self> {
        let source = expression.trim();
        let invalid = |reason: &str| LoadTestError::threshold(expression, reason);

        let (aggregation, rest) = if let Some(after) = source.strip_prefix("p(") {
            let close = after.find(')').ok_or_else(|| invalid("missing ')'"))?;
            let percentile: f64 = after[..close]
                .trim()
                .parse()
                .map_err(|_| invalid("percentile is not a number"))?;
            if !(0.0..=100.0).contains(&percentile) {
                return Err(invalid("percentile must be between 0 and 100"));
            }
            (Aggregation::Percentile(percentile), &after[close + 1..])
        } else {
            let end = source
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(source.len());
            let aggregation = match &source[..end] {
                "count" => Aggregation::Count,
                "rate" => Aggregation::Rate,
                "avg" => Aggregation::Avg,
                "min" => Aggregation::Min,
                "max" => Aggregation::Max,
                "med" => Aggregation::Med,
                "" => return Err(invalid("missing aggregation")),
                _ => return Err(invalid("unknown aggregation")),
            };
            (aggregation, &source[end..])
        };

        let rest = rest.trim_start();
        let (comparison, rest) = [
            ("<=", Comparison::Le),
            (">=", Comparison::Ge),
            ("==", Comparison::Eq),
            ("!=", Comparison::Ne),
            ("<", Comparison::Lt),
            (">", Comparison::Gt),
        ]
        .iter()
        .find_map(|(symbol, comparison)| rest.strip_prefix(symbol).map(|r| (*comparison, r)))
        .ok_or_else(|| invalid("missing comparison operator"))?;

        let value: f64 = rest
            .trim()
            .parse()
            .map_err(|_| invalid("threshold value is not a number"))?;
        if !value.is_finite() {
            return Err(invalid("threshold value must be finite"));
        }

        Ok(Self {
            source: source.to_string(),
            aggregation,
            comparison,
            value,
        })
    }

    /// The expression text as written
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn holds(&self, observed: f64) -> bool {
        self.comparison.holds(observed, self.value)
    }
}

impl FromStr for ThresholdExpr {
    type Err = LoadTestError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ThresholdExpr {
    type Error = LoadTestError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<ThresholdExpr> for String {
    fn from(expr: ThresholdExpr) -> Self {
        expr.source
    }
}

impl fmt::Display for ThresholdExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Result of evaluating one threshold at the end of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOutcome {
    pub metric: String,
    pub expression: String,
    pub observed: f64,
    pub passed: bool,
}

/// Thresholds keyed by metric name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdSet {
    thresholds: BTreeMap<String, Vec<ThresholdExpr>>,
}

impl ThresholdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and add an expression for `metric`
    pub fn add(&mut self, metric: impl Into<String>, expression: &str) -> Result<()> {
        let expr = ThresholdExpr::parse(expression)?;
        self.thresholds.entry(metric.into()).or_default().push(expr);
        Ok(())
    }

    /// Builder-style variant of [`ThresholdSet::add`]
    pub fn with(mut self, metric: impl Into<String>, expression: &str) -> Result<Self> {
        self.add(metric, expression)?;
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.thresholds.is_empty()
    }

    /// Number of metrics with at least one threshold
    pub fn len(&self) -> usize {
        self.thresholds.len()
    }

    pub fn get(&self, metric: &str) -> Option<&[ThresholdExpr]> {
        self.thresholds.get(metric).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ThresholdExpr)> {
        self.thresholds
            .iter()
            .flat_map(|(metric, exprs)| exprs.iter().map(move |expr| (metric.as_str(), expr)))
    }

    /// Ensure every threshold targets a known metric with a compatible aggregation
    pub fn validate(&self) -> Result<()> {
        for (metric, expr) in self.iter() {
            let kind =
                metric_kind(metric).ok_or_else(|| LoadTestError::UnknownMetric(metric.to_string()))?;
            if !expr.aggregation.supported_by(kind) {
                return Err(LoadTestError::AggregationMismatch {
                    metric: metric.to_string(),
                    kind: kind.to_string(),
                    aggregation: expr.aggregation.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Evaluate every threshold against the recorded metrics
    pub fn evaluate(&self, metrics: &RunMetrics) -> Result<Vec<ThresholdOutcome>> {
        self.iter()
            .map(|(metric, expr)| {
                let observed = metrics.aggregate(metric, &expr.aggregation)?;
                Ok(ThresholdOutcome {
                    metric: metric.to_string(),
                    expression: expr.source().to_string(),
                    observed,
                    passed: expr.holds(observed),
                })
            })
            .collect()
    }
}
