//! Alert Rule Types
//!
//! Threshold rules attached to a symbol pair, and the events they emit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::AnalyticsError;

/// Ordered symbol pair `(x, y)`; symbols are normalised to lowercase
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    pub x_symbol: String,
    pub y_symbol: String,
}

impl PairKey {
    pub fn new(x_symbol: impl AsRef<str>, y_symbol: impl AsRef<str>) -> Self {
        Self {
            x_symbol: x_symbol.as_ref().trim().to_lowercase(),
            y_symbol: y_symbol.as_ref().trim().to_lowercase(),
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.x_symbol, self.y_symbol)
    }
}

/// Metric a rule watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertMetric {
    Zscore,
    Spread,
}

impl fmt::Display for AlertMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertMetric::Zscore => write!(f, "zscore"),
            AlertMetric::Spread => write!(f, "spread"),
        }
    }
}

impl FromStr for AlertMetric {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zscore" | "z" => Ok(AlertMetric::Zscore),
            "spread" => Ok(AlertMetric::Spread),
            other => Err(AnalyticsError::InvalidParameter(format!(
                "unknown alert metric '{}', expected 'zscore' or 'spread'",
                other
            ))),
        }
    }
}

/// Comparison applied as `value OP threshold`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertOperator {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
}

impl AlertOperator {
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            AlertOperator::GreaterThan => value > threshold,
            AlertOperator::LessThan => value < threshold,
        }
    }
}

impl fmt::Display for AlertOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertOperator::GreaterThan => write!(f, ">"),
            AlertOperator::LessThan => write!(f, "<"),
        }
    }
}

impl FromStr for AlertOperator {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" | "gt" => Ok(AlertOperator::GreaterThan),
            "<" | "lt" => Ok(AlertOperator::LessThan),
            other => Err(AnalyticsError::InvalidParameter(format!(
                "unknown alert operator '{}', expected '>' or '<'",
                other
            ))),
        }
    }
}

/// Rule definition as submitted by a caller, before an id is assigned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAlertRule {
    pub symbol_x: String,
    pub symbol_y: String,
    pub metric: AlertMetric,
    pub op: AlertOperator,
    pub threshold: f64,
}

/// A stored rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRule {
    pub id: u64,
    pub pair: PairKey,
    pub metric: AlertMetric,
    pub op: AlertOperator,
    pub threshold: f64,
}

impl AlertRule {
    /// Human-readable trigger message
    pub fn message(&self, value: f64) -> String {
        format!(
            "Rule {}: {} {} {} {:?} -> value={:.4}",
            self.id, self.pair, self.metric, self.op, self.threshold, value
        )
    }
}

/// Latest metric values of one pair, taken from a freshly computed report
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricSnapshot {
    pub zscore: Option<(DateTime<Utc>, f64)>,
    pub spread: Option<(DateTime<Utc>, f64)>,
}

impl MetricSnapshot {
    pub fn value(&self, metric: AlertMetric) -> Option<(DateTime<Utc>, f64)> {
        match metric {
            AlertMetric::Zscore => self.zscore,
            AlertMetric::Spread => self.spread,
        }
    }
}

/// Emitted when a rule's condition holds during an evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEvent {
    pub rule_id: u64,
    pub pair: PairKey,
    pub metric: AlertMetric,
    pub message: String,
    pub value: f64,
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
}
