//! Analytics report assembled by the orchestrator

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::analytics::{AdfResult, BacktestResult, HedgeRatio, RegressionMethod};
use crate::domain::{AlertEvent, AnalyticsError, DataRequirement, PairKey, Timeframe, TimeSeries};

/// Report sections that can fail independently of the hedge/spread core
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportSection {
    Adf,
    Zscore,
    Corr,
    Backtest,
    Alerts,
}

impl fmt::Display for ReportSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportSection::Adf => "adf",
            ReportSection::Zscore => "zscore",
            ReportSection::Corr => "corr",
            ReportSection::Backtest => "backtest",
            ReportSection::Alerts => "alerts",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub pair: PairKey,
    pub timeframe: Timeframe,
    pub regression: RegressionMethod,
    pub roll_window: usize,
    /// Aligned points the computation used
    pub aligned_points: usize,
    pub hedge: HedgeRatio,
    pub adf: Option<AdfResult>,
    pub spread: TimeSeries,
    pub zscore: Option<TimeSeries>,
    pub corr: Option<TimeSeries>,
    pub backtest: Option<BacktestResult>,
    pub alerts: Vec<AlertEvent>,
    /// Why a section is missing
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub issues: BTreeMap<ReportSection, String>,
}

impl AnalyticsReport {
    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }

    /// Keep only the last `max_points` entries of every output series
    pub fn truncate(mut self, max_points: usize) -> Self {
        self.spread = self.spread.tail(max_points);
        self.zscore = self.zscore.map(|z| z.tail(max_points));
        self.corr = self.corr.map(|c| c.tail(max_points));
        if let Some(backtest) = self.backtest.as_mut() {
            backtest.equity_curve = backtest.equity_curve.tail(max_points);
        }
        self
    }
}

/// Body returned in place of a report when the whole computation fails
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub error: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement: Option<DataRequirement>,
}

impl ErrorReport {
    pub fn new(error: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind: kind.into(),
            requirement: None,
        }
    }
}

impl From<&AnalyticsError> for ErrorReport {
    fn from(err: &AnalyticsError) -> Self {
        Self {
            error: err.to_string(),
            kind: err.kind().to_string(),
            requirement: err.requirement(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_report_from_insufficient_data() {
        let err = AnalyticsError::insufficient(DataRequirement::HedgeEstimation, 2, 1);
        let body = serde_json::to_value(ErrorReport::from(&err)).unwrap();
        assert_eq!(body["kind"], "insufficient_data");
        assert_eq!(body["requirement"], "hedge_estimation");
        assert!(body["error"].as_str().unwrap().contains("need 2 points"));
    }

    #[test]
    fn test_error_report_omits_missing_requirement() {
        let body = serde_json::to_value(ErrorReport::new("no data", "no_data")).unwrap();
        assert!(body.get("requirement").is_none());
    }
}
