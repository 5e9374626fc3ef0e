//! Analytics Errors
//!
//! Failure taxonomy shared by every computation in the analytics core.
//! Each failure is reported per operation so the orchestrator can still
//! return partial results.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Which downstream computation a data-length check was guarding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataRequirement {
    /// At least two aligned points for a regression
    HedgeEstimation,
    /// At least `roll_window` aligned points for rolling statistics
    RollingWindow,
    /// Enough spread observations for the unit-root regression
    StationarityTest,
    /// Enough aligned returns for a correlation estimate
    Correlation,
}

impl fmt::Display for DataRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataRequirement::HedgeEstimation => write!(f, "hedge estimation"),
            DataRequirement::RollingWindow => write!(f, "rolling window"),
            DataRequirement::StationarityTest => write!(f, "stationarity test"),
            DataRequirement::Correlation => write!(f, "correlation"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("Insufficient data for {requirement}: need {required} points, have {available}")]
    InsufficientData {
        requirement: DataRequirement,
        required: usize,
        available: usize,
    },

    #[error("Degenerate regression: {0}")]
    DegenerateRegression(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Numerical instability: {0}")]
    NumericalInstability(String),
}

impl AnalyticsError {
    /// Shorthand for an `InsufficientData` error
    pub fn insufficient(requirement: DataRequirement, required: usize, available: usize) -> Self {
        AnalyticsError::InsufficientData {
            requirement,
            required,
            available,
        }
    }

    /// Stable machine-readable name of the error variant
    pub fn kind(&self) -> &'static str {
        match self {
            AnalyticsError::InsufficientData { .. } => "insufficient_data",
            AnalyticsError::DegenerateRegression(_) => "degenerate_regression",
            AnalyticsError::InvalidParameter(_) => "invalid_parameter",
            AnalyticsError::NumericalInstability(_) => "numerical_instability",
        }
    }

    /// The data requirement that failed, if this is an `InsufficientData` error
    pub fn requirement(&self) -> Option<DataRequirement> {
        match self {
            AnalyticsError::InsufficientData { requirement, .. } => Some(*requirement),
            _ => None,
        }
    }
}
