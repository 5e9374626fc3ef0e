//! Hedge Ratio Estimation
//!
//! Two interchangeable estimators relate the dependent leg `y` to the
//! independent leg `x` as `y ≈ beta * x + intercept`:
//! - `OlsEstimator`: one static least-squares fit over the whole window
//! - `KalmanEstimator`: adaptive recursive filter, reporting its final state
//!
//! Both report `r_squared` with the same full-window SSres/SStot formula.

pub mod ols;
pub mod kalman;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::{AnalyticsError, DataRequirement};

pub use ols::OlsEstimator;
pub use kalman::{KalmanEstimator, KalmanParams, KalmanState};

/// Which estimator produced a hedge ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegressionMethod {
    Ols,
    Kalman,
}

impl Default for RegressionMethod {
    fn default() -> Self {
        RegressionMethod::Ols
    }
}

impl fmt::Display for RegressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegressionMethod::Ols => write!(f, "ols"),
            RegressionMethod::Kalman => write!(f, "kalman"),
        }
    }
}

impl FromStr for RegressionMethod {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ols" => Ok(RegressionMethod::Ols),
            "kalman" => Ok(RegressionMethod::Kalman),
            other => Err(AnalyticsError::InvalidParameter(format!(
                "unsupported regression method '{}', expected 'ols' or 'kalman'",
                other
            ))),
        }
    }
}

/// Slope/intercept relating the two legs
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HedgeRatio {
    pub beta: f64,
    pub intercept: f64,
    #[serde(rename = "rsq")]
    pub r_squared: f64,
    pub method: RegressionMethod,
}

/// A hedge ratio estimator over aligned closes
pub trait HedgeEstimator: Send + Sync {
    fn method(&self) -> RegressionMethod;

    /// Estimate the hedge ratio of `y` on `x`
    fn estimate(&self, x: &[f64], y: &[f64]) -> Result<HedgeRatio, AnalyticsError>;
}

/// Build the estimator for `method`
pub fn estimator_for(method: RegressionMethod, kalman: KalmanParams) -> Box<dyn HedgeEstimator> {
    match method {
        RegressionMethod::Ols => Box::new(OlsEstimator),
        RegressionMethod::Kalman => Box::new(KalmanEstimator::new(kalman)),
    }
}

/// Shared input checks: equal lengths, at least two points, `x` not flat
pub(crate) fn check_regression_inputs(x: &[f64], y: &[f64]) -> Result<(), AnalyticsError> {
    if x.len() != y.len() {
        return Err(AnalyticsError::InvalidParameter(format!(
            "regression legs differ in length: x={} y={}",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(AnalyticsError::insufficient(
            DataRequirement::HedgeEstimation,
            2,
            x.len(),
        ));
    }
    if is_flat(x) {
        return Err(AnalyticsError::DegenerateRegression(
            "x leg has zero variance (flat price series)".to_string(),
        ));
    }
    Ok(())
}

/// Relative SSres below which a fit of a flat `y` counts as exact
const FLAT_FIT_TOLERANCE: f64 = 1e-20;

fn is_flat(values: &[f64]) -> bool {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    max - min == 0.0
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// `1 - SSres/SStot` of the fit `beta * x + intercept` against `y`
///
/// A flat `y` has SStot = 0: the fit scores 1.0 when it reproduces `y`
/// (SSres at rounding level) and 0.0 otherwise.
pub(crate) fn r_squared(x: &[f64], y: &[f64], beta: f64, intercept: f64) -> f64 {
    let mean_y = mean(y);
    let (ss_res, ss_tot) = x.iter().zip(y.iter()).fold((0.0, 0.0), |(res, tot), (&xi, &yi)| {
        let fitted = beta * xi + intercept;
        (res + (yi - fitted).powi(2), tot + (yi - mean_y).powi(2))
    });
    if is_flat(y) {
        let scale: f64 = y.iter().map(|v| v * v).sum::<f64>().max(1.0);
        return if ss_res <= FLAT_FIT_TOLERANCE * scale { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing() {
        assert_eq!("OLS".parse::<RegressionMethod>().unwrap(), RegressionMethod::Ols);
        assert_eq!("kalman".parse::<RegressionMethod>().unwrap(), RegressionMethod::Kalman);
        assert!(matches!(
            "ridge".parse::<RegressionMethod>(),
            Err(AnalyticsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_estimator_factory() {
        let ols = estimator_for(RegressionMethod::Ols, KalmanParams::default());
        assert_eq!(ols.method(), RegressionMethod::Ols);
        let kalman = estimator_for(RegressionMethod::Kalman, KalmanParams::default());
        assert_eq!(kalman.method(), RegressionMethod::Kalman);
    }

    #[test]
    fn test_perfect_fit_r_squared() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [3.0, 5.0, 7.0, 9.0];
        assert!((r_squared(&x, &y, 2.0, 1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_only_flat_x_is_degenerate() {
        let flat = [5.0, 5.0, 5.0];
        let moving = [1.0, 2.0, 3.0];
        assert!(matches!(
            check_regression_inputs(&flat, &moving),
            Err(AnalyticsError::DegenerateRegression(_))
        ));
        assert!(check_regression_inputs(&moving, &flat).is_ok());
    }

    #[test]
    fn test_flat_y_r_squared() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [7.0, 7.0, 7.0, 7.0];
        assert_eq!(r_squared(&x, &y, 0.0, 7.0), 1.0);
        assert_eq!(r_squared(&x, &y, 0.5, 6.0), 0.0);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        assert!(matches!(
            check_regression_inputs(&[1.0, 2.0], &[1.0]),
            Err(AnalyticsError::InvalidParameter(_))
        ));
    }
}
