//! Ordinary least squares hedge ratio

use super::{check_regression_inputs, mean, r_squared, HedgeEstimator, HedgeRatio, RegressionMethod};
use crate::domain::AnalyticsError;

/// Static least-squares fit `y = beta * x + intercept` over the whole window
#[derive(Debug, Clone, Copy, Default)]
pub struct OlsEstimator;

impl HedgeEstimator for OlsEstimator {
    fn method(&self) -> RegressionMethod {
        RegressionMethod::Ols
    }

    fn estimate(&self, x: &[f64], y: &[f64]) -> Result<HedgeRatio, AnalyticsError> {
        check_regression_inputs(x, y)?;

        let mean_x = mean(x);
        let mean_y = mean(y);
        let (sxx, sxy) = x.iter().zip(y.iter()).fold((0.0, 0.0), |(sxx, sxy), (&xi, &yi)| {
            let dx = xi - mean_x;
            (sxx + dx * dx, sxy + dx * (yi - mean_y))
        });

        if sxx <= 0.0 || !sxx.is_finite() {
            return Err(AnalyticsError::DegenerateRegression(format!(
                "x leg has no usable variance (sxx = {})",
                sxx
            )));
        }

        let beta = sxy / sxx;
        let intercept = mean_y - beta * mean_x;
        if !beta.is_finite() || !intercept.is_finite() {
            return Err(AnalyticsError::NumericalInstability(
                "least-squares coefficients are not finite".to_string(),
            ));
        }

        Ok(HedgeRatio {
            beta,
            intercept,
            r_squared: r_squared(x, y, beta, intercept),
            method: RegressionMethod::Ols,
        })
    }
}
