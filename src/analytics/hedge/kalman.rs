//! Kalman Filter Hedge Ratio
//!
//! Tracks a time-varying `[beta, intercept]` state with a random-walk
//! transition and the scalar observation
//!
//! ```text
//! y[t] = beta[t] * x[t] + intercept[t] + v,   v ~ N(0, R)
//! [beta, intercept][t] = [beta, intercept][t-1] + w,   w ~ N(0, q * I)
//! ```
//!
//! Every estimation starts from the same prior (beta = 1, intercept = 0,
//! covariance = `initial_covariance * I`) and folds the observations in
//! order; the reported ratio is the state after the last observation.

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

use super::{check_regression_inputs, r_squared, HedgeEstimator, HedgeRatio, RegressionMethod};
use crate::domain::AnalyticsError;

/// Floor on the innovation variance `S`
pub const MIN_INNOVATION_VARIANCE: f64 = 1e-12;

/// Tunable noise parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanParams {
    /// Process noise `q` added to both state variances each step
    pub process_noise: f64,
    /// Observation noise `R`
    pub observation_noise: f64,
    /// Diagonal of the prior covariance
    pub initial_covariance: f64,
}

impl Default for KalmanParams {
    fn default() -> Self {
        Self {
            process_noise: 1e-5,
            observation_noise: 1e-3,
            initial_covariance: 1e4,
        }
    }
}

impl KalmanParams {
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if !self.process_noise.is_finite() || self.process_noise < 0.0 {
            return Err(AnalyticsError::InvalidParameter(format!(
                "kalman process_noise must be finite and >= 0, got {}",
                self.process_noise
            )));
        }
        if !self.observation_noise.is_finite() || self.observation_noise <= 0.0 {
            return Err(AnalyticsError::InvalidParameter(format!(
                "kalman observation_noise must be finite and > 0, got {}",
                self.observation_noise
            )));
        }
        if !self.initial_covariance.is_finite() || self.initial_covariance <= 0.0 {
            return Err(AnalyticsError::InvalidParameter(format!(
                "kalman initial_covariance must be finite and > 0, got {}",
                self.initial_covariance
            )));
        }
        Ok(())
    }
}

/// Filter state threaded through one estimation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanState {
    /// `[beta, intercept]`
    pub mean: Vector2<f64>,
    pub covariance: Matrix2<f64>,
}

impl KalmanState {
    pub fn prior(params: &KalmanParams) -> Self {
        Self {
            mean: Vector2::new(1.0, 0.0),
            covariance: Matrix2::identity() * params.initial_covariance,
        }
    }

    pub fn beta(&self) -> f64 {
        self.mean[0]
    }

    pub fn intercept(&self) -> f64 {
        self.mean[1]
    }

    /// One predict/update cycle for the observation `(x, y)`
    pub fn step(self, x: f64, y: f64, params: &KalmanParams) -> Self {
        // Predict: random walk keeps the mean, inflates the covariance
        let predicted = self.covariance + Matrix2::identity() * params.process_noise;

        // Update
        let h = Vector2::new(x, 1.0);
        let innovation = y - h.dot(&self.mean);
        let ph = predicted * h;
        let s = (h.dot(&ph) + params.observation_noise).max(MIN_INNOVATION_VARIANCE);
        let gain = ph / s;

        let mean = self.mean + gain * innovation;

        // Joseph form
        let i_kh = Matrix2::identity() - gain * h.transpose();
        let covariance = i_kh * predicted * i_kh.transpose()
            + gain * gain.transpose() * params.observation_noise;

        Self {
            mean,
            covariance: (covariance + covariance.transpose()) * 0.5,
        }
    }
}

/// Adaptive hedge ratio estimator
#[derive(Debug, Clone, Copy, Default)]
pub struct KalmanEstimator {
    params: KalmanParams,
}

impl KalmanEstimator {
    pub fn new(params: KalmanParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KalmanParams {
        &self.params
    }

    /// Fold every observation into a fresh prior and return the final state
    pub fn filter(&self, x: &[f64], y: &[f64]) -> KalmanState {
        x.iter()
            .zip(y.iter())
            .fold(KalmanState::prior(&self.params), |state, (&xi, &yi)| {
                state.step(xi, yi, &self.params)
            })
    }
}

impl HedgeEstimator for KalmanEstimator {
    fn method(&self) -> RegressionMethod {
        RegressionMethod::Kalman
    }

    fn estimate(&self, x: &[f64], y: &[f64]) -> Result<HedgeRatio, AnalyticsError> {
        self.params.validate()?;
        check_regression_inputs(x, y)?;

        let state = self.filter(x, y);
        let (beta, intercept) = (state.beta(), state.intercept());
        if !beta.is_finite() || !intercept.is_finite() {
            return Err(AnalyticsError::NumericalInstability(
                "kalman filter state diverged".to_string(),
            ));
        }

        tracing::trace!(
            beta,
            intercept,
            observations = x.len(),
            beta_variance = state.covariance[(0, 0)],
            "Kalman hedge ratio estimated"
        );

        Ok(HedgeRatio {
            beta,
            intercept,
            r_squared: r_squared(x, y, beta, intercept),
            method: RegressionMethod::Kalman,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::hedge::OlsEstimator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use statrs::distribution::Normal;
    use rand::distributions::Distribution;

    fn oscillating_x(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + 50.0 * (i as f64 * 0.07).sin()).collect()
    }

    #[test]
    fn test_tracks_noiseless_line_with_defaults() {
        let x = oscillating_x(500);
        let y: Vec<f64> = x.iter().map(|v| 2.0 * v + 1.0).collect();

        let hedge = KalmanEstimator::default().estimate(&x, &y).unwrap();
        assert!((hedge.beta - 2.0).abs() < 1e-3, "beta = {}", hedge.beta);
        assert!((hedge.intercept - 1.0).abs() < 0.1, "intercept = {}", hedge.intercept);
        assert!(hedge.r_squared > 0.999);
        assert_eq!(hedge.method, RegressionMethod::Kalman);
    }

    #[test]
    fn test_converges_to_ols_without_process_noise() {
        let mut rng = StdRng::seed_from_u64(7);
        let noise = Normal::new(0.0, 0.05).unwrap();
        let x = oscillating_x(2000);
        let y: Vec<f64> = x
            .iter()
            .map(|v| 2.0 * v + 1.0 + noise.sample(&mut rng))
            .collect();

        let params = KalmanParams {
            process_noise: 0.0,
            ..KalmanParams::default()
        };
        let kalman = KalmanEstimator::new(params).estimate(&x, &y).unwrap();
        let ols = OlsEstimator.estimate(&x, &y).unwrap();

        assert!((kalman.beta - ols.beta).abs() < 1e-4);
        assert!((kalman.intercept - ols.intercept).abs() < 1e-2);
    }

    #[test]
    fn test_adapts_to_regime_shift() {
        let x = oscillating_x(1000);
        let y: Vec<f64> = x
            .iter()
            .enumerate()
            .map(|(i, v)| if i < 500 { 1.5 * v } else { 2.5 * v })
            .collect();

        let kalman = KalmanEstimator::default().estimate(&x, &y).unwrap();
        let ols = OlsEstimator.estimate(&x, &y).unwrap();

        assert!((kalman.beta - 2.5).abs() < 0.05, "kalman beta = {}", kalman.beta);
        assert!((ols.beta - 2.5).abs() > 0.2, "ols beta = {}", ols.beta);
    }

    #[test]
    fn test_covariance_stays_symmetric() {
        let x = oscillating_x(300);
        let y: Vec<f64> = x.iter().map(|v| 0.8 * v - 3.0).collect();
        let state = KalmanEstimator::default().filter(&x, &y);

        assert_eq!(state.covariance[(0, 1)], state.covariance[(1, 0)]);
        assert!(state.covariance[(0, 0)] > 0.0);
        assert!(state.covariance[(1, 1)] > 0.0);
    }

    #[test]
    fn test_each_estimation_starts_fresh() {
        let estimator = KalmanEstimator::default();
        let x = oscillating_x(200);
        let y: Vec<f64> = x.iter().map(|v| 1.2 * v).collect();

        let first = estimator.estimate(&x, &y).unwrap();
        let second = estimator.estimate(&x, &y).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = KalmanParams {
            observation_noise: 0.0,
            ..KalmanParams::default()
        };
        let result = KalmanEstimator::new(params).estimate(&[1.0, 2.0], &[1.0, 2.0]);
        assert!(matches!(result, Err(AnalyticsError::InvalidParameter(_))));
    }

    #[test]
    fn test_flat_y_settles_on_zero_beta() {
        let x: Vec<f64> = (1..=40).map(|i| i as f64).collect();
        let y = vec![4.0; 40];

        let hedge = KalmanEstimator::default().estimate(&x, &y).unwrap();
        assert!(hedge.beta.abs() < 0.01, "beta = {}", hedge.beta);
        assert!((hedge.intercept - 4.0).abs() < 0.1, "intercept = {}", hedge.intercept);
    }
}
