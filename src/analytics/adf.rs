//! Augmented Dickey-Fuller Stationarity Test
//!
//! Regresses `Δs[t]` on a constant, the lagged level `s[t-1]` and `p`
//! lagged differences; the test statistic is the t-statistic on `s[t-1]`.
//!
//! - p-value: MacKinnon (1994) approximate asymptotic distribution,
//!   constant-only regression with one variable
//! - critical values: MacKinnon (2010) finite-sample response surfaces
//!
//! Lag order defaults to the AIC search used by `adfuller`: every lag in
//! `0..=max_lag` is fitted on the same trimmed sample, the lowest AIC wins,
//! and the winner is refitted on the longest sample its lag allows.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::f64::consts::PI;
use std::fmt;

use crate::domain::{AnalyticsError, DataRequirement, TimeSeries};

/// Shortest series the test will run on
pub const ADF_MIN_OBSERVATIONS: usize = 10;

/// Significance level of the stationarity decision
pub const ADF_SIGNIFICANCE: f64 = 0.05;

/// Singular values below this fraction of the largest mean a rank-deficient design
const RANK_TOLERANCE: f64 = 1e-10;

// MacKinnon (1994), constant term, N = 1
const TAU_MAX: f64 = 2.74;
const TAU_MIN: f64 = -18.83;
const TAU_STAR: f64 = -1.61;
const TAU_SMALL_P: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_LARGE_P: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

// MacKinnon (2010), constant term, N = 1: b0 + b1/T + b2/T^2 + b3/T^3
const CRIT_1PCT: [f64; 4] = [-3.43035, -6.5393, -16.786, -79.433];
const CRIT_5PCT: [f64; 4] = [-2.86154, -2.8903, -4.234, -40.040];
const CRIT_10PCT: [f64; 4] = [-2.56677, -1.5384, -2.809, 0.0];

/// How the number of lagged differences is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LagSelection {
    /// Minimum Akaike information criterion over `0..=max_lag`
    Aic,
    /// Exactly this many lags
    Fixed(usize),
    /// Schwert's rule `floor(12 * (n/100)^(1/4))`, capped like `max_lag`
    Schwert,
}

impl Default for LagSelection {
    fn default() -> Self {
        LagSelection::Aic
    }
}

impl fmt::Display for LagSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LagSelection::Aic => write!(f, "aic"),
            LagSelection::Fixed(p) => write!(f, "fixed({})", p),
            LagSelection::Schwert => write!(f, "schwert"),
        }
    }
}

/// Test settings
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AdfConfig {
    pub lag_selection: LagSelection,
    /// Upper bound for the AIC search; `None` uses `ceil(12 * (n/100)^(1/4))`
    pub max_lag: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CriticalValues {
    #[serde(rename = "1%")]
    pub one_pct: f64,
    #[serde(rename = "5%")]
    pub five_pct: f64,
    #[serde(rename = "10%")]
    pub ten_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdfResult {
    #[serde(rename = "stat")]
    pub statistic: f64,
    #[serde(rename = "pvalue")]
    pub p_value: f64,
    pub critical_values: CriticalValues,
    pub lag_order: usize,
    #[serde(rename = "nobs")]
    pub n_obs: usize,
    pub lag_selection: LagSelection,
    pub stationary: bool,
}

impl AdfResult {
    pub fn is_stationary(&self) -> bool {
        self.stationary
    }
}

/// Run the test on the defined values of `spread`
pub fn adf_test(spread: &TimeSeries, config: &AdfConfig) -> Result<AdfResult, AnalyticsError> {
    adf_test_values(&spread.defined_values(), config)
}

pub fn adf_test_values(series: &[f64], config: &AdfConfig) -> Result<AdfResult, AnalyticsError> {
    let n = series.len();
    if n < ADF_MIN_OBSERVATIONS {
        return Err(AnalyticsError::insufficient(
            DataRequirement::StationarityTest,
            ADF_MIN_OBSERVATIONS,
            n,
        ));
    }
    if series.iter().any(|v| !v.is_finite()) {
        return Err(AnalyticsError::InvalidParameter(
            "ADF input contains non-finite values".to_string(),
        ));
    }

    let diffs: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();
    let lag_cap = n / 2 - 2;

    let lag = match config.lag_selection {
        LagSelection::Fixed(p) => p,
        LagSelection::Schwert => schwert_lag(n).min(lag_cap),
        LagSelection::Aic => {
            let max_lag = config.max_lag.unwrap_or_else(|| default_max_lag(n)).min(lag_cap);
            select_lag_by_aic(series, &diffs, max_lag)?
        }
    };

    let fit = fit_adf_regression(series, &diffs, lag, lag)?;
    let statistic = fit.t_stat(1)?;
    let p_value = mackinnon_p_value(statistic);

    tracing::debug!(
        statistic,
        p_value,
        lag,
        nobs = fit.nobs,
        selection = %config.lag_selection,
        "ADF test complete"
    );

    Ok(AdfResult {
        statistic,
        p_value,
        critical_values: critical_values(fit.nobs),
        lag_order: lag,
        n_obs: fit.nobs,
        lag_selection: config.lag_selection,
        stationary: p_value < ADF_SIGNIFICANCE,
    })
}

/// `ceil(12 * (n/100)^(1/4))`
pub fn default_max_lag(n: usize) -> usize {
    (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as usize
}

fn schwert_lag(n: usize) -> usize {
    (12.0 * (n as f64 / 100.0).powf(0.25)).floor() as usize
}

/// Fit every lag in `0..=max_lag` on the sample trimmed for `max_lag`
fn select_lag_by_aic(series: &[f64], diffs: &[f64], max_lag: usize) -> Result<usize, AnalyticsError> {
    let mut best: Option<(usize, f64)> = None;
    for lag in 0..=max_lag {
        match fit_adf_regression(series, diffs, lag, max_lag) {
            Ok(fit) => {
                let aic = fit.aic();
                if best.map_or(true, |(_, best_aic)| aic < best_aic) {
                    best = Some((lag, aic));
                }
            }
            Err(e) => tracing::trace!(lag, error = %e, "Skipping lag in AIC search"),
        }
    }
    best.map(|(lag, _)| lag).ok_or_else(|| {
        AnalyticsError::NumericalInstability(format!(
            "no lag in 0..={} produced a usable ADF regression",
            max_lag
        ))
    })
}

/// Build and fit the ADF regression with `lag` lagged differences
///
/// Rows start at diff index `trim`, so candidates fitted with the same
/// `trim` share one sample.
fn fit_adf_regression(
    series: &[f64],
    diffs: &[f64],
    lag: usize,
    trim: usize,
) -> Result<OlsFit, AnalyticsError> {
    let k = lag + 2;
    let rows = diffs.len().saturating_sub(trim);
    if rows <= k {
        return Err(AnalyticsError::NumericalInstability(format!(
            "ADF regression with {} lags needs more than {} observations, have {}",
            lag, k, rows
        )));
    }

    let design = DMatrix::from_fn(rows, k, |r, c| {
        let t = trim + r;
        match c {
            0 => 1.0,
            1 => series[t],
            j => diffs[t - (j - 1)],
        }
    });
    let target = DVector::from_fn(rows, |r, _| diffs[trim + r]);

    OlsFit::fit(&design, &target)
}

struct OlsFit {
    params: DVector<f64>,
    /// `(XᵀX)⁻¹`
    xtx_inv: DMatrix<f64>,
    ssr: f64,
    nobs: usize,
    k: usize,
}

impl OlsFit {
    fn fit(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<Self, AnalyticsError> {
        let singular = x.clone().svd(false, false).singular_values;
        let (sv_min, sv_max) = (singular.min(), singular.max());
        if !(sv_max > 0.0) || sv_min <= sv_max * RANK_TOLERANCE {
            return Err(AnalyticsError::NumericalInstability(
                "ADF design matrix is singular".to_string(),
            ));
        }

        let xt = x.transpose();
        let xtx_inv = (&xt * x).try_inverse().ok_or_else(|| {
            AnalyticsError::NumericalInstability("XᵀX is not invertible".to_string())
        })?;
        let params = &xtx_inv * (&xt * y);
        let residuals = y - x * &params;
        let ssr = residuals.norm_squared();

        if ssr <= 1e-20 * y.norm_squared().max(f64::MIN_POSITIVE) {
            return Err(AnalyticsError::NumericalInstability(
                "ADF regression has zero residual variance".to_string(),
            ));
        }

        Ok(Self {
            params,
            xtx_inv,
            ssr,
            nobs: x.nrows(),
            k: x.ncols(),
        })
    }

    fn t_stat(&self, col: usize) -> Result<f64, AnalyticsError> {
        let sigma2 = self.ssr / (self.nobs - self.k) as f64;
        let se = (sigma2 * self.xtx_inv[(col, col)]).sqrt();
        let t = self.params[col] / se;
        if !t.is_finite() {
            return Err(AnalyticsError::NumericalInstability(
                "ADF t-statistic is not finite".to_string(),
            ));
        }
        Ok(t)
    }

    /// Gaussian log-likelihood
    fn log_likelihood(&self) -> f64 {
        let n = self.nobs as f64;
        -n / 2.0 * ((2.0 * PI).ln() + (self.ssr / n).ln() + 1.0)
    }

    fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.k as f64
    }
}

/// MacKinnon (1994) approximate p-value for a constant-only ADF statistic
pub fn mackinnon_p_value(statistic: f64) -> f64 {
    if statistic > TAU_MAX {
        return 1.0;
    }
    if statistic < TAU_MIN {
        return 0.0;
    }
    let poly = if statistic <= TAU_STAR {
        polyval(&TAU_SMALL_P, statistic)
    } else {
        polyval(&TAU_LARGE_P, statistic)
    };
    match Normal::new(0.0, 1.0) {
        Ok(standard) => standard.cdf(poly),
        Err(_) => f64::NAN,
    }
}

/// MacKinnon (2010) critical values for `nobs` regression observations
pub fn critical_values(nobs: usize) -> CriticalValues {
    let inv = 1.0 / nobs as f64;
    CriticalValues {
        one_pct: polyval(&CRIT_1PCT, inv),
        five_pct: polyval(&CRIT_5PCT, inv),
        ten_pct: polyval(&CRIT_10PCT, inv),
    }
}

/// `c[0] + c[1]*x + c[2]*x^2 + ...`
fn polyval(coefs: &[f64], x: f64) -> f64 {
    coefs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}
