//! Analytics Core
//!
//! Pure, synchronous pair computations, leaf-first:
//! align -> hedge -> spread -> {rolling, adf} -> backtest
//!
//! `correlation` reuses the aligner and the rolling accumulators for
//! multi-symbol return correlation.

pub mod align;
pub mod hedge;
pub mod spread;
pub mod rolling;
pub mod adf;
pub mod backtest;
pub mod correlation;

pub use align::{require_window, SeriesAligner, MIN_HEDGE_POINTS};
pub use hedge::{
    estimator_for, HedgeEstimator, HedgeRatio, KalmanEstimator, KalmanParams, KalmanState,
    OlsEstimator, RegressionMethod,
};
pub use spread::compute_spread;
pub use rolling::{pct_returns, pearson, rolling_correlation, rolling_zscore, RollingWindow};
pub use adf::{adf_test, AdfConfig, AdfResult, CriticalValues, LagSelection, ADF_MIN_OBSERVATIONS};
pub use backtest::{run_backtest, BacktestConfig, BacktestResult, BacktestTrade, OpenPosition, PositionSide};
pub use correlation::{
    correlation_matrix, return_correlation, CorrelationMatrix, MIN_CORRELATION_POINTS,
};
