//! Backtest Simulator
//!
//! Single-position mean-reversion strategy over the z-score series:
//! - flat, z crosses above `+entry_z`  => short the spread
//! - flat, z crosses below `-entry_z`  => long the spread
//! - short exits when z crosses down through `exit_z`, long when it crosses up
//!
//! One unit of spread notional, no costs. Per-period P&L is the exposure
//! held over the period times the spread change; equity is its running sum.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AnalyticsError, TimeSeries};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub entry_z: f64,
    pub exit_z: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            entry_z: 2.0,
            exit_z: 0.0,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if !self.entry_z.is_finite() || self.entry_z <= 0.0 {
            return Err(AnalyticsError::InvalidParameter(format!(
                "entry_z must be finite and > 0, got {}",
                self.entry_z
            )));
        }
        if !self.exit_z.is_finite() || self.exit_z.abs() >= self.entry_z {
            return Err(AnalyticsError::InvalidParameter(format!(
                "exit_z must be finite with |exit_z| < entry_z, got {}",
                self.exit_z
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Spread units held
    pub fn exposure(&self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }
}

/// An open position: which side, since when, at what spread
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OpenPosition {
    pub side: PositionSide,
    pub entry: DateTime<Utc>,
    pub entry_spread: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BacktestTrade {
    pub side: PositionSide,
    pub entry: DateTime<Utc>,
    pub exit: DateTime<Utc>,
    pub pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    #[serde(rename = "equity")]
    pub equity_curve: TimeSeries,
    pub trade_count: usize,
    pub trades: Vec<BacktestTrade>,
    pub open_position: Option<OpenPosition>,
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve.latest().map(|(_, v)| v).unwrap_or(0.0)
    }
}

/// Simulate the strategy over `zscore`, taking P&L from `spread`
///
/// Both series must share one timestamp index.
pub fn run_backtest(
    zscore: &TimeSeries,
    spread: &TimeSeries,
    config: &BacktestConfig,
) -> Result<BacktestResult, AnalyticsError> {
    config.validate()?;
    if zscore.timestamps() != spread.timestamps() {
        return Err(AnalyticsError::InvalidParameter(
            "z-score and spread series must share one timestamp index".to_string(),
        ));
    }

    let mut position: Option<OpenPosition> = None;
    let mut trades = Vec::new();
    let mut trade_count = 0usize;
    let mut equity = 0.0;
    let mut equity_curve = Vec::with_capacity(zscore.len());
    let mut prev_z: Option<f64> = None;
    let mut prev_spread: Option<f64> = None;

    for (i, (ts, z)) in zscore.iter().enumerate() {
        let current_spread = spread.get(i);

        // Mark to market the position held over the last period
        if let (Some(open), Some(prev), Some(cur)) = (position, prev_spread, current_spread) {
            equity += open.side.exposure() * (cur - prev);
        }
        equity_curve.push(equity);

        if let (Some(prev), Some(cur), Some(cur_spread)) = (prev_z, z, current_spread) {
            if let Some(open) = position {
                let exit = match open.side {
                    PositionSide::Short => prev > config.exit_z && cur <= config.exit_z,
                    PositionSide::Long => prev < config.exit_z && cur >= config.exit_z,
                };
                if exit {
                    let pnl = open.side.exposure() * (cur_spread - open.entry_spread);
                    trades.push(BacktestTrade {
                        side: open.side,
                        entry: open.entry,
                        exit: ts,
                        pnl,
                    });
                    position = None;
                }
            }

            if position.is_none() {
                let side = if prev <= config.entry_z && cur > config.entry_z {
                    Some(PositionSide::Short)
                } else if prev >= -config.entry_z && cur < -config.entry_z {
                    Some(PositionSide::Long)
                } else {
                    None
                };
                if let Some(side) = side {
                    trade_count += 1;
                    position = Some(OpenPosition {
                        side,
                        entry: ts,
                        entry_spread: cur_spread,
                    });
                }
            }
        }

        if z.is_some() {
            prev_z = z;
        }
        if current_spread.is_some() {
            prev_spread = current_spread;
        }
    }

    tracing::debug!(
        trade_count,
        closed = trades.len(),
        final_equity = equity,
        open = position.is_some(),
        "Backtest complete"
    );

    Ok(BacktestResult {
        equity_curve: TimeSeries::defined(zscore.timestamps().to_vec(), equity_curve),
        trade_count,
        trades,
        open_position: position,
    })
}
