//! OHLCV Bars and Aligned Pair Series

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One resampled OHLCV bar, as produced by the ingestion/storage side
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// A bar whose close can take part in returns and regressions
    pub fn has_usable_close(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

/// Closing prices of two legs sharing one timestamp index
///
/// Built only by the series aligner, so `timestamps`, `x` and `y`
/// always have the same length and the timestamps are strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPairSeries {
    timestamps: Vec<DateTime<Utc>>,
    x: Vec<f64>,
    y: Vec<f64>,
}

impl AlignedPairSeries {
    pub(crate) fn from_parts(timestamps: Vec<DateTime<Utc>>, x: Vec<f64>, y: Vec<f64>) -> Self {
        debug_assert_eq!(timestamps.len(), x.len());
        debug_assert_eq!(timestamps.len(), y.len());
        Self { timestamps, x, y }
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Independent leg closes
    pub fn x(&self) -> &[f64] {
        &self.x
    }

    /// Dependent leg closes
    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}
