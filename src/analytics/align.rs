//! Series Aligner
//!
//! Intersects two bar series on timestamp after dropping bars below the
//! minimum-volume floor. Both inputs must be strictly increasing in time, so
//! the intersection is a single merge walk.

use std::cmp::Ordering;

use crate::domain::{AlignedPairSeries, AnalyticsError, Bar, DataRequirement};

/// Fewest aligned points a regression can use
pub const MIN_HEDGE_POINTS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesAligner {
    min_volume: f64,
}

impl Default for SeriesAligner {
    fn default() -> Self {
        Self { min_volume: 0.0 }
    }
}

impl SeriesAligner {
    pub fn new(min_volume: f64) -> Result<Self, AnalyticsError> {
        if !min_volume.is_finite() || min_volume < 0.0 {
            return Err(AnalyticsError::InvalidParameter(format!(
                "min_volume must be a finite value >= 0, got {}",
                min_volume
            )));
        }
        Ok(Self { min_volume })
    }

    pub fn min_volume(&self) -> f64 {
        self.min_volume
    }

    /// Align `x` and `y`, requiring enough points for both hedge estimation
    /// and a rolling window of `roll_window`
    pub fn align(
        &self,
        x: &[Bar],
        y: &[Bar],
        roll_window: usize,
    ) -> Result<AlignedPairSeries, AnalyticsError> {
        let aligned = self.align_pair(x, y)?;
        require_window(&aligned, roll_window)?;
        Ok(aligned)
    }

    /// Align `x` and `y`, requiring only enough points for hedge estimation
    pub fn align_pair(&self, x: &[Bar], y: &[Bar]) -> Result<AlignedPairSeries, AnalyticsError> {
        ensure_strictly_increasing(x, "x")?;
        ensure_strictly_increasing(y, "y")?;

        let x_kept: Vec<&Bar> = self.filter(x, "x");
        let y_kept: Vec<&Bar> = self.filter(y, "y");

        let capacity = x_kept.len().min(y_kept.len());
        let mut timestamps = Vec::with_capacity(capacity);
        let mut xs = Vec::with_capacity(capacity);
        let mut ys = Vec::with_capacity(capacity);

        let (mut i, mut j) = (0, 0);
        while i < x_kept.len() && j < y_kept.len() {
            match x_kept[i].timestamp.cmp(&y_kept[j].timestamp) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    timestamps.push(x_kept[i].timestamp);
                    xs.push(x_kept[i].close);
                    ys.push(y_kept[j].close);
                    i += 1;
                    j += 1;
                }
            }
        }

        tracing::debug!(
            x_bars = x.len(),
            y_bars = y.len(),
            aligned = timestamps.len(),
            min_volume = self.min_volume,
            "Aligned pair series"
        );

        if timestamps.len() < MIN_HEDGE_POINTS {
            return Err(AnalyticsError::insufficient(
                DataRequirement::HedgeEstimation,
                MIN_HEDGE_POINTS,
                timestamps.len(),
            ));
        }

        Ok(AlignedPairSeries::from_parts(timestamps, xs, ys))
    }

    fn filter<'a>(&self, bars: &'a [Bar], leg: &str) -> Vec<&'a Bar> {
        let mut unusable = 0usize;
        let kept: Vec<&Bar> = bars
            .iter()
            .filter(|bar| {
                if !bar.has_usable_close() {
                    unusable += 1;
                    return false;
                }
                bar.volume >= self.min_volume
            })
            .collect();
        if unusable > 0 {
            tracing::warn!(leg, dropped = unusable, "Dropped bars with non-positive or non-finite close");
        }
        kept
    }
}

/// Check that an aligned series is long enough for a rolling window
pub fn require_window(series: &AlignedPairSeries, roll_window: usize) -> Result<(), AnalyticsError> {
    if roll_window == 0 {
        return Err(AnalyticsError::InvalidParameter(
            "roll_window must be > 0".to_string(),
        ));
    }
    if series.len() < roll_window {
        return Err(AnalyticsError::insufficient(
            DataRequirement::RollingWindow,
            roll_window,
            series.len(),
        ));
    }
    Ok(())
}

fn ensure_strictly_increasing(bars: &[Bar], leg: &str) -> Result<(), AnalyticsError> {
    match bars.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
        Some(w) => Err(AnalyticsError::InvalidParameter(format!(
            "{} series timestamps must be strictly increasing ({} followed by {})",
            leg, w[0].timestamp, w[1].timestamp
        ))),
        None => Ok(()),
    }
}
