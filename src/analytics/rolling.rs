//! Rolling Statistics Engine
//!
//! Trailing-window z-score of the spread and trailing-window Pearson
//! correlation of the two legs' returns.
//!
//! Both use incremental accumulators: running sums of values shifted by an
//! anchor observation, updated in O(1) as the window slides. When the
//! centred sum of squares falls far below the largest squared offset the
//! sums have carried (a stale anchor, or an evicted outlier), they are
//! rebuilt from the window around its newest value. Standard deviations use
//! the sample (n - 1) denominator.
//!
//! Zero variance inside a window yields 0 rather than NaN/inf.

use std::collections::VecDeque;

use crate::domain::{AlignedPairSeries, AnalyticsError, DataRequirement, TimeSeries};

/// Variance at or below `ZERO_VARIANCE_EPSILON * (1 + mean²)` of the window counts as zero
pub const ZERO_VARIANCE_EPSILON: f64 = 1e-12;

/// Centred-to-peak ratio below which the running sums are rebuilt
const REBUILD_RATIO: f64 = 1e-6;

/// Running sums of one variable, shifted by an anchor value
#[derive(Debug, Clone, Default)]
struct Moments {
    n: usize,
    shift: Option<f64>,
    sum: f64,
    sum_sq: f64,
    /// Largest squared offset added since the last rebuild
    peak_sq: f64,
}

impl Moments {
    fn anchored(anchor: f64, values: impl Iterator<Item = f64>) -> Self {
        let mut moments = Self {
            shift: Some(anchor),
            ..Self::default()
        };
        values.for_each(|v| moments.add(v));
        moments
    }

    fn add(&mut self, value: f64) {
        let d = value - *self.shift.get_or_insert(value);
        self.n += 1;
        self.sum += d;
        self.sum_sq += d * d;
        self.peak_sq = self.peak_sq.max(d * d);
    }

    fn remove(&mut self, value: f64) {
        let d = value - self.shift.unwrap_or(value);
        self.n -= 1;
        self.sum -= d;
        self.sum_sq -= d * d;
    }

    fn mean(&self) -> f64 {
        self.shift.unwrap_or(0.0) + self.sum / self.n as f64
    }

    /// Sample variance, clamped at zero; `None` with fewer than two values
    fn variance(&self) -> Option<f64> {
        if self.n < 2 {
            return None;
        }
        let n = self.n as f64;
        Some(((self.sum_sq - self.sum * self.sum / n) / (n - 1.0)).max(0.0))
    }

    /// True when cancellation has eaten most of the precision of `sum_sq`
    fn needs_rebuild(&self) -> bool {
        if self.n == 0 {
            return false;
        }
        let centred = self.sum_sq - self.sum * self.sum / self.n as f64;
        centred < REBUILD_RATIO * self.peak_sq
    }

    fn is_flat(&self, variance: f64) -> bool {
        let scale = 1.0 + self.mean().powi(2);
        variance <= ZERO_VARIANCE_EPSILON * scale
    }
}

/// Running co-moments of two variables
#[derive(Debug, Clone, Default)]
struct CoMoments {
    x: Moments,
    y: Moments,
    sum_xy: f64,
}

impl CoMoments {
    fn needs_rebuild(&self) -> bool {
        self.x.needs_rebuild() || self.y.needs_rebuild()
    }

    fn anchored((anchor_x, anchor_y): (f64, f64), pairs: impl Iterator<Item = (f64, f64)>) -> Self {
        let mut moments = Self {
            x: Moments::anchored(anchor_x, std::iter::empty()),
            y: Moments::anchored(anchor_y, std::iter::empty()),
            sum_xy: 0.0,
        };
        pairs.for_each(|(x, y)| moments.add(x, y));
        moments
    }

    fn add(&mut self, x: f64, y: f64) {
        self.x.add(x);
        self.y.add(y);
        self.sum_xy += self.x_offset(x) * self.y_offset(y);
    }

    fn remove(&mut self, x: f64, y: f64) {
        self.sum_xy -= self.x_offset(x) * self.y_offset(y);
        self.x.remove(x);
        self.y.remove(y);
    }

    fn x_offset(&self, x: f64) -> f64 {
        x - self.x.shift.unwrap_or(x)
    }

    fn y_offset(&self, y: f64) -> f64 {
        y - self.y.shift.unwrap_or(y)
    }

    /// Pearson correlation; 0 when either side has zero variance
    fn correlation(&self) -> Option<f64> {
        let var_x = self.x.variance()?;
        let var_y = self.y.variance()?;
        if self.x.is_flat(var_x) || self.y.is_flat(var_y) {
            return Some(0.0);
        }
        let n = self.x.n as f64;
        let cov = (self.sum_xy - self.x.sum * self.y.sum / n) / (n - 1.0);
        Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
    }
}

/// Trailing window of single values with O(1) mean / standard deviation
#[derive(Debug, Clone)]
pub struct RollingWindow {
    window: usize,
    values: VecDeque<f64>,
    moments: Moments,
}

impl RollingWindow {
    pub fn new(window: usize) -> Result<Self, AnalyticsError> {
        if window == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "rolling window must be > 0".to_string(),
            ));
        }
        Ok(Self {
            window,
            values: VecDeque::with_capacity(window),
            moments: Moments::default(),
        })
    }

    /// Push a value, evicting the oldest once the window is full
    pub fn push(&mut self, value: f64) {
        if self.values.len() == self.window {
            if let Some(old) = self.values.pop_front() {
                self.moments.remove(old);
            }
        }
        self.values.push_back(value);
        self.moments.add(value);

        if self.moments.needs_rebuild() {
            self.moments = Moments::anchored(value, self.values.iter().copied());
        }
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.window
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.moments = Moments::default();
    }

    /// Z-score of `value` against the current window; 0 when the window is flat
    ///
    /// A window of one value has no sample deviation and also scores 0.
    pub fn zscore(&self, value: f64) -> Option<f64> {
        if !self.is_full() {
            return None;
        }
        let variance = match self.moments.variance() {
            Some(v) if !self.moments.is_flat(v) => v,
            _ => return Some(0.0),
        };
        Some((value - self.moments.mean()) / variance.sqrt())
    }
}

/// Rolling z-score of `series` over its trailing `window` values
///
/// The first `window - 1` outputs are `None`. An undefined input value
/// yields `None` and restarts the window.
pub fn rolling_zscore(series: &TimeSeries, window: usize) -> Result<TimeSeries, AnalyticsError> {
    let mut rolling = RollingWindow::new(window)?;
    if series.len() < window {
        return Err(AnalyticsError::insufficient(
            DataRequirement::RollingWindow,
            window,
            series.len(),
        ));
    }

    let values = series
        .values()
        .iter()
        .map(|value| match value {
            Some(v) => {
                rolling.push(*v);
                rolling.zscore(*v)
            }
            None => {
                rolling.clear();
                None
            }
        })
        .collect();

    Ok(TimeSeries::new(series.timestamps().to_vec(), values))
}

/// Period-over-period percentage change; the first value is `None`
pub fn pct_returns(prices: &[f64]) -> Vec<Option<f64>> {
    std::iter::once(None)
        .chain(prices.windows(2).map(|w| {
            let r = w[1] / w[0] - 1.0;
            r.is_finite().then_some(r)
        }))
        .take(prices.len())
        .collect()
}

/// Rolling Pearson correlation of the two legs' percentage returns
///
/// Returns start at the second timestamp, so the first defined correlation
/// sits at index `window`.
pub fn rolling_correlation(
    series: &AlignedPairSeries,
    window: usize,
) -> Result<TimeSeries, AnalyticsError> {
    if window < 2 {
        return Err(AnalyticsError::InvalidParameter(format!(
            "correlation window must be >= 2, got {}",
            window
        )));
    }

    let rx = pct_returns(series.x());
    let ry = pct_returns(series.y());

    let mut buffer: VecDeque<(f64, f64)> = VecDeque::with_capacity(window);
    let mut moments = CoMoments::default();

    let values = rx
        .iter()
        .zip(ry.iter())
        .map(|pair| match pair {
            (Some(a), Some(b)) => {
                if buffer.len() == window {
                    if let Some((old_a, old_b)) = buffer.pop_front() {
                        moments.remove(old_a, old_b);
                    }
                }
                buffer.push_back((*a, *b));
                moments.add(*a, *b);
                if moments.needs_rebuild() {
                    moments = CoMoments::anchored((*a, *b), buffer.iter().copied());
                }
                if buffer.len() == window {
                    moments.correlation()
                } else {
                    None
                }
            }
            _ => {
                buffer.clear();
                moments = CoMoments::default();
                None
            }
        })
        .collect();

    Ok(TimeSeries::new(series.timestamps().to_vec(), values))
}

/// Full-sample Pearson correlation; `None` with fewer than two pairs
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let mut moments = CoMoments::default();
    for (&a, &b) in x.iter().zip(y.iter()) {
        moments.add(a, b);
    }
    moments.correlation()
}
