//! Spread Calculator
//!
//! Residual of the hedged pair: `spread[t] = y[t] - (beta * x[t] + intercept)`.
//! One value per aligned timestamp, never undefined.

use crate::analytics::hedge::HedgeRatio;
use crate::domain::{AlignedPairSeries, TimeSeries};

pub fn compute_spread(series: &AlignedPairSeries, hedge: &HedgeRatio) -> TimeSeries {
    let values = series
        .x()
        .iter()
        .zip(series.y().iter())
        .map(|(&x, &y)| y - (hedge.beta * x + hedge.intercept))
        .collect();
    TimeSeries::defined(series.timestamps().to_vec(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::hedge::RegressionMethod;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_spread_is_residual() {
        let ts = (0..3).map(|i| Utc.timestamp_opt(i * 60, 0).unwrap()).collect();
        let series = AlignedPairSeries::from_parts(ts, vec![1.0, 2.0, 3.0], vec![3.5, 4.8, 7.0]);
        let hedge = HedgeRatio {
            beta: 2.0,
            intercept: 1.0,
            r_squared: 0.0,
            method: RegressionMethod::Ols,
        };

        let spread = compute_spread(&series, &hedge);
        assert_eq!(spread.len(), 3);
        assert_eq!(spread.warm_up_len(), 0);
        let values = spread.defined_values();
        assert!((values[0] - 0.5).abs() < 1e-12);
        assert!((values[1] + 0.2).abs() < 1e-12);
        assert!(values[2].abs() < 1e-12);
        assert_eq!(spread.timestamps(), series.timestamps());
    }
}
