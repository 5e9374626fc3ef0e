//! Correlation Matrix
//!
//! Full-sample Pearson correlation of percentage returns for every pair in
//! a symbol set. Each pair is aligned independently, so one thin symbol only
//! blanks its own row and column.

use serde::Serialize;

use crate::analytics::align::SeriesAligner;
use crate::analytics::rolling::{pct_returns, pearson};
use crate::domain::{AlignedPairSeries, AnalyticsError, Bar, DataRequirement};

/// Aligned points needed for two returns, the least a correlation needs
pub const MIN_CORRELATION_POINTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub symbols: Vec<String>,
    /// Row-major, `matrix[i][j]` = corr(symbols[i], symbols[j]); `None` without enough data
    pub matrix: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.symbols.iter().position(|s| s == a)?;
        let j = self.symbols.iter().position(|s| s == b)?;
        self.matrix[i][j]
    }
}

/// Build the matrix over `(symbol, bars)` inputs
pub fn correlation_matrix(
    inputs: &[(String, Vec<Bar>)],
    aligner: &SeriesAligner,
) -> Result<CorrelationMatrix, AnalyticsError> {
    if inputs.len() < 2 {
        return Err(AnalyticsError::InvalidParameter(format!(
            "correlation matrix needs at least 2 symbols, got {}",
            inputs.len()
        )));
    }

    let n = inputs.len();
    let mut matrix = vec![vec![None; n]; n];
    for i in 0..n {
        matrix[i][i] = Some(1.0);
        for j in (i + 1)..n {
            let rho = pair_correlation(&inputs[i], &inputs[j], aligner);
            matrix[i][j] = rho;
            matrix[j][i] = rho;
        }
    }

    Ok(CorrelationMatrix {
        symbols: inputs.iter().map(|(s, _)| s.clone()).collect(),
        matrix,
    })
}

fn pair_correlation(
    (sym_a, bars_a): &(String, Vec<Bar>),
    (sym_b, bars_b): &(String, Vec<Bar>),
    aligner: &SeriesAligner,
) -> Option<f64> {
    let result = aligner
        .align_pair(bars_a, bars_b)
        .and_then(|aligned| return_correlation(&aligned));
    match result {
        Ok(rho) => Some(rho),
        Err(e) => {
            tracing::debug!(a = %sym_a, b = %sym_b, error = %e, "Pair left out of correlation matrix");
            None
        }
    }
}

/// Full-sample Pearson correlation of the two legs' percentage returns
pub fn return_correlation(aligned: &AlignedPairSeries) -> Result<f64, AnalyticsError> {
    let (ra, rb): (Vec<f64>, Vec<f64>) = pct_returns(aligned.x())
        .into_iter()
        .zip(pct_returns(aligned.y()))
        .filter_map(|pair| match pair {
            (Some(a), Some(b)) => Some((a, b)),
            _ => None,
        })
        .unzip();

    pearson(&ra, &rb).ok_or_else(|| {
        AnalyticsError::insufficient(
            DataRequirement::Correlation,
            MIN_CORRELATION_POINTS,
            aligned.len(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| {
                let ts = Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap();
                Bar::new(ts, c, c, c, c, 1.0)
            })
            .collect()
    }

    #[test]
    fn test_matrix_shape_and_symmetry() {
        let a = bars(&[100.0, 101.0, 99.0, 102.0, 103.0]);
        let b = bars(&[50.0, 50.5, 49.5, 51.0, 51.5]);
        let c = bars(&[10.0, 9.0, 11.0, 8.0, 7.5]);
        let inputs = vec![
            ("a".to_string(), a),
            ("b".to_string(), b),
            ("c".to_string(), c),
        ];

        let m = correlation_matrix(&inputs, &SeriesAligner::default()).unwrap();
        assert_eq!(m.symbols, vec!["a", "b", "c"]);
        for i in 0..3 {
            assert_eq!(m.matrix[i][i], Some(1.0));
            for j in 0..3 {
                assert_eq!(m.matrix[i][j], m.matrix[j][i]);
            }
        }
        assert!((m.get("a", "b").unwrap() - 1.0).abs() < 1e-9);
        assert!(m.get("a", "c").unwrap() < 0.0);
    }

    #[test]
    fn test_pair_without_overlap_is_null() {
        let a = bars(&[100.0, 101.0, 102.0]);
        let b: Vec<Bar> = bars(&[1.0, 2.0, 3.0])
            .into_iter()
            .map(|mut bar| {
                bar.timestamp = bar.timestamp + chrono::Duration::days(1);
                bar
            })
            .collect();
        let inputs = vec![("a".to_string(), a), ("b".to_string(), b)];

        let m = correlation_matrix(&inputs, &SeriesAligner::default()).unwrap();
        assert_eq!(m.get("a", "b"), None);
        assert_eq!(m.get("a", "a"), Some(1.0));
    }

    #[test]
    fn test_two_aligned_points_are_too_few() {
        let aligned = SeriesAligner::default()
            .align_pair(&bars(&[100.0, 101.0]), &bars(&[50.0, 49.0]))
            .unwrap();
        let err = return_correlation(&aligned).unwrap_err();
        assert_eq!(err.requirement(), Some(DataRequirement::Correlation));
        assert_eq!(
            err.to_string(),
            "Insufficient data for correlation: need 3 points, have 2"
        );

        let inputs = vec![
            ("a".to_string(), bars(&[100.0, 101.0])),
            ("b".to_string(), bars(&[50.0, 49.0])),
        ];
        let m = correlation_matrix(&inputs, &SeriesAligner::default()).unwrap();
        assert_eq!(m.get("a", "b"), None);
    }

    #[test]
    fn test_needs_two_symbols() {
        let inputs = vec![("a".to_string(), bars(&[1.0, 2.0]))];
        assert!(matches!(
            correlation_matrix(&inputs, &SeriesAligner::default()),
            Err(AnalyticsError::InvalidParameter(_))
        ));
    }
}
