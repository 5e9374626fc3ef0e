//! Timestamped Value Series
//!
//! Spread, z-score, correlation and equity curves all share this shape:
//! an ordered timestamp index with a value that may be explicitly undefined
//! (rolling warm-up), serialized as a JSON object `{ts: value | null}`.

use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<Option<f64>>,
}

impl TimeSeries {
    /// Build a series from parallel timestamp and value vectors
    ///
    /// Panics in debug builds if the lengths differ; every producer in this
    /// crate derives both from the same aligned index.
    pub fn new(timestamps: Vec<DateTime<Utc>>, values: Vec<Option<f64>>) -> Self {
        debug_assert_eq!(timestamps.len(), values.len());
        Self { timestamps, values }
    }

    /// A fully-defined series
    pub fn defined(timestamps: Vec<DateTime<Utc>>, values: Vec<f64>) -> Self {
        Self::new(timestamps, values.into_iter().map(Some).collect())
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at position `idx`, `None` if out of range or undefined
    pub fn get(&self, idx: usize) -> Option<f64> {
        self.values.get(idx).copied().flatten()
    }

    /// Most recent defined value together with its timestamp
    pub fn latest(&self) -> Option<(DateTime<Utc>, f64)> {
        self.timestamps
            .iter()
            .zip(self.values.iter())
            .rev()
            .find_map(|(ts, v)| v.map(|v| (*ts, v)))
    }

    /// Number of leading undefined values
    pub fn warm_up_len(&self) -> usize {
        self.values.iter().take_while(|v| v.is_none()).count()
    }

    /// Iterator over `(timestamp, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (DateTime<Utc>, Option<f64>)> + '_ {
        self.timestamps.iter().copied().zip(self.values.iter().copied())
    }

    /// Defined values only, in order
    pub fn defined_values(&self) -> Vec<f64> {
        self.values.iter().filter_map(|v| *v).collect()
    }

    /// Keep only the last `n` entries
    pub fn tail(&self, n: usize) -> Self {
        let start = self.len().saturating_sub(n);
        Self {
            timestamps: self.timestamps[start..].to_vec(),
            values: self.values[start..].to_vec(),
        }
    }
}

impl Serialize for TimeSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (ts, value) in self.iter() {
            map.serialize_entry(&ts.to_rfc3339(), &value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_latest_skips_undefined_tail() {
        let series = TimeSeries::new(
            vec![ts(1), ts(2), ts(3)],
            vec![Some(1.0), Some(2.0), None],
        );
        assert_eq!(series.latest(), Some((ts(2), 2.0)));
    }

    #[test]
    fn test_warm_up_len() {
        let series = TimeSeries::new(
            vec![ts(1), ts(2), ts(3), ts(4)],
            vec![None, None, Some(0.5), Some(0.1)],
        );
        assert_eq!(series.warm_up_len(), 2);
        assert_eq!(series.defined_values(), vec![0.5, 0.1]);
    }

    #[test]
    fn test_tail_keeps_last_entries() {
        let series = TimeSeries::defined(vec![ts(1), ts(2), ts(3)], vec![1.0, 2.0, 3.0]);
        let tail = series.tail(2);
        assert_eq!(tail.timestamps(), &[ts(2), ts(3)]);
        assert_eq!(tail.values(), &[Some(2.0), Some(3.0)]);
        assert_eq!(series.tail(10).len(), 3);
    }

    #[test]
    fn test_serializes_undefined_as_null() {
        let series = TimeSeries::new(vec![ts(0), ts(60)], vec![None, Some(1.5)]);
        let json = serde_json::to_value(&series).unwrap();
        assert_eq!(json["1970-01-01T00:00:00+00:00"], serde_json::Value::Null);
        assert_eq!(json["1970-01-01T00:01:00+00:00"], 1.5);
    }
}
