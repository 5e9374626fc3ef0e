//! Resampling Timeframes
//!
//! Bar widths such as `1s`, `5m`, `15min`, `1h`, `1d`. Buckets are aligned
//! to the Unix epoch and labelled by their left edge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::AnalyticsError;

/// Widest accepted bar: ten 365-day years
pub const MAX_TIMEFRAME_SECONDS: i64 = 10 * 365 * 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timeframe {
    seconds: i64,
}

impl Timeframe {
    pub fn from_seconds(seconds: i64) -> Result<Self, AnalyticsError> {
        if seconds <= 0 {
            return Err(AnalyticsError::InvalidParameter(format!(
                "timeframe must be at least one second, got {}s",
                seconds
            )));
        }
        if seconds > MAX_TIMEFRAME_SECONDS {
            return Err(AnalyticsError::InvalidParameter(format!(
                "timeframe must be at most {}s, got {}s",
                MAX_TIMEFRAME_SECONDS, seconds
            )));
        }
        Ok(Self { seconds })
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Left edge of the bucket containing `ts`
    ///
    /// `seconds` never exceeds [`MAX_TIMEFRAME_SECONDS`], so the width in
    /// milliseconds fits an `i64`.
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let width_ms = self.seconds * 1000;
        let start_ms = ts.timestamp_millis().div_euclid(width_ms) * width_ms;
        DateTime::<Utc>::from_timestamp_millis(start_ms).unwrap_or(ts)
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self { seconds: 1 }
    }
}

impl FromStr for Timeframe {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (count, unit) = s.split_at(split);
        let count: i64 = if count.is_empty() {
            1
        } else {
            count.parse().map_err(|_| invalid_timeframe(&s))?
        };
        let unit_seconds = match unit {
            "s" | "sec" => 1,
            "m" | "min" | "t" => 60,
            "h" | "hr" => 3_600,
            "d" => 86_400,
            _ => return Err(invalid_timeframe(&s)),
        };
        let seconds = count
            .checked_mul(unit_seconds)
            .ok_or_else(|| invalid_timeframe(&s))?;
        Timeframe::from_seconds(seconds)
    }
}

fn invalid_timeframe(s: &str) -> AnalyticsError {
    AnalyticsError::InvalidParameter(format!(
        "unrecognised timeframe '{}', expected e.g. 1s, 5m, 1h, 1d",
        s
    ))
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds;
        if s % 86_400 == 0 {
            write!(f, "{}d", s / 86_400)
        } else if s % 3_600 == 0 {
            write!(f, "{}h", s / 3_600)
        } else if s % 60 == 0 {
            write!(f, "{}m", s / 60)
        } else {
            write!(f, "{}s", s)
        }
    }
}

impl Serialize for Timeframe {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Timeframe {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parses_common_widths() {
        assert_eq!("1s".parse::<Timeframe>().unwrap().seconds(), 1);
        assert_eq!("5m".parse::<Timeframe>().unwrap().seconds(), 300);
        assert_eq!("15min".parse::<Timeframe>().unwrap().seconds(), 900);
        assert_eq!("1H".parse::<Timeframe>().unwrap().seconds(), 3_600);
        assert_eq!("d".parse::<Timeframe>().unwrap().seconds(), 86_400);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!("".parse::<Timeframe>().is_err());
        assert!("5w".parse::<Timeframe>().is_err());
        assert!("0s".parse::<Timeframe>().is_err());
        assert!("-1m".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_oversized_widths_rejected() {
        assert!(matches!(
            "200000000000000d".parse::<Timeframe>(),
            Err(AnalyticsError::InvalidParameter(_))
        ));
        assert!("3651d".parse::<Timeframe>().is_err());
        assert!(Timeframe::from_seconds(i64::MAX).is_err());

        let widest: Timeframe = "3650d".parse().unwrap();
        assert_eq!(widest.seconds(), MAX_TIMEFRAME_SECONDS);
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 10, 7, 42).unwrap();
        assert!(widest.bucket_start(ts) <= ts);
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!("60s".parse::<Timeframe>().unwrap().to_string(), "1m");
        assert_eq!("90s".parse::<Timeframe>().unwrap().to_string(), "90s");
        assert_eq!("24h".parse::<Timeframe>().unwrap().to_string(), "1d");
    }

    #[test]
    fn test_bucket_start_floors_to_epoch_grid() {
        let tf: Timeframe = "5m".parse().unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 10, 7, 42).unwrap();
        assert_eq!(tf.bucket_start(ts), Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap());
    }
}
