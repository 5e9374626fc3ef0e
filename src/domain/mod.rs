//! Domain Layer - Core types for pair analytics
//!
//! Pure data types and process-wide state with no I/O:
//! - `bar`: OHLCV bars and the aligned pair series built from them
//! - `series`: timestamped value series with explicit warm-up gaps
//! - `error`: the analytics failure taxonomy
//! - `alert`: alert rule and event types
//! - `alert_engine`: the shared rule registry
//! - `timeframe`: resampling bar widths

pub mod bar;
pub mod series;
pub mod error;
pub mod alert;
pub mod alert_engine;
pub mod timeframe;

pub use bar::{Bar, AlignedPairSeries};
pub use series::TimeSeries;
pub use error::{AnalyticsError, DataRequirement};
pub use alert::{AlertEvent, AlertMetric, AlertOperator, AlertRule, MetricSnapshot, NewAlertRule, PairKey};
pub use alert_engine::{AlertEngine, RuleOutcome};
pub use timeframe::Timeframe;
