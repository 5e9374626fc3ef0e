//! In-memory tick store
//!
//! Holds raw ticks per symbol and resamples them into OHLCV bars on demand.
//! Ticks arrive as NDJSON lines:
//!
//! ```text
//! {"symbol":"btcusdt","ts":"2024-03-01T10:00:00.250Z","price":61234.5,"size":0.012}
//! ```
//!
//! `ts` may be an RFC 3339 string, a naive ISO timestamp (read as UTC), or
//! epoch milliseconds. `size` defaults to 0. Symbols are stored lowercase.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

use crate::domain::{Bar, Timeframe};
use crate::ports::{BarSource, BarSourceError};

/// One trade print
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub size: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TickTime {
    Text(String),
    EpochMillis(i64),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    fn value(&self) -> Result<f64, String> {
        match self {
            Numeric::Number(v) => Ok(*v),
            Numeric::Text(s) => s.trim().parse().map_err(|_| format!("'{}' is not a number", s)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TickRecord {
    symbol: String,
    ts: TickTime,
    price: Numeric,
    #[serde(default)]
    size: Option<Numeric>,
}

fn parse_timestamp(ts: &TickTime) -> Result<DateTime<Utc>, String> {
    match ts {
        TickTime::EpochMillis(ms) => DateTime::<Utc>::from_timestamp_millis(*ms)
            .ok_or_else(|| format!("epoch millis {} out of range", ms)),
        TickTime::Text(s) => {
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Ok(dt.with_timezone(&Utc));
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|naive| naive.and_utc())
                .ok_or_else(|| format!("unrecognised timestamp '{}'", s))
        }
    }
}

/// Parse NDJSON text into `(symbol, tick)` pairs; blank lines are skipped
pub fn parse_ndjson(text: &str) -> Result<Vec<(String, Tick)>, BarSourceError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            let line_no = idx + 1;
            let parse_err = |message: String| BarSourceError::Parse {
                line: line_no,
                message,
            };
            let record: TickRecord =
                serde_json::from_str(line).map_err(|e| parse_err(e.to_string()))?;
            let tick = Tick {
                timestamp: parse_timestamp(&record.ts).map_err(parse_err)?,
                price: record.price.value().map_err(parse_err)?,
                size: match &record.size {
                    Some(size) => size.value().map_err(parse_err)?,
                    None => 0.0,
                },
            };
            Ok((record.symbol.trim().to_lowercase(), tick))
        })
        .collect()
}

/// Accumulates one bucket's OHLCV
#[derive(Debug)]
struct BarBuilder {
    start: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl BarBuilder {
    fn new(start: DateTime<Utc>, tick: &Tick) -> Self {
        Self {
            start,
            open: tick.price,
            high: tick.price,
            low: tick.price,
            close: tick.price,
            volume: tick.size,
        }
    }

    fn update(&mut self, tick: &Tick) {
        self.high = self.high.max(tick.price);
        self.low = self.low.min(tick.price);
        self.close = tick.price;
        self.volume += tick.size;
    }

    fn finish(self) -> Bar {
        Bar::new(self.start, self.open, self.high, self.low, self.close, self.volume)
    }
}

/// Resample time-ordered ticks into bars; empty buckets produce no bar
pub fn resample(ticks: &[Tick], timeframe: Timeframe) -> Vec<Bar> {
    let mut bars = Vec::new();
    let mut current: Option<BarBuilder> = None;

    for tick in ticks.iter().filter(|t| t.price.is_finite()) {
        let bucket = timeframe.bucket_start(tick.timestamp);
        match current.as_mut() {
            Some(builder) if builder.start == bucket => builder.update(tick),
            _ => {
                if let Some(done) = current.replace(BarBuilder::new(bucket, tick)) {
                    bars.push(done.finish());
                }
            }
        }
    }
    if let Some(done) = current {
        bars.push(done.finish());
    }
    bars
}

#[derive(Debug, Default)]
pub struct InMemoryBarStore {
    ticks: RwLock<HashMap<String, Vec<Tick>>>,
}

impl InMemoryBarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert ticks, keeping each symbol's ticks in time order
    ///
    /// Ticks sharing a timestamp keep their arrival order.
    pub async fn insert(&self, ticks: Vec<(String, Tick)>) -> usize {
        let count = ticks.len();
        let mut store = self.ticks.write().await;
        let mut touched: Vec<String> = Vec::new();
        for (symbol, tick) in ticks {
            if !touched.contains(&symbol) {
                touched.push(symbol.clone());
            }
            store.entry(symbol).or_default().push(tick);
        }
        for symbol in &touched {
            if let Some(series) = store.get_mut(symbol) {
                series.sort_by_key(|t| t.timestamp);
            }
        }
        tracing::info!(ticks = count, symbols = touched.len(), "Ticks loaded");
        count
    }

    /// Parse and insert NDJSON text; nothing is inserted if any line is malformed
    pub async fn load_ndjson(&self, text: &str) -> Result<usize, BarSourceError> {
        let ticks = parse_ndjson(text)?;
        Ok(self.insert(ticks).await)
    }

    pub async fn load_ndjson_file(&self, path: &Path) -> Result<usize, BarSourceError> {
        let text = tokio::fs::read_to_string(path).await?;
        self.load_ndjson(&text).await
    }

    pub async fn tick_count(&self, symbol: &str) -> usize {
        let store = self.ticks.read().await;
        store.get(&symbol.to_lowercase()).map_or(0, |t| t.len())
    }
}

#[async_trait]
impl BarSource for InMemoryBarStore {
    async fn bars(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Bar>, BarSourceError> {
        let key = symbol.trim().to_lowercase();
        let store = self.ticks.read().await;
        match store.get(&key) {
            Some(ticks) if !ticks.is_empty() => Ok(resample(ticks, timeframe)),
            _ => Err(BarSourceError::UnknownSymbol(key)),
        }
    }

    async fn symbols(&self) -> Result<Vec<String>, BarSourceError> {
        let store = self.ticks.read().await;
        let mut symbols: Vec<String> = store.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}
