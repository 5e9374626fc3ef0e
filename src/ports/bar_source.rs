//! Bar source port
//!
//! Supplies resampled OHLCV bars per symbol and timeframe.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Bar, Timeframe};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BarSourceError {
    #[error("No data for symbol: {0}")]
    UnknownSymbol(String),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(String),
}

impl BarSourceError {
    pub fn kind(&self) -> &'static str {
        match self {
            BarSourceError::UnknownSymbol(_) => "no_data",
            BarSourceError::Parse { .. } => "parse_error",
            BarSourceError::Io(_) => "io_error",
        }
    }
}

impl From<std::io::Error> for BarSourceError {
    fn from(err: std::io::Error) -> Self {
        BarSourceError::Io(err.to_string())
    }
}

/// Resampled bar provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BarSource: Send + Sync {
    /// Bars for `symbol` at `timeframe`, oldest first, strictly increasing
    async fn bars(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Bar>, BarSourceError>;

    /// Known symbols, sorted
    async fn symbols(&self) -> Result<Vec<String>, BarSourceError>;
}
