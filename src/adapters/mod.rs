//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits and the outer surfaces:
//! - Memory store: NDJSON tick ingestion and OHLCV resampling behind `BarSource`
//! - HTTP: axum JSON API over the store and the analytics orchestrator
//! - CLI: Command-line interface handlers

pub mod cli;
pub mod http;
pub mod memory_store;

pub use cli::CliApp;
pub use http::{router, run_server, ApiError, AppState};
pub use memory_store::{parse_ndjson, resample, InMemoryBarStore, Tick};
