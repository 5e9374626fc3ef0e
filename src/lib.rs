//! Spreadwatch - Pair Analytics for Statistical Arbitrage
//!
//! Hedge ratios, spreads, stationarity tests, rolling statistics, a threshold
//! backtest and alert rules over two aligned price series.
//!
//! # Modules
//!
//! - `domain`: Core types (Bar, TimeSeries, Timeframe, AlertEngine, AnalyticsError)
//! - `analytics`: Aligner, OLS/Kalman hedge estimators, rolling stats, ADF, backtest
//! - `ports`: Trait abstractions (BarSource)
//! - `adapters`: External implementations (in-memory tick store, HTTP, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Orchestrator and report assembly

pub mod domain;
pub mod analytics;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;
