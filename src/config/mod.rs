//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    AdfSection, AnalyticsSection, Config, ConfigError, DataSection, LagMethod, LoggingSection,
    ServerSection, load_config, BIND_ADDR_ENV,
};
