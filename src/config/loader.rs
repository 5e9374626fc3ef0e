//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config/default.toml.
//! Every section is optional; missing sections and keys take their defaults.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::analytics::{AdfConfig, BacktestConfig, KalmanParams, LagSelection, RegressionMethod};
use crate::domain::Timeframe;

/// Environment override for `[server] bind_addr`
pub const BIND_ADDR_ENV: &str = "SPREADWATCH_BIND_ADDR";

/// Main configuration structure matching config/default.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analytics: AnalyticsSection,
    pub kalman: KalmanParams,
    pub adf: AdfSection,
    pub backtest: BacktestConfig,
    pub server: ServerSection,
    pub data: DataSection,
    pub logging: LoggingSection,
}

/// Request defaults and output limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsSection {
    /// Rolling window (in bars) when a request does not give one
    pub default_roll_window: usize,
    /// Hedge estimator when a request does not give one
    pub default_regression: RegressionMethod,
    /// Bar width when a request does not give one
    pub default_timeframe: Timeframe,
    /// Minimum bar volume when a request does not give one
    pub default_min_volume: f64,
    /// Output series keep only their last `max_points` entries
    pub max_points: usize,
}

impl Default for AnalyticsSection {
    fn default() -> Self {
        Self {
            default_roll_window: 60,
            default_regression: RegressionMethod::Ols,
            default_timeframe: Timeframe::default(),
            default_min_volume: 0.0,
            max_points: 500,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LagMethod {
    #[default]
    Aic,
    Fixed,
    Schwert,
}

/// Stationarity test settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdfSection {
    /// "aic", "fixed" or "schwert"
    pub lag_selection: LagMethod,
    /// Upper bound for the AIC search
    pub max_lag: Option<usize>,
    /// Lag count for `lag_selection = "fixed"`
    pub fixed_lag: Option<usize>,
}

impl AdfSection {
    pub fn to_adf_config(&self) -> AdfConfig {
        let lag_selection = match (self.lag_selection, self.fixed_lag) {
            (LagMethod::Fixed, Some(p)) => LagSelection::Fixed(p),
            (LagMethod::Schwert, _) => LagSelection::Schwert,
            _ => LagSelection::Aic,
        };
        AdfConfig {
            lag_selection,
            max_lag: self.max_lag,
        }
    }
}

/// HTTP server section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind_addr: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
        }
    }
}

impl ServerSection {
    /// Get bind address with environment variable override
    /// Checks SPREADWATCH_BIND_ADDR env var first, falls back to config value
    pub fn get_bind_addr(&self) -> String {
        std::env::var(BIND_ADDR_ENV).unwrap_or_else(|_| self.bind_addr.clone())
    }
}

/// Tick data section
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// NDJSON tick file loaded at startup; `~` is expanded
    pub ndjson_path: Option<String>,
}

impl DataSection {
    pub fn ndjson_path(&self) -> Option<PathBuf> {
        self.ndjson_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        let analytics = &self.analytics;
        if analytics.default_roll_window == 0 {
            return Err(ConfigError::ValidationError(
                "default_roll_window must be > 0".to_string(),
            ));
        }

        if analytics.max_points == 0 {
            return Err(ConfigError::ValidationError(
                "max_points must be > 0".to_string(),
            ));
        }

        if !analytics.default_min_volume.is_finite() || analytics.default_min_volume < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "default_min_volume must be >= 0, got {}",
                analytics.default_min_volume
            )));
        }

        self.kalman
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
        self.backtest
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.adf.lag_selection == LagMethod::Fixed && self.adf.fixed_lag.is_none() {
            return Err(ConfigError::ValidationError(
                "adf.fixed_lag is required when lag_selection = \"fixed\"".to_string(),
            ));
        }

        if self.server.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "server.bind_addr is not a socket address: {}",
                self.server.bind_addr
            )));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "logging.level must be trace/debug/info/warn/error, got {}",
                    other
                )))
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> String {
        r#"
[analytics]
default_roll_window = 30
default_regression = "kalman"
default_timeframe = "5m"
default_min_volume = 0.5
max_points = 200

[kalman]
process_noise = 1e-4
observation_noise = 1e-2
initial_covariance = 100.0

[adf]
lag_selection = "fixed"
fixed_lag = 3

[backtest]
entry_z = 2.5
exit_z = 0.5

[server]
bind_addr = "0.0.0.0:9000"

[data]
ndjson_path = "~/ticks/sample.ndjson"

[logging]
level = "debug"
"#
        .to_string()
    }

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config(&create_valid_config());
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.analytics.default_roll_window, 30);
        assert_eq!(config.analytics.default_regression, RegressionMethod::Kalman);
        assert_eq!(config.analytics.default_timeframe.seconds(), 300);
        assert_eq!(config.analytics.max_points, 200);
        assert_eq!(config.kalman.process_noise, 1e-4);
        assert_eq!(config.backtest.entry_z, 2.5);
        assert_eq!(config.adf.to_adf_config().lag_selection, LagSelection::Fixed(3));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.analytics.default_roll_window, 60);
        assert_eq!(config.analytics.max_points, 500);
        assert_eq!(config.kalman, KalmanParams::default());
        assert_eq!(config.adf.to_adf_config(), AdfConfig::default());
        assert_eq!(config.server.bind_addr, "127.0.0.1:8000");
        assert!(config.data.ndjson_path().is_none());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let file = write_config("[backtest]\nentry_z = 3.0\n");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.backtest.entry_z, 3.0);
        assert_eq!(config.backtest.exit_z, 0.0);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_config("/nonexistent/path/config.toml");
        assert!(matches!(result.unwrap_err(), ConfigError::IoError(_)));
    }

    #[test]
    fn test_bad_timeframe_is_parse_error() {
        let file = write_config("[analytics]\ndefault_timeframe = \"fortnight\"\n");
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ParseError(_)
        ));
    }

    #[test]
    fn test_invalid_roll_window() {
        let file = write_config("[analytics]\ndefault_roll_window = 0\n");
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_invalid_kalman_noise() {
        let file = write_config("[kalman]\nobservation_noise = -1.0\n");
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_fixed_lag_requires_value() {
        let file = write_config("[adf]\nlag_selection = \"fixed\"\n");
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_invalid_log_level() {
        let file = write_config("[logging]\nlevel = \"loud\"\n");
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::ValidationError(_)
        ));
    }

    #[test]
    fn test_ndjson_path_tilde_expanded() {
        let file = write_config(&create_valid_config());
        let config = load_config(file.path()).unwrap();
        let path = config.data.ndjson_path().unwrap();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with("ticks/sample.ndjson"));
    }
}
