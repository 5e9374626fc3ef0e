//! CLI Command Handlers
//!
//! `serve` runs the HTTP API; `analyze` and `correlate` compute one report
//! from an NDJSON tick file and print it as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapters::http::{run_server, AppState};
use crate::adapters::memory_store::InMemoryBarStore;
use crate::analytics::RegressionMethod;
use crate::application::{
    analyze_from_source, fetch_many, AnalyticsOrchestrator, AnalyticsRequest, ErrorReport,
    OrchestratorError, OrchestratorSettings,
};
use crate::config::{load_config, Config};
use crate::domain::{AlertEngine, Timeframe};
use crate::ports::BarSourceError;

/// Loaded when `--config` is not given and the file exists
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Spreadwatch - pair analytics for statistical arbitrage
#[derive(Parser, Debug)]
#[command(
    name = "spreadwatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Pair analytics for statistical arbitrage",
    long_about = "Spreadwatch estimates hedge ratios between two price series, tests the \
                  resulting spread for stationarity and tracks its rolling z-score, \
                  correlation and a threshold backtest."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP API
    Serve(ServeCmd),

    /// Compute pair analytics from a tick file
    Analyze(AnalyzeCmd),

    /// Compute a return-correlation matrix from a tick file
    Correlate(CorrelateCmd),
}

#[derive(Parser, Debug)]
pub struct ServeCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Override bind address (e.g. 0.0.0.0:8000)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// NDJSON tick file to preload, overriding [data] ndjson_path
    #[arg(short, long, value_name = "FILE")]
    pub data: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct AnalyzeCmd {
    /// Independent leg (x)
    #[arg(value_name = "X")]
    pub x: String,

    /// Dependent leg (y)
    #[arg(value_name = "Y")]
    pub y: String,

    /// NDJSON tick file
    #[arg(short, long, value_name = "FILE")]
    pub data: PathBuf,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Bar width (e.g. 1s, 5m, 1h)
    #[arg(short, long, value_name = "TF")]
    pub timeframe: Option<Timeframe>,

    /// Rolling window in bars
    #[arg(short = 'w', long, value_name = "BARS")]
    pub roll_window: Option<usize>,

    /// Hedge estimator (ols, kalman)
    #[arg(short, long, value_name = "METHOD")]
    pub regression: Option<RegressionMethod>,

    /// Drop bars with volume below this
    #[arg(long, value_name = "VOLUME")]
    pub min_volume: Option<f64>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Parser, Debug)]
pub struct CorrelateCmd {
    /// Symbols to correlate (at least two)
    #[arg(value_name = "SYMBOL", num_args = 2.., required = true)]
    pub symbols: Vec<String>,

    /// NDJSON tick file
    #[arg(short, long, value_name = "FILE")]
    pub data: PathBuf,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Bar width (e.g. 1s, 5m, 1h)
    #[arg(short, long, value_name = "TF")]
    pub timeframe: Option<Timeframe>,

    /// Drop bars with volume below this
    #[arg(long, value_name = "VOLUME")]
    pub min_volume: Option<f64>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

impl Command {
    fn config_path(&self) -> Option<&Path> {
        match self {
            Command::Serve(cmd) => cmd.config.as_deref(),
            Command::Analyze(cmd) => cmd.config.as_deref(),
            Command::Correlate(cmd) => cmd.config.as_deref(),
        }
    }
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    let config = resolve_config(app.command.config_path())?;

    // Initialize logging based on flags, falling back to [logging] level
    init_logging(app.verbose, app.debug, &config.logging.level)?;

    match app.command {
        Command::Serve(cmd) => serve_command(cmd, config).await,
        Command::Analyze(cmd) => analyze_command(cmd, config).await,
        Command::Correlate(cmd) => correlate_command(cmd, config).await,
    }
}

fn resolve_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_config(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load configuration from {}", DEFAULT_CONFIG_PATH)),
        None => Ok(Config::default()),
    }
}

/// Initialize logging system
fn init_logging(verbose: bool, debug: bool, config_level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        config_level
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    Ok(())
}

fn orchestrator_for(config: &Config) -> AnalyticsOrchestrator {
    AnalyticsOrchestrator::new(
        OrchestratorSettings::from(config),
        Arc::new(AlertEngine::new()),
    )
}

async fn load_store(path: &Path) -> Result<InMemoryBarStore> {
    let store = InMemoryBarStore::new();
    let loaded = store
        .load_ndjson_file(path)
        .await
        .with_context(|| format!("Failed to load ticks from {}", path.display()))?;
    tracing::info!("Loaded {} ticks from {}", loaded, path.display());
    Ok(store)
}

fn print_json(value: &serde_json::Value, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}

/// Handle serve command
async fn serve_command(cmd: ServeCmd, config: Config) -> Result<()> {
    let store = match cmd.data.or_else(|| config.data.ndjson_path()) {
        Some(path) => load_store(&path).await?,
        None => InMemoryBarStore::new(),
    };

    let bind = cmd.bind.unwrap_or_else(|| config.server.get_bind_addr());
    let addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", bind))?;

    let state = Arc::new(AppState {
        store: Arc::new(store),
        orchestrator: Arc::new(orchestrator_for(&config)),
        defaults: config.analytics.clone(),
    });

    tracing::info!("Starting spreadwatch API...");
    run_server(addr, state).await.context("HTTP server failed")?;
    tracing::info!("Spreadwatch stopped");
    Ok(())
}

/// Handle analyze command
async fn analyze_command(cmd: AnalyzeCmd, config: Config) -> Result<()> {
    let store = load_store(&cmd.data).await?;

    let mut request = AnalyticsRequest::with_defaults(&cmd.x, &cmd.y, &config);
    if let Some(timeframe) = cmd.timeframe {
        request.timeframe = timeframe;
    }
    if let Some(roll_window) = cmd.roll_window {
        request.roll_window = roll_window;
    }
    if let Some(regression) = cmd.regression {
        request.regression = regression;
    }
    if let Some(min_volume) = cmd.min_volume {
        request.min_volume = min_volume;
    }

    let orchestrator = orchestrator_for(&config);
    let output = match analyze_from_source(&orchestrator, &store, &request).await {
        Ok(report) => serde_json::to_value(&report)?,
        Err(OrchestratorError::Analytics(e)) => serde_json::to_value(ErrorReport::from(&e))?,
        Err(OrchestratorError::Source(BarSourceError::UnknownSymbol(symbol))) => {
            serde_json::to_value(ErrorReport::new(
                format!("no data for symbol '{}'", symbol),
                "no_data",
            ))?
        }
        Err(e) => return Err(e.into()),
    };

    print_json(&output, cmd.pretty)
}

/// Handle correlate command
async fn correlate_command(cmd: CorrelateCmd, config: Config) -> Result<()> {
    let store = load_store(&cmd.data).await?;
    let timeframe = cmd.timeframe.unwrap_or(config.analytics.default_timeframe);
    let min_volume = cmd.min_volume.unwrap_or(config.analytics.default_min_volume);

    let inputs = fetch_many(&store, &cmd.symbols, timeframe).await?;
    let output = match orchestrator_for(&config).correlation_matrix(&inputs, min_volume) {
        Ok(matrix) => serde_json::to_value(&matrix)?,
        Err(e) => serde_json::to_value(ErrorReport::from(&e))?,
    };

    print_json(&output, cmd.pretty)
}
