//! Analytics Orchestrator
//!
//! Runs the pair pipeline for one request:
//! align -> hedge -> spread -> {ADF, z-score, correlation} -> backtest -> alerts
//!
//! Alignment and hedge estimation are fatal. Everything after the spread
//! fails per section, with the reason recorded under `issues`, so a short
//! history still yields a hedge ratio, a spread and (usually) an ADF result.

use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::analytics::{
    adf_test, compute_spread, correlation_matrix, estimator_for, require_window,
    rolling_correlation, rolling_zscore, run_backtest, AdfConfig, BacktestConfig,
    CorrelationMatrix, KalmanParams, RegressionMethod, SeriesAligner,
};
use crate::application::report::{AnalyticsReport, ReportSection};
use crate::config::Config;
use crate::domain::{
    AlertEngine, AlertMetric, AnalyticsError, Bar, MetricSnapshot, PairKey, Timeframe,
};
use crate::ports::{BarSource, BarSourceError};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Bar source error: {0}")]
    Source(#[from] BarSourceError),
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
}

impl OrchestratorError {
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::Source(e) => e.kind(),
            OrchestratorError::Analytics(e) => e.kind(),
        }
    }
}

/// One pair analytics request
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsRequest {
    pub x_symbol: String,
    pub y_symbol: String,
    pub timeframe: Timeframe,
    pub roll_window: usize,
    pub regression: RegressionMethod,
    pub min_volume: f64,
}

impl AnalyticsRequest {
    /// Request for `x`/`y` with every other field from the configured defaults
    pub fn with_defaults(x_symbol: &str, y_symbol: &str, config: &Config) -> Self {
        Self {
            x_symbol: x_symbol.to_string(),
            y_symbol: y_symbol.to_string(),
            timeframe: config.analytics.default_timeframe,
            roll_window: config.analytics.default_roll_window,
            regression: config.analytics.default_regression,
            min_volume: config.analytics.default_min_volume,
        }
    }

    pub fn pair(&self) -> PairKey {
        PairKey::new(&self.x_symbol, &self.y_symbol)
    }
}

/// Estimator and simulation settings shared by every request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorSettings {
    pub kalman: KalmanParams,
    pub adf: AdfConfig,
    pub backtest: BacktestConfig,
    pub max_points: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            kalman: KalmanParams::default(),
            adf: AdfConfig::default(),
            backtest: BacktestConfig::default(),
            max_points: 500,
        }
    }
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            kalman: config.kalman,
            adf: config.adf.to_adf_config(),
            backtest: config.backtest,
            max_points: config.analytics.max_points,
        }
    }
}

pub struct AnalyticsOrchestrator {
    settings: OrchestratorSettings,
    alerts: Arc<AlertEngine>,
}

impl AnalyticsOrchestrator {
    pub fn new(settings: OrchestratorSettings, alerts: Arc<AlertEngine>) -> Self {
        Self { settings, alerts }
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    pub fn alerts(&self) -> &Arc<AlertEngine> {
        &self.alerts
    }

    /// Run the full pipeline over already-fetched bars
    pub fn analyze(
        &self,
        request: &AnalyticsRequest,
        x_bars: &[Bar],
        y_bars: &[Bar],
    ) -> Result<AnalyticsReport, AnalyticsError> {
        if request.roll_window == 0 {
            return Err(AnalyticsError::InvalidParameter(
                "roll_window must be > 0".to_string(),
            ));
        }
        let pair = request.pair();

        let aligner = SeriesAligner::new(request.min_volume)?;
        let aligned = aligner.align_pair(x_bars, y_bars)?;

        let hedge = estimator_for(request.regression, self.settings.kalman)
            .estimate(aligned.x(), aligned.y())?;
        let spread = compute_spread(&aligned, &hedge);

        let mut issues = BTreeMap::new();

        let adf = match adf_test(&spread, &self.settings.adf) {
            Ok(result) => Some(result),
            Err(e) => {
                issues.insert(ReportSection::Adf, e.to_string());
                None
            }
        };

        let (zscore, corr, backtest, alerts) = match require_window(&aligned, request.roll_window) {
            Err(e) => {
                tracing::warn!(
                    pair = %pair,
                    aligned = aligned.len(),
                    roll_window = request.roll_window,
                    "Not enough aligned points for rolling statistics, returning partial report"
                );
                let message = e.to_string();
                for section in [ReportSection::Zscore, ReportSection::Corr, ReportSection::Backtest]
                {
                    issues.insert(section, message.clone());
                }
                let has_zscore_rules = self
                    .alerts
                    .rules_for_pair(&pair)
                    .iter()
                    .any(|rule| rule.metric == AlertMetric::Zscore);
                if has_zscore_rules {
                    issues.insert(ReportSection::Alerts, message);
                }

                // Spread rules still see the latest spread
                let snapshot = MetricSnapshot {
                    zscore: None,
                    spread: spread.latest(),
                };
                let alerts = self.alerts.evaluate(&pair, &snapshot);
                (None, None, None, alerts)
            }
            Ok(()) => {
                let zscore = rolling_zscore(&spread, request.roll_window)
                    .map_err(|e| issues.insert(ReportSection::Zscore, e.to_string()))
                    .ok();

                let corr = rolling_correlation(&aligned, request.roll_window)
                    .map_err(|e| issues.insert(ReportSection::Corr, e.to_string()))
                    .ok();

                let backtest = match &zscore {
                    Some(z) => run_backtest(z, &spread, &self.settings.backtest)
                        .map_err(|e| issues.insert(ReportSection::Backtest, e.to_string()))
                        .ok(),
                    None => None,
                };

                let snapshot = MetricSnapshot {
                    zscore: zscore.as_ref().and_then(|z| z.latest()),
                    spread: spread.latest(),
                };
                let alerts = self.alerts.evaluate(&pair, &snapshot);

                (zscore, corr, backtest, alerts)
            }
        };

        tracing::info!(
            pair = %pair,
            timeframe = %request.timeframe,
            regression = %request.regression,
            aligned = aligned.len(),
            beta = hedge.beta,
            adf_pvalue = adf.map(|a| a.p_value),
            alerts = alerts.len(),
            issues = issues.len(),
            "Pair analytics computed"
        );

        let report = AnalyticsReport {
            pair,
            timeframe: request.timeframe,
            regression: request.regression,
            roll_window: request.roll_window,
            aligned_points: aligned.len(),
            hedge,
            adf,
            spread,
            zscore,
            corr,
            backtest,
            alerts,
            issues,
        };
        Ok(report.truncate(self.settings.max_points))
    }

    /// Return-correlation matrix over `(symbol, bars)` inputs
    pub fn correlation_matrix(
        &self,
        inputs: &[(String, Vec<Bar>)],
        min_volume: f64,
    ) -> Result<CorrelationMatrix, AnalyticsError> {
        let aligner = SeriesAligner::new(min_volume)?;
        correlation_matrix(inputs, &aligner)
    }
}

/// Fetch both legs of `request` from `source`
pub async fn fetch_pair(
    source: &dyn BarSource,
    request: &AnalyticsRequest,
) -> Result<(Vec<Bar>, Vec<Bar>), BarSourceError> {
    let x = source.bars(&request.x_symbol, request.timeframe).await?;
    let y = source.bars(&request.y_symbol, request.timeframe).await?;
    Ok((x, y))
}

/// Fetch every symbol's bars from `source`, in order
///
/// An unknown symbol contributes no bars, so its matrix entries come out `null`.
pub async fn fetch_many(
    source: &dyn BarSource,
    symbols: &[String],
    timeframe: Timeframe,
) -> Result<Vec<(String, Vec<Bar>)>, BarSourceError> {
    let mut inputs = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let bars = match source.bars(symbol, timeframe).await {
            Ok(bars) => bars,
            Err(BarSourceError::UnknownSymbol(s)) => {
                tracing::debug!(symbol = %s, "No bars for symbol");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        inputs.push((symbol.trim().to_lowercase(), bars));
    }
    Ok(inputs)
}

/// Fetch and analyze in one call
pub async fn analyze_from_source(
    orchestrator: &AnalyticsOrchestrator,
    source: &dyn BarSource,
    request: &AnalyticsRequest,
) -> Result<AnalyticsReport, OrchestratorError> {
    let (x, y) = fetch_pair(source, request).await?;
    Ok(orchestrator.analyze(request, &x, &y)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AlertMetric, AlertOperator, DataRequirement, NewAlertRule};
    use crate::ports::MockBarSource;
    use chrono::{TimeZone, Utc};
    use mockall::predicate::eq;
    use rand::distributions::Distribution;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use statrs::distribution::Normal;

    /// Cointegrated pair: x is a random walk, y = 2x + 1 + AR(1) noise
    fn cointegrated_bars(n: usize, seed: u64) -> (Vec<Bar>, Vec<Bar>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let step = Normal::new(0.0, 0.5).unwrap();
        let shock = Normal::new(0.0, 0.3).unwrap();
        let mut x = 100.0;
        let mut e = 0.0;
        let mut xs = Vec::with_capacity(n);
        let mut ys = Vec::with_capacity(n);
        for i in 0..n {
            x += step.sample(&mut rng);
            e = 0.6 * e + shock.sample(&mut rng);
            let ts = Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap();
            xs.push(Bar::new(ts, x, x, x, x, 1.0));
            let y = 2.0 * x + 1.0 + e;
            ys.push(Bar::new(ts, y, y, y, y, 1.0));
        }
        (xs, ys)
    }

    fn request(roll_window: usize) -> AnalyticsRequest {
        AnalyticsRequest {
            x_symbol: "btcusdt".to_string(),
            y_symbol: "ethusdt".to_string(),
            timeframe: Timeframe::default(),
            roll_window,
            regression: RegressionMethod::Ols,
            min_volume: 0.0,
        }
    }

    fn orchestrator() -> AnalyticsOrchestrator {
        AnalyticsOrchestrator::new(OrchestratorSettings::default(), Arc::new(AlertEngine::new()))
    }

    #[test]
    fn test_full_report() {
        let (x, y) = cointegrated_bars(400, 1);
        let report = orchestrator().analyze(&request(60), &x, &y).unwrap();

        assert!(report.is_complete(), "issues: {:?}", report.issues);
        assert!((report.hedge.beta - 2.0).abs() < 0.05);
        assert_eq!(report.aligned_points, 400);
        assert_eq!(report.spread.len(), 400);
        let zscore = report.zscore.unwrap();
        assert_eq!(zscore.warm_up_len(), 59);
        assert_eq!(report.corr.unwrap().warm_up_len(), 60);
        assert!(report.adf.unwrap().is_stationary());
        assert_eq!(report.backtest.unwrap().equity_curve.len(), 400);
    }

    #[test]
    fn test_partial_report_when_window_too_long() {
        let (x, y) = cointegrated_bars(40, 2);
        let report = orchestrator().analyze(&request(60), &x, &y).unwrap();

        assert_eq!(report.spread.len(), 40);
        assert!(report.adf.is_some());
        assert!(report.zscore.is_none());
        assert!(report.corr.is_none());
        assert!(report.backtest.is_none());
        for section in [ReportSection::Zscore, ReportSection::Corr, ReportSection::Backtest] {
            assert!(report.issues[&section].contains("rolling window"));
        }
        assert!(!report.issues.contains_key(&ReportSection::Alerts));
    }

    fn add_pair_rule(orchestrator: &AnalyticsOrchestrator, metric: AlertMetric, threshold: f64) {
        orchestrator
            .alerts()
            .add_rule(NewAlertRule {
                symbol_x: "BTCUSDT".to_string(),
                symbol_y: "ETHUSDT".to_string(),
                metric,
                op: AlertOperator::GreaterThan,
                threshold,
            })
            .unwrap();
    }

    #[test]
    fn test_spread_alerts_fire_on_short_history() {
        let (x, y) = cointegrated_bars(40, 2);
        let orchestrator = orchestrator();
        add_pair_rule(&orchestrator, AlertMetric::Spread, -1e9);

        let report = orchestrator.analyze(&request(60), &x, &y).unwrap();
        assert!(report.zscore.is_none());
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].value, report.spread.latest().unwrap().1);
        assert!(!report.issues.contains_key(&ReportSection::Alerts));
    }

    #[test]
    fn test_zscore_rules_on_short_history_are_an_issue() {
        let (x, y) = cointegrated_bars(40, 2);
        let orchestrator = orchestrator();
        add_pair_rule(&orchestrator, AlertMetric::Zscore, -1e9);
        add_pair_rule(&orchestrator, AlertMetric::Spread, -1e9);

        let report = orchestrator.analyze(&request(60), &x, &y).unwrap();
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(report.alerts[0].metric, AlertMetric::Spread);
        assert!(report.issues[&ReportSection::Alerts].contains("rolling window"));
    }

    #[test]
    fn test_adf_failure_is_an_issue_not_an_error() {
        let (x, y) = cointegrated_bars(5, 3);
        let report = orchestrator().analyze(&request(3), &x, &y).unwrap();

        assert!(report.adf.is_none());
        assert!(report.issues.contains_key(&ReportSection::Adf));
        assert!(report.zscore.is_some());
    }

    #[test]
    fn test_too_few_aligned_points_is_fatal() {
        let (x, y) = cointegrated_bars(1, 4);
        let err = orchestrator().analyze(&request(3), &x, &y).unwrap_err();
        assert_eq!(err.requirement(), Some(DataRequirement::HedgeEstimation));
    }

    #[test]
    fn test_series_truncated_to_max_points() {
        let (x, y) = cointegrated_bars(300, 5);
        let settings = OrchestratorSettings {
            max_points: 100,
            ..OrchestratorSettings::default()
        };
        let orchestrator = AnalyticsOrchestrator::new(settings, Arc::new(AlertEngine::new()));
        let report = orchestrator.analyze(&request(20), &x, &y).unwrap();

        assert_eq!(report.spread.len(), 100);
        assert_eq!(report.zscore.as_ref().unwrap().len(), 100);
        assert_eq!(report.backtest.as_ref().unwrap().equity_curve.len(), 100);
        assert_eq!(report.spread.timestamps().last(), x.last().map(|b| &b.timestamp));
    }

    #[test]
    fn test_alerts_evaluated_against_latest_values() {
        let (x, y) = cointegrated_bars(200, 6);
        let orchestrator = orchestrator();
        orchestrator
            .alerts()
            .add_rule(NewAlertRule {
                symbol_x: "BTCUSDT".to_string(),
                symbol_y: "ETHUSDT".to_string(),
                metric: AlertMetric::Spread,
                op: AlertOperator::GreaterThan,
                threshold: -1e9,
            })
            .unwrap();

        let report = orchestrator.analyze(&request(30), &x, &y).unwrap();
        assert_eq!(report.alerts.len(), 1);
        let latest = report.spread.latest().unwrap();
        assert_eq!(report.alerts[0].value, latest.1);
        assert_eq!(report.alerts[0].timestamp, latest.0);
    }

    #[test]
    fn test_kalman_regression_selected() {
        let (x, y) = cointegrated_bars(300, 7);
        let mut req = request(30);
        req.regression = RegressionMethod::Kalman;

        let report = orchestrator().analyze(&req, &x, &y).unwrap();
        assert_eq!(report.hedge.method, RegressionMethod::Kalman);
        assert_eq!(report.regression, RegressionMethod::Kalman);
    }

    #[test]
    fn test_report_serializes_wire_shape() {
        let (x, y) = cointegrated_bars(100, 8);
        let report = orchestrator().analyze(&request(20), &x, &y).unwrap();
        let json = serde_json::to_value(&report).unwrap();

        assert!(json["hedge"]["rsq"].is_number());
        assert!(json["adf"]["pvalue"].is_number());
        assert!(json["adf"]["critical_values"]["5%"].is_number());
        assert!(json["spread"].is_object());
        assert!(json["backtest"]["equity"].is_object());
        assert!(json.get("issues").is_none());
    }

    #[tokio::test]
    async fn test_analyze_from_source_uses_port() {
        let (x, y) = cointegrated_bars(120, 9);
        let mut source = MockBarSource::new();
        source
            .expect_bars()
            .with(eq("btcusdt"), eq(Timeframe::default()))
            .times(1)
            .return_once(move |_, _| Ok(x));
        source
            .expect_bars()
            .with(eq("ethusdt"), eq(Timeframe::default()))
            .times(1)
            .return_once(move |_, _| Ok(y));

        let report = analyze_from_source(&orchestrator(), &source, &request(30))
            .await
            .unwrap();
        assert_eq!(report.aligned_points, 120);
    }

    #[tokio::test]
    async fn test_unknown_symbol_from_source() {
        let mut source = MockBarSource::new();
        source
            .expect_bars()
            .returning(|symbol, _| Err(BarSourceError::UnknownSymbol(symbol.to_string())));

        let err = analyze_from_source(&orchestrator(), &source, &request(30))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "no_data");
    }
}
