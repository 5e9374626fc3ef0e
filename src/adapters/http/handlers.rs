use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;

use super::error::ApiError;
use super::AppState;
use crate::application::{fetch_many, fetch_pair, AnalyticsRequest, ErrorReport};
use crate::config::AnalyticsSection;
use crate::domain::{AlertRule, AnalyticsError, NewAlertRule};
use crate::ports::{BarSource, BarSourceError};

fn parse_or<T>(raw: Option<&str>, default: T) -> Result<T, ApiError>
where
    T: FromStr<Err = AnalyticsError>,
{
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => Ok(s.parse()?),
        None => Ok(default),
    }
}

#[derive(Debug, Deserialize)]
pub struct TimeframeQuery {
    pub timeframe: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PairQuery {
    pub x: String,
    pub y: String,
    pub timeframe: Option<String>,
    pub roll_window: Option<usize>,
    pub regression: Option<String>,
    pub min_volume: Option<f64>,
}

impl PairQuery {
    fn into_request(self, defaults: &AnalyticsSection) -> Result<AnalyticsRequest, ApiError> {
        let roll_window = self.roll_window.unwrap_or(defaults.default_roll_window);
        if roll_window == 0 {
            return Err(ApiError::BadRequest("roll_window must be > 0".to_string()));
        }
        let min_volume = self.min_volume.unwrap_or(defaults.default_min_volume);
        if !min_volume.is_finite() || min_volume < 0.0 {
            return Err(ApiError::BadRequest(format!(
                "min_volume must be >= 0, got {}",
                min_volume
            )));
        }
        if self.x.trim().is_empty() || self.y.trim().is_empty() {
            return Err(ApiError::BadRequest("x and y symbols are required".to_string()));
        }

        Ok(AnalyticsRequest {
            timeframe: parse_or(self.timeframe.as_deref(), defaults.default_timeframe)?,
            regression: parse_or(self.regression.as_deref(), defaults.default_regression)?,
            x_symbol: self.x,
            y_symbol: self.y,
            roll_window,
            min_volume,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct CorrMatrixQuery {
    /// Comma-separated symbol list
    pub symbols: String,
    pub timeframe: Option<String>,
    pub min_volume: Option<f64>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn list_symbols(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let symbols = state.store.symbols().await?;
    Ok(Json(json!({ "symbols": symbols })))
}

/// Resampled OHLCV bars for one symbol; an unknown symbol yields an empty list
pub async fn get_resampled(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<TimeframeQuery>,
) -> Result<Json<Value>, ApiError> {
    let timeframe = parse_or(query.timeframe.as_deref(), state.defaults.default_timeframe)?;
    let bars = match state.store.bars(&symbol, timeframe).await {
        Ok(bars) => bars,
        Err(BarSourceError::UnknownSymbol(_)) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    Ok(Json(json!({
        "symbol": symbol.to_lowercase(),
        "timeframe": timeframe,
        "data": bars,
    })))
}

pub async fn analytics_pair(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PairQuery>,
) -> Result<Response, ApiError> {
    let request = query.into_request(&state.defaults)?;

    let (x_bars, y_bars) = match fetch_pair(&*state.store, &request).await {
        Ok(bars) => bars,
        Err(BarSourceError::UnknownSymbol(symbol)) => {
            let body = ErrorReport::new(format!("no data for symbol '{}'", symbol), "no_data");
            return Ok(Json(body).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let orchestrator = Arc::clone(&state.orchestrator);
    let outcome =
        tokio::task::spawn_blocking(move || orchestrator.analyze(&request, &x_bars, &y_bars))
            .await?;

    Ok(match outcome {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            tracing::info!(error = %e, kind = e.kind(), "Pair analytics unavailable");
            Json(ErrorReport::from(&e)).into_response()
        }
    })
}

pub async fn analytics_corr_matrix(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CorrMatrixQuery>,
) -> Result<Response, ApiError> {
    let symbols: Vec<String> = query
        .symbols
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if symbols.len() < 2 {
        return Err(ApiError::BadRequest(
            "symbols must list at least 2 comma-separated symbols".to_string(),
        ));
    }
    let timeframe = parse_or(query.timeframe.as_deref(), state.defaults.default_timeframe)?;
    let min_volume = query.min_volume.unwrap_or(state.defaults.default_min_volume);

    let inputs = fetch_many(&*state.store, &symbols, timeframe).await?;
    let orchestrator = Arc::clone(&state.orchestrator);
    let outcome =
        tokio::task::spawn_blocking(move || orchestrator.correlation_matrix(&inputs, min_volume))
            .await?;

    Ok(match outcome {
        Ok(matrix) => Json(matrix).into_response(),
        Err(e) => Json(ErrorReport::from(&e)).into_response(),
    })
}

/// Load NDJSON ticks from the raw request body
pub async fn upload_ndjson(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<Value>, ApiError> {
    let loaded = state.store.load_ndjson(&body).await?;
    Ok(Json(json!({ "status": "ok", "loaded": loaded })))
}

pub async fn add_alert(
    State(state): State<Arc<AppState>>,
    Json(rule): Json<NewAlertRule>,
) -> Result<Json<AlertRule>, ApiError> {
    let stored = state.orchestrator.alerts().add_rule(rule)?;
    Ok(Json(stored))
}

pub async fn list_alerts(State(state): State<Arc<AppState>>) -> Json<Vec<AlertRule>> {
    Json(state.orchestrator.alerts().list_rules())
}

pub async fn remove_alert(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<Value>, ApiError> {
    match state.orchestrator.alerts().remove_rule(id) {
        Some(rule) => Ok(Json(json!({ "removed": true, "rule": rule }))),
        None => Err(ApiError::NotFound(format!("alert rule {}", id))),
    }
}

