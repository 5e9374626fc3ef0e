//! HTTP API
//!
//! JSON endpoints over the tick store, the analytics orchestrator and the
//! alert registry. Pair and matrix computations run on the blocking pool.

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::adapters::memory_store::InMemoryBarStore;
use crate::application::AnalyticsOrchestrator;
use crate::config::AnalyticsSection;

pub mod error;
pub mod handlers;

pub use error::ApiError;

/// NDJSON uploads can be large
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Shared state handed to every handler
pub struct AppState {
    pub store: Arc<InMemoryBarStore>,
    pub orchestrator: Arc<AnalyticsOrchestrator>,
    /// Fallbacks for query parameters a request leaves out
    pub defaults: AnalyticsSection,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any());

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/symbols", get(handlers::list_symbols))
        .route("/api/resampled/:symbol", get(handlers::get_resampled))
        .route("/api/analytics/pair", get(handlers::analytics_pair))
        .route("/api/analytics/corr_matrix", get(handlers::analytics_corr_matrix))
        .route("/api/upload_ndjson", post(handlers::upload_ndjson))
        .route(
            "/api/alerts",
            get(handlers::list_alerts).post(handlers::add_alert),
        )
        .route("/api/alerts/:id", delete(handlers::remove_alert))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

pub async fn run_server(addr: SocketAddr, state: Arc<AppState>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Spreadwatch API listening on http://{}", addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::warn!("Cannot listen for Ctrl+C ({}), running until killed", e);
            std::future::pending::<()>().await;
        }
    }
}
