//! HTTP/JSON API Layer
//!
//! ## Architecture
//! ```text
//! Game client
//!       ↓ HTTP POST, JSON body          ↓ WebSocket
//! Axum Router ─────────────────────────────────────
//!       ↓                               ↓
//! RaidService commands            EventHub subscription
//!       ↓
//! RaidRegistry (per-raid mutex) → raid channel
//! ```
//!
//! ## Endpoint Convention
//! Commands follow the path pattern `POST /raid.<Service>/<Method>`.
//! Example: `POST /raid.RaidService/StartBattle`

pub mod raid;

use axum::{extract::State, middleware, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::metrics::RaidMetrics;
use crate::service::RaidService;

/// Shared state available to all API handlers
#[derive(Clone)]
pub struct ApiState {
    pub service: RaidService,
    /// Server-wide metrics (lock-free atomics)
    pub metrics: Arc<RaidMetrics>,
}

impl ApiState {
    pub fn new(service: RaidService) -> Self {
        let metrics = Arc::clone(&service.metrics);
        Self { service, metrics }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    raids: usize,
}

async fn health_check(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        raids: state.service.registry.len(),
    })
}

/// Build the full API router with all service endpoints
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(crate::metrics::prometheus_handler))
        .route("/metrics/json", get(crate::metrics::json_metrics_handler))
        .merge(raid::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
pub async fn start_api_server<F>(
    service: RaidService,
    addr: &str,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let app = build_router(ApiState::new(service));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
