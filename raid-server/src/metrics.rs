//! Server Metrics - request and raid counters with Prometheus + JSON export
//!
//! Uses lock-free atomics for all counters.
//!
//! ## Endpoints
//! - `GET /metrics` - Prometheus text format
//! - `GET /metrics/json` - JSON format

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::api::ApiState;

/// Shared metrics state (all lock-free atomics)
#[derive(Debug)]
pub struct RaidMetrics {
    /// Total HTTP requests served
    pub total_requests: AtomicU64,
    /// Total request errors (4xx + 5xx)
    pub total_errors: AtomicU64,
    /// Cumulative request duration in microseconds
    pub total_duration_us: AtomicU64,
    /// Tick driver iterations
    pub ticks: AtomicU64,
    /// Raids currently resident and running
    pub active_raids: AtomicU64,
    pub boss_actions: AtomicU64,
    pub raids_finished: AtomicU64,
    pub start_time: Instant,
}

impl Default for RaidMetrics {
    fn default() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            total_duration_us: AtomicU64::new(0),
            ticks: AtomicU64::new(0),
            active_raids: AtomicU64::new(0),
            boss_actions: AtomicU64::new(0),
            raids_finished: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }
}

impl RaidMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_request(&self, duration_us: u64, is_error: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_duration_us.fetch_add(duration_us, Ordering::Relaxed);
        if is_error {
            self.total_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_tick(&self, active_raids: usize) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        self.active_raids.store(active_raids as u64, Ordering::Relaxed);
    }

    pub fn record_boss_action(&self) {
        self.boss_actions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_raid_finished(&self) {
        self.raids_finished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn avg_duration_ms(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        let dur_us = self.total_duration_us.load(Ordering::Relaxed);
        if total > 0 {
            (dur_us as f64 / total as f64) / 1000.0
        } else {
            0.0
        }
    }
}

// ============================================================================
// Axum Middleware
// ============================================================================

/// Records request count and duration for every HTTP request.
pub async fn metrics_middleware(
    State(state): State<ApiState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let resp = next.run(req).await;
    let duration_us = start.elapsed().as_micros() as u64;
    let is_error = resp.status().is_client_error() || resp.status().is_server_error();

    state.metrics.record_request(duration_us, is_error);
    resp
}

// ============================================================================
// GET /metrics
// ============================================================================

pub async fn prometheus_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let m = &state.metrics;
    let total_requests = m.total_requests.load(Ordering::Relaxed);
    let total_errors = m.total_errors.load(Ordering::Relaxed);
    let ticks = m.ticks.load(Ordering::Relaxed);
    let active = m.active_raids.load(Ordering::Relaxed);
    let boss_actions = m.boss_actions.load(Ordering::Relaxed);
    let finished = m.raids_finished.load(Ordering::Relaxed);
    let uptime = m.uptime_secs();
    let avg_req_duration_s = m.avg_duration_ms() / 1000.0;

    let body = format!(
        "# HELP raid_requests_total Total HTTP requests served\n\
         # TYPE raid_requests_total counter\n\
         raid_requests_total {total_requests}\n\
         \n\
         # HELP raid_request_errors_total Total HTTP request errors (4xx/5xx)\n\
         # TYPE raid_request_errors_total counter\n\
         raid_request_errors_total {total_errors}\n\
         \n\
         # HELP raid_request_duration_seconds Average request duration\n\
         # TYPE raid_request_duration_seconds gauge\n\
         raid_request_duration_seconds {avg_req_duration_s:.6}\n\
         \n\
         # HELP raid_tick_total Tick driver iterations\n\
         # TYPE raid_tick_total counter\n\
         raid_tick_total {ticks}\n\
         \n\
         # HELP raid_active Raids currently running\n\
         # TYPE raid_active gauge\n\
         raid_active {active}\n\
         \n\
         # HELP raid_boss_actions_total Boss actions dispatched\n\
         # TYPE raid_boss_actions_total counter\n\
         raid_boss_actions_total {boss_actions}\n\
         \n\
         # HELP raid_finished_total Raids that reached an outcome\n\
         # TYPE raid_finished_total counter\n\
         raid_finished_total {finished}\n\
         \n\
         # HELP raid_uptime_seconds Server uptime\n\
         # TYPE raid_uptime_seconds gauge\n\
         raid_uptime_seconds {uptime:.2}\n",
    );

    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

// ============================================================================
// GET /metrics/json
// ============================================================================

#[derive(Serialize)]
pub struct JsonMetrics {
    pub uptime_secs: f64,
    pub total_requests: u64,
    pub total_errors: u64,
    pub avg_request_duration_ms: f64,
    pub ticks: u64,
    pub active_raids: u64,
    pub boss_actions: u64,
    pub raids_finished: u64,
}

pub async fn json_metrics_handler(State(state): State<ApiState>) -> Json<JsonMetrics> {
    let m = &state.metrics;
    Json(JsonMetrics {
        uptime_secs: m.uptime_secs(),
        total_requests: m.total_requests.load(Ordering::Relaxed),
        total_errors: m.total_errors.load(Ordering::Relaxed),
        avg_request_duration_ms: m.avg_duration_ms(),
        ticks: m.ticks.load(Ordering::Relaxed),
        active_raids: m.active_raids.load(Ordering::Relaxed),
        boss_actions: m.boss_actions.load(Ordering::Relaxed),
        raids_finished: m.raids_finished.load(Ordering::Relaxed),
    })
}
