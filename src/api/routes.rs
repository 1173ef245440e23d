use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;

#[derive(Clone)]
pub struct ApiState {
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    /// Size of the static universe, fixed at startup.
    pub instruments: usize,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub feed_connected: bool,
    pub instruments: usize,
    pub ticks_processed: u64,
    pub alerts_emitted: u64,
    pub alerts_dropped: u64,
    pub alerts_failed: u64,
    pub last_alert_at_ns: u64,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let snap = state.health.snapshot();
    Json(HealthResponse {
        feed_connected: snap.feed_connected,
        instruments: state.instruments,
        ticks_processed: snap.ticks_processed,
        alerts_emitted: snap.alerts_emitted,
        alerts_dropped: snap.alerts_dropped,
        alerts_failed: snap.alerts_failed,
        last_alert_at_ns: snap.last_alert_at_ns,
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let (p50, p95, p99) = state.latency.percentiles();
    Json(LatencyResponse {
        samples: state.latency.len(),
        p50_us: p50,
        p95_us: p95,
        p99_us: p99,
    })
}
