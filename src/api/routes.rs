//! Health and Stats Routes
//!
//! Monitoring endpoints for the fan-out server.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health - Full health status
//! - GET /stats - Room and connection counters

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::state::AppState;

/// Full health status response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub connections: usize,
    pub rooms: usize,
}

/// Room and connection statistics response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub connections: usize,
    pub room_count: usize,
    pub total_subscriptions: usize,
    pub rooms: HashMap<String, usize>,
}

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health
///
/// Full health status with connection and room counts.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let room_stats = state.rooms.stats().await;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        connections: state.registry.connection_count().await,
        rooms: room_stats.room_count,
    })
}

/// GET /stats
///
/// Current room membership and connection counters, mainly for
/// dashboards and debugging.
pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let room_stats = state.rooms.stats().await;

    Json(StatsResponse {
        connections: state.registry.connection_count().await,
        room_count: room_stats.room_count,
        total_subscriptions: room_stats.total_subscriptions,
        rooms: room_stats.rooms,
    })
}
