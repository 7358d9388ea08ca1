use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::state::AppState;

/// Structured health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: ConnectionInfo,
    pub rooms: RoomInfo,
}

#[derive(Serialize)]
pub struct ConnectionInfo {
    pub sse: usize,
}

#[derive(Serialize)]
pub struct RoomInfo {
    pub active: usize,
    pub subscribers: usize,
    pub timers: usize,
}

/// Liveness plus connection and room counts.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let sse = state.sse_subscriber_count.load(Ordering::Relaxed);
    let (active, subscribers, timers) = state.rooms.stats();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections: ConnectionInfo { sse },
        rooms: RoomInfo {
            active,
            subscribers,
            timers,
        },
    })
}

/// Readiness: the store answers a lookup.
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match state.store.room_exists("readiness-probe-room").await {
        Ok(_) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, "not ready: store unavailable")
        },
    }
}
