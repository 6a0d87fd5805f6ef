use std::sync::atomic::Ordering;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::state::AppState;

/// Fixed liveness response for external health checks.
pub async fn liveness() -> &'static str {
    "OK"
}

/// Structured status response.
#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub connections: usize,
    pub rooms: RoomInfo,
}

#[derive(Serialize)]
pub struct RoomInfo {
    pub active: usize,
    pub participants: usize,
}

/// Server status as JSON: connection count plus room/participant totals.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let connections = state.ws_connection_count.load(Ordering::Relaxed);
    let (active, participants) = {
        let rooms = state.rooms.read().await;
        rooms.stats()
    };

    Json(StatusResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        connections,
        rooms: RoomInfo {
            active,
            participants,
        },
    })
}
