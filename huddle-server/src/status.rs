use crate::signaling::SignalingService;
use axum::Json;
use axum::extract::State;
use huddle_core::{RelayStatus, RoomSnapshot};

/// `GET /status`
pub async fn status_handler(State(service): State<SignalingService>) -> Json<RelayStatus> {
    Json(service.status())
}

/// `GET /rooms`
pub async fn rooms_handler(State(service): State<SignalingService>) -> Json<Vec<RoomSnapshot>> {
    Json(service.directory().rooms())
}

/// `GET /health`
pub async fn health_handler() -> &'static str {
    "ok"
}
