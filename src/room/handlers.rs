use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::shared::AppState;

/// Response for the service banner at `/`
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceInfoResponse {
    pub message: String,
    pub version: String,
    pub status: String,
    pub active_rooms: usize,
    pub timestamp: DateTime<Utc>,
}

/// Response for `/health`
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub rooms: usize,
    pub total_students: usize,
    pub timestamp: DateTime<Utc>,
}

/// Response for `/room/{room_id}/exists`
#[derive(Debug, Serialize, Deserialize)]
pub struct RoomExistsResponse {
    pub exists: bool,
    pub room_id: String,
    pub timestamp: DateTime<Utc>,
}

/// HTTP handler for the service banner
///
/// GET /
#[instrument(name = "service_info", skip(state))]
pub async fn service_info(State(state): State<AppState>) -> Json<ServiceInfoResponse> {
    let stats = state.classroom.stats().await;

    Json(ServiceInfoResponse {
        message: "Classlive real-time classroom API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "running".to_string(),
        active_rooms: stats.rooms,
        timestamp: Utc::now(),
    })
}

/// HTTP handler for the health check
///
/// GET /health
/// Side-effect-free read of the room table
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let stats = state.classroom.stats().await;

    Json(HealthResponse {
        status: "healthy".to_string(),
        rooms: stats.rooms,
        total_students: stats.students,
        timestamp: Utc::now(),
    })
}

/// HTTP handler answering whether a room is joinable
///
/// GET /room/{room_id}/exists
#[instrument(name = "room_exists", skip(state))]
pub async fn room_exists(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
) -> Json<RoomExistsResponse> {
    let exists = state.classroom.room_exists(&room_id).await;
    debug!(room_code = %room_id, exists, "Room existence check");

    Json(RoomExistsResponse {
        exists,
        room_id,
        timestamp: Utc::now(),
    })
}
