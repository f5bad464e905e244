use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::attention::AttentionMonitor;
use crate::config::ServerConfig;
use crate::room::registry::RoomRegistry;
use crate::room::service::ClassroomService;
use crate::signaling::SignalingRelay;

/// Shared application state containing all dependencies
///
/// Constructed fresh per process (and per test); nothing in here is a hidden
/// singleton. The classroom service and the signaling relay share one room
/// registry.
#[derive(Clone)]
pub struct AppState {
    pub classroom: Arc<ClassroomService>,
    pub monitor: Arc<AttentionMonitor>,
    pub relay: Arc<SignalingRelay>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(RoomRegistry::new());
        Self {
            classroom: Arc::new(ClassroomService::new(Arc::clone(&registry))),
            monitor: Arc::new(AttentionMonitor::new()),
            relay: Arc::new(SignalingRelay::new(registry)),
            config: Arc::new(config),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    #[error("Unable to generate a unique room code")]
    CodeSpaceExhausted,

    #[error("Internal server error")]
    Internal,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::RoomNotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::CodeSpaceExhausted => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Unable to generate a unique room code".to_string(),
            ),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_error_status_mapping() {
        let response = AppError::RoomNotFound("ABCDEF".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::CodeSpaceExhausted.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = AppError::Internal.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
