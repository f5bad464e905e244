use async_trait::async_trait;
use axum::{
    extract::{ws::WebSocket, Path, Query, State, WebSocketUpgrade},
    response::Response,
};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::attention::AttentionStatus;
use crate::room::connection::{ClientHandle, CLOSE_ROOM_NOT_FOUND};
use crate::room::registry::TeacherSession;
use crate::shared::AppState;
use crate::signaling::SignalKind;
use crate::websockets::messages::{MessageType, WebSocketMessage};
use crate::websockets::socket::{Connection, MessageHandler, SocketWrapper};

#[derive(Debug, Deserialize)]
pub struct TeacherConnectQuery {
    /// Accepted for forward compatibility; every connect creates a fresh
    /// room regardless.
    pub room_id: Option<String>,
    #[serde(default = "default_teacher_name")]
    pub name: String,
}

fn default_teacher_name() -> String {
    "Teacher".to_string()
}

#[derive(Debug, Deserialize)]
pub struct StudentConnectQuery {
    pub name: String,
}

/// WebSocket endpoint for teachers
/// GET /ws/teacher?name=...
pub async fn teacher_websocket(
    ws: WebSocketUpgrade,
    Query(query): Query<TeacherConnectQuery>,
    State(state): State<AppState>,
) -> Response {
    info!(teacher_name = %query.name, "Teacher WebSocket connection requested");
    ws.on_upgrade(move |socket| run_teacher_connection(socket, query, state))
}

async fn run_teacher_connection(mut socket: WebSocket, query: TeacherConnectQuery, state: AppState) {
    if let Some(requested) = &query.room_id {
        debug!(room_code = %requested, "Requested room code ignored; teacher connects always create a fresh room");
    }

    let (handle, outbound_receiver) = ClientHandle::channel();
    let session = match state
        .classroom
        .connect_teacher(&query.name, handle.clone())
        .await
    {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Teacher connect failed");
            let error = WebSocketMessage::error(e.to_string());
            if let Ok(text) = serde_json::to_string(&error) {
                let _ = socket.send_text(text).await;
            }
            let _ = socket.send_close(1013, "Service unavailable").await;
            return;
        }
    };

    info!(
        room_code = %session.code,
        teacher_name = %query.name,
        "Teacher connection established"
    );

    let message_handler = Arc::new(TeacherSocketHandler {
        state: state.clone(),
        session: session.clone(),
        teacher_name: query.name,
        handle,
    });

    let connection = Connection::new(
        Box::new(socket),
        outbound_receiver,
        message_handler,
        Some(state.config.heartbeat_interval),
    );

    match connection.run().await {
        Ok(()) => info!(room_code = %session.code, "Teacher connection closed cleanly"),
        Err(e) => warn!(room_code = %session.code, error = ?e, "Teacher connection error"),
    }

    // Every exit path funnels here, and the disconnect is idempotent, so
    // room state never diverges from actual connectivity.
    state.classroom.disconnect_teacher(session.teacher_id).await;
}

/// Message handler for one teacher connection
struct TeacherSocketHandler {
    state: AppState,
    session: TeacherSession,
    teacher_name: String,
    handle: ClientHandle,
}

#[async_trait]
impl MessageHandler for TeacherSocketHandler {
    async fn handle_message(&self, message: String) {
        let parsed = match serde_json::from_str::<WebSocketMessage>(&message) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(
                    room_code = %self.session.code,
                    error = %e,
                    "Malformed teacher message, closing connection"
                );
                // A malformed frame is a connection fault: close and let the
                // pump exit route through the disconnect path.
                self.handle.close(1003, "Malformed message");
                return;
            }
        };

        if let Some(kind) = SignalKind::from_message_type(&parsed.message_type) {
            self.state
                .relay
                .route(&self.session.code, &self.session.identity, kind, parsed)
                .await;
            return;
        }

        match parsed.message_type {
            MessageType::Heartbeat => {
                let _ = self.handle.send(&WebSocketMessage::heartbeat_ack());
            }
            MessageType::HeartbeatAck => {}
            MessageType::TeacherCameraFrame => {
                if let Some(frame) = parsed.data.get("frame").and_then(|v| v.as_str()) {
                    self.state
                        .classroom
                        .broadcast_teacher_frame(&self.session.code, frame.to_string())
                        .await;
                }
            }
            MessageType::RequestUpdate => {
                let students = self
                    .state
                    .classroom
                    .roster(&self.session.code)
                    .await
                    .unwrap_or_default();
                let _ = self.handle.send(&WebSocketMessage::state_update(students));
            }
            MessageType::ChatMessage => {
                if let Some(text) = parsed.data.get("message").and_then(|v| v.as_str()) {
                    self.state
                        .classroom
                        .broadcast_chat(&self.session.code, "teacher", &self.teacher_name, "teacher", text)
                        .await;
                }
            }
            other => {
                debug!(message_type = ?other, "Unhandled teacher message type");
            }
        }
    }
}

/// WebSocket endpoint for students
/// GET /ws/student/{room_id}/{student_id}?name=...
pub async fn student_websocket(
    ws: WebSocketUpgrade,
    Path((room_id, student_id)): Path<(String, String)>,
    Query(query): Query<StudentConnectQuery>,
    State(state): State<AppState>,
) -> Response {
    info!(
        room_code = %room_id,
        student_id = %student_id,
        student_name = %query.name,
        "Student WebSocket connection requested"
    );
    ws.on_upgrade(move |socket| {
        run_student_connection(socket, room_id, student_id, query.name, state)
    })
}

async fn run_student_connection(
    mut socket: WebSocket,
    room_id: String,
    student_id: String,
    student_name: String,
    state: AppState,
) {
    // Admission check before any registration work.
    if !state.classroom.room_exists(&room_id).await {
        warn!(
            room_code = %room_id,
            student_name = %student_name,
            "Student tried to join a room that does not exist"
        );
        let error = WebSocketMessage::error(format!(
            "Room {} does not exist. Please check the room code.",
            room_id
        ));
        if let Ok(text) = serde_json::to_string(&error) {
            let _ = socket.send_text(text).await;
        }
        let _ = socket.send_close(CLOSE_ROOM_NOT_FOUND, "Room not found").await;
        return;
    }

    let (handle, outbound_receiver) = ClientHandle::channel();
    let joined = state
        .classroom
        .connect_student(&room_id, &student_id, &student_name, handle.clone())
        .await;

    if joined {
        let participants = state.classroom.participants(&room_id).await;
        let _ = handle.send(&WebSocketMessage::participant_list(participants));
    }

    let message_handler = Arc::new(StudentSocketHandler {
        state: state.clone(),
        room_id: room_id.clone(),
        student_id: student_id.clone(),
        student_name,
        handle,
    });

    // A rejected connect still runs the pump: it flushes the queued error
    // and close frames, then exits on the close.
    let connection = Connection::new(Box::new(socket), outbound_receiver, message_handler, None);
    match connection.run().await {
        Ok(()) => {
            info!(room_code = %room_id, student_id = %student_id, "Student connection closed cleanly")
        }
        Err(e) => {
            warn!(room_code = %room_id, student_id = %student_id, error = ?e, "Student connection error")
        }
    }

    // Membership first, then the attention machine, so a reconnect under the
    // same identity starts from a clean alert state.
    state.classroom.disconnect_student(&room_id, &student_id).await;
    state.monitor.reset(&student_id);
}

/// Message handler for one student connection
struct StudentSocketHandler {
    state: AppState,
    room_id: String,
    student_id: String,
    student_name: String,
    handle: ClientHandle,
}

#[async_trait]
impl MessageHandler for StudentSocketHandler {
    async fn handle_message(&self, message: String) {
        let parsed = match serde_json::from_str::<WebSocketMessage>(&message) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(
                    room_code = %self.room_id,
                    student_id = %self.student_id,
                    error = %e,
                    "Malformed student message, closing connection"
                );
                self.handle.close(1003, "Malformed message");
                return;
            }
        };

        if let Some(kind) = SignalKind::from_message_type(&parsed.message_type) {
            self.state
                .relay
                .route(&self.room_id, &self.student_id, kind, parsed)
                .await;
            return;
        }

        match parsed.message_type {
            MessageType::AttentionUpdate => {
                let raw_status = parsed
                    .data
                    .get("status")
                    .and_then(|v| v.as_str())
                    .unwrap_or("attentive");
                let confidence = parsed
                    .data
                    .get("confidence")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(1.0);
                // Parsing is total: unknown statuses become deviations.
                let status = AttentionStatus::from_str(raw_status)
                    .unwrap_or_else(|_| AttentionStatus::Other(raw_status.to_string()));

                self.state
                    .classroom
                    .update_attention(&self.room_id, &self.student_id, raw_status, confidence)
                    .await;

                if let Some(transition) =
                    self.state
                        .monitor
                        .observe(&self.student_id, &self.student_name, &status)
                {
                    self.state
                        .classroom
                        .notify_alert(&self.room_id, &self.student_id, transition)
                        .await;
                }
            }
            MessageType::CameraFrame => {
                if let Some(frame) = parsed.data.get("frame").and_then(|v| v.as_str()) {
                    self.state
                        .classroom
                        .broadcast_camera_frame(&self.room_id, &self.student_id, frame.to_string())
                        .await;
                }
            }
            MessageType::ChatMessage => {
                if let Some(text) = parsed.data.get("message").and_then(|v| v.as_str()) {
                    self.state
                        .classroom
                        .broadcast_chat(
                            &self.room_id,
                            &self.student_id,
                            &self.student_name,
                            "student",
                            text,
                        )
                        .await;
                }
            }
            MessageType::Heartbeat => {
                let _ = self.handle.send(&WebSocketMessage::heartbeat_ack());
            }
            MessageType::HeartbeatAck => {}
            other => {
                debug!(message_type = ?other, "Unhandled student message type");
            }
        }
    }
}
