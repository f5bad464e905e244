use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attention::AlertSeverity;
use crate::room::models::StudentInfo;

/// Message types for WebSocket communication
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    // Client -> Server
    AttentionUpdate,
    CameraFrame,
    TeacherCameraFrame,
    ChatMessage,
    RequestUpdate,
    Heartbeat,
    HeartbeatAck,

    // Signaling (peer -> manager -> peer)
    Ready,
    Offer,
    Answer,
    IceCandidate,
    Stopped,
    #[serde(rename = "speaking-level")]
    SpeakingLevel,

    // Server -> Client
    RoomCreated,
    StudentJoin,
    StudentLeave,
    Alert,
    ClearAlert,
    RoomClosed,
    Error,
    TeacherFrame,
    StateUpdate,
    ParticipantList,
}

/// Base structure for WebSocket messages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Server-to-Client message payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomCreatedPayload {
    pub room_id: String,
    pub students: Vec<StudentInfo>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentPresencePayload {
    pub student_id: String,
    pub student_name: String,
    /// Full roster, only included in the copy sent to teachers so their view
    /// is reconcilable from the latest event alone.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub students: Option<Vec<StudentInfo>>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttentionUpdatePayload {
    pub student_id: String,
    pub student_name: String,
    pub status: String,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPayload {
    pub student_id: String,
    pub student_name: String,
    pub alert_type: String,
    pub message: String,
    pub severity: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearAlertPayload {
    pub student_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomClosedPayload {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraFramePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    pub frame: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessagePayload {
    pub user_id: String,
    pub user_name: String,
    pub user_type: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateUpdatePayload {
    pub students: Vec<StudentInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantListPayload {
    pub participants: Vec<Participant>,
}

/// Helper functions for creating messages
impl WebSocketMessage {
    pub fn new(message_type: MessageType, data: serde_json::Value) -> Self {
        Self { message_type, data }
    }

    /// Create a ROOM_CREATED message
    pub fn room_created(room_id: String, students: Vec<StudentInfo>) -> Self {
        let payload = RoomCreatedPayload {
            room_id,
            students,
            timestamp: Utc::now(),
        };
        Self::new(
            MessageType::RoomCreated,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a STUDENT_JOIN delta for the other students in the room
    pub fn student_join(student_id: String, student_name: String) -> Self {
        let payload = StudentPresencePayload {
            student_id,
            student_name,
            students: None,
            timestamp: Utc::now(),
        };
        Self::new(
            MessageType::StudentJoin,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a STUDENT_JOIN message with the full roster for teachers
    pub fn student_join_with_roster(
        student_id: String,
        student_name: String,
        students: Vec<StudentInfo>,
    ) -> Self {
        let payload = StudentPresencePayload {
            student_id,
            student_name,
            students: Some(students),
            timestamp: Utc::now(),
        };
        Self::new(
            MessageType::StudentJoin,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a STUDENT_LEAVE delta for the remaining students
    pub fn student_leave(student_id: String, student_name: String) -> Self {
        let payload = StudentPresencePayload {
            student_id,
            student_name,
            students: None,
            timestamp: Utc::now(),
        };
        Self::new(
            MessageType::StudentLeave,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a STUDENT_LEAVE message with the full roster for teachers
    pub fn student_leave_with_roster(
        student_id: String,
        student_name: String,
        students: Vec<StudentInfo>,
    ) -> Self {
        let payload = StudentPresencePayload {
            student_id,
            student_name,
            students: Some(students),
            timestamp: Utc::now(),
        };
        Self::new(
            MessageType::StudentLeave,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create an ATTENTION_UPDATE message
    pub fn attention_update(
        student_id: String,
        student_name: String,
        status: String,
        confidence: f64,
    ) -> Self {
        let payload = AttentionUpdatePayload {
            student_id,
            student_name,
            status,
            confidence,
            timestamp: Utc::now(),
        };
        Self::new(
            MessageType::AttentionUpdate,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create an ALERT message
    pub fn alert(
        student_id: String,
        student_name: String,
        alert_type: String,
        message: String,
        severity: AlertSeverity,
    ) -> Self {
        let payload = AlertPayload {
            student_id,
            student_name,
            alert_type,
            message,
            severity: severity.to_string(),
            timestamp: Utc::now(),
        };
        Self::new(MessageType::Alert, serde_json::to_value(payload).unwrap())
    }

    /// Create a CLEAR_ALERT message
    pub fn clear_alert(student_id: String) -> Self {
        let payload = ClearAlertPayload { student_id };
        Self::new(
            MessageType::ClearAlert,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a ROOM_CLOSED message
    pub fn room_closed() -> Self {
        let payload = RoomClosedPayload {
            message: "Teacher has ended the class".to_string(),
        };
        Self::new(
            MessageType::RoomClosed,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create an ERROR message
    pub fn error(message: String) -> Self {
        let payload = ErrorPayload { message };
        Self::new(MessageType::Error, serde_json::to_value(payload).unwrap())
    }

    /// Create a CAMERA_FRAME message relayed from a student to teachers
    pub fn camera_frame(student_id: String, frame: String) -> Self {
        let payload = CameraFramePayload {
            student_id: Some(student_id),
            frame,
            timestamp: Utc::now(),
        };
        Self::new(
            MessageType::CameraFrame,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a TEACHER_FRAME message relayed from the teacher to students
    pub fn teacher_frame(frame: String) -> Self {
        let payload = CameraFramePayload {
            student_id: None,
            frame,
            timestamp: Utc::now(),
        };
        Self::new(
            MessageType::TeacherFrame,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a CHAT_MESSAGE message
    pub fn chat_message(
        user_id: String,
        user_name: String,
        user_type: String,
        message: String,
    ) -> Self {
        let payload = ChatMessagePayload {
            user_id,
            user_name,
            user_type,
            message,
            timestamp: Utc::now(),
        };
        Self::new(
            MessageType::ChatMessage,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a HEARTBEAT probe
    pub fn heartbeat() -> Self {
        Self::new(MessageType::Heartbeat, serde_json::Value::Null)
    }

    /// Create a HEARTBEAT_ACK reply
    pub fn heartbeat_ack() -> Self {
        Self::new(MessageType::HeartbeatAck, serde_json::Value::Null)
    }

    /// Create a STATE_UPDATE message with the current roster
    pub fn state_update(students: Vec<StudentInfo>) -> Self {
        let payload = StateUpdatePayload { students };
        Self::new(
            MessageType::StateUpdate,
            serde_json::to_value(payload).unwrap(),
        )
    }

    /// Create a PARTICIPANT_LIST message for a newly joined student
    pub fn participant_list(participants: Vec<Participant>) -> Self {
        let payload = ParticipantListPayload { participants };
        Self::new(
            MessageType::ParticipantList,
            serde_json::to_value(payload).unwrap(),
        )
    }
}
