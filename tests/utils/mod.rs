use tokio::sync::mpsc;

use classlive::room::connection::{ClientHandle, OutboundFrame};
use classlive::room::registry::TeacherSession;
use classlive::{AppState, MessageType, ServerConfig, WebSocketMessage};

// ============================================================================
// Test Infrastructure
// ============================================================================

/// A fake connected peer: the manager-facing handle plus the receiver half a
/// socket pump would drain, so tests can assert on everything the peer was
/// sent.
pub struct TestClient {
    pub handle: ClientHandle,
    rx: mpsc::UnboundedReceiver<OutboundFrame>,
}

impl Default for TestClient {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClient {
    pub fn new() -> Self {
        let (handle, rx) = ClientHandle::channel();
        Self { handle, rx }
    }

    /// Drains every queued frame.
    pub fn frames(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Drains queued frames and parses the text ones.
    pub fn messages(&mut self) -> Vec<WebSocketMessage> {
        self.frames()
            .into_iter()
            .filter_map(|frame| match frame {
                OutboundFrame::Text(text) => serde_json::from_str(&text).ok(),
                OutboundFrame::Close { .. } => None,
            })
            .collect()
    }

    /// Drains and returns the single queued message, failing on silence or
    /// chatter.
    pub fn expect_one(&mut self, expected: MessageType) -> WebSocketMessage {
        let mut messages = self.messages();
        assert_eq!(
            messages.len(),
            1,
            "expected exactly one {:?}, got {:?}",
            expected,
            messages
        );
        let message = messages.remove(0);
        assert_eq!(message.message_type, expected);
        message
    }

    /// Asserts nothing was queued for this peer.
    pub fn assert_silent(&mut self) {
        let messages = self.messages();
        assert!(messages.is_empty(), "expected silence, got {:?}", messages);
    }
}

/// Finds the close frame in a drained frame list.
pub fn close_frame(frames: &[OutboundFrame]) -> Option<(u16, &'static str)> {
    frames.iter().find_map(|frame| match frame {
        OutboundFrame::Close { code, reason } => Some((*code, *reason)),
        OutboundFrame::Text(_) => None,
    })
}

pub fn test_state() -> AppState {
    AppState::new(ServerConfig::default())
}

/// Connects a teacher and drains the `room_created` greeting.
pub async fn connect_teacher(state: &AppState, name: &str) -> (TestClient, TeacherSession) {
    let mut client = TestClient::new();
    let session = state
        .classroom
        .connect_teacher(name, client.handle.clone())
        .await
        .expect("teacher connect should succeed");
    client.expect_one(MessageType::RoomCreated);
    (client, session)
}

/// Connects a student and asserts the join was accepted.
pub async fn connect_student(
    state: &AppState,
    code: &str,
    student_id: &str,
    name: &str,
) -> TestClient {
    let client = TestClient::new();
    let joined = state
        .classroom
        .connect_student(code, student_id, name, client.handle.clone())
        .await;
    assert!(joined, "student {} should be able to join {}", name, code);
    client
}

/// Feeds one attention report through the same pipeline the student socket
/// handler uses: record the update, run the alert machine, forward any
/// transition.
pub async fn report_attention(state: &AppState, code: &str, student_id: &str, name: &str, status: &str) {
    use std::str::FromStr;

    let parsed = classlive::AttentionStatus::from_str(status)
        .unwrap_or_else(|_| classlive::AttentionStatus::Other(status.to_string()));

    state
        .classroom
        .update_attention(code, student_id, status, 1.0)
        .await;
    if let Some(transition) = state.monitor.observe(student_id, name, &parsed) {
        state.classroom.notify_alert(code, student_id, transition).await;
    }
}
