use tokio::sync::mpsc;

use crate::websockets::messages::WebSocketMessage;

/// Close code sent when a student targets a room that does not exist or has
/// no active teacher.
pub const CLOSE_ROOM_NOT_FOUND: u16 = 4004;
/// Close code sent to students when the last teacher leaves and the room is
/// torn down.
pub const CLOSE_ROOM_CLOSED: u16 = 4003;
/// Close code sent when a student identity is already connected to the room.
pub const CLOSE_DUPLICATE_IDENTITY: u16 = 4005;

/// Frame queued for delivery to a single client connection.
///
/// The socket pump owns the actual WebSocket; everything else talks to a
/// connection exclusively through these frames.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    Close { code: u16, reason: &'static str },
}

/// The peer's socket pump has terminated and will never drain its queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerGone;

/// Handle to a live client connection.
///
/// Cloneable sender half of the connection's outbound channel. Sends never
/// block; a failed send means the receiving pump is gone and the peer must be
/// treated as disconnected.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl ClientHandle {
    pub fn new(tx: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        Self { tx }
    }

    /// Creates a handle together with the receiver half for the socket pump.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Queues a pre-serialized frame. Broadcast paths serialize once and fan
    /// out the same text to every recipient.
    pub fn send_raw(&self, text: String) -> Result<(), PeerGone> {
        self.tx.send(OutboundFrame::Text(text)).map_err(|_| PeerGone)
    }

    /// Serializes and queues a single message.
    pub fn send(&self, message: &WebSocketMessage) -> Result<(), PeerGone> {
        let text = serde_json::to_string(message).map_err(|_| PeerGone)?;
        self.send_raw(text)
    }

    /// Asks the socket pump to close the connection with the given code.
    pub fn close(&self, code: u16, reason: &'static str) {
        // The pump may already be gone; nothing left to close in that case.
        let _ = self.tx.send(OutboundFrame::Close { code, reason });
    }
}
