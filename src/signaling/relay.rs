use std::sync::Arc;
use tracing::{debug, warn};

use crate::room::registry::RoomRegistry;
use crate::websockets::messages::{MessageType, WebSocketMessage};

/// Signaling message kinds the relay routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Ready,
    Offer,
    Answer,
    IceCandidate,
    Stopped,
    SpeakingLevel,
}

impl SignalKind {
    /// Maps a wire message type onto a signal kind, None for everything the
    /// relay does not handle.
    pub fn from_message_type(message_type: &MessageType) -> Option<Self> {
        match message_type {
            MessageType::Ready => Some(Self::Ready),
            MessageType::Offer => Some(Self::Offer),
            MessageType::Answer => Some(Self::Answer),
            MessageType::IceCandidate => Some(Self::IceCandidate),
            MessageType::Stopped => Some(Self::Stopped),
            MessageType::SpeakingLevel => Some(Self::SpeakingLevel),
            _ => None,
        }
    }

    /// Negotiation messages name a single recipient; presence and level
    /// updates go to the whole room.
    pub fn is_targeted(&self) -> bool {
        matches!(self, Self::Offer | Self::Answer | Self::IceCandidate)
    }
}

/// Point-to-point forwarding of negotiation messages over the identity index.
///
/// A pure routing layer: payloads pass through opaquely, with only the sender
/// identity stamped in so the recipient knows whom to answer. Undeliverable
/// targeted messages are dropped and logged, never queued or retried.
pub struct SignalingRelay {
    registry: Arc<RoomRegistry>,
}

impl SignalingRelay {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Routes one inbound signaling message from `sender_identity` in `code`.
    pub async fn route(
        &self,
        code: &str,
        sender_identity: &str,
        kind: SignalKind,
        mut message: WebSocketMessage,
    ) {
        if let Some(data) = message.data.as_object_mut() {
            data.insert(
                "from".to_string(),
                serde_json::Value::String(sender_identity.to_string()),
            );
        }

        if kind.is_targeted() {
            self.send_to_user(code, sender_identity, &message).await;
        } else {
            self.broadcast_to_room(code, sender_identity, &message).await;
        }
    }

    /// Delivers a targeted message to the identity named in `data.target`.
    async fn send_to_user(&self, code: &str, sender_identity: &str, message: &WebSocketMessage) {
        let Some(target) = message.data.get("target").and_then(|v| v.as_str()) else {
            warn!(
                room_code = %code,
                sender = %sender_identity,
                message_type = ?message.message_type,
                "Targeted signaling message without a target, dropped"
            );
            return;
        };

        let Some(handle) = self.registry.lookup_identity(target) else {
            debug!(
                room_code = %code,
                sender = %sender_identity,
                target = %target,
                "Signaling target has no live connection, dropped"
            );
            return;
        };

        if handle.send(message).is_err() {
            debug!(
                room_code = %code,
                target = %target,
                "Signaling target hung up mid-delivery, dropped"
            );
        }
    }

    /// Fans an untargeted message out to every other connection in the room.
    async fn broadcast_to_room(
        &self,
        code: &str,
        sender_identity: &str,
        message: &WebSocketMessage,
    ) {
        let targets = self.registry.signal_targets(code, sender_identity);
        let Ok(text) = serde_json::to_string(message) else {
            warn!(room_code = %code, "Failed to serialize signaling message");
            return;
        };

        for (identity, handle) in targets {
            if handle.send_raw(text.clone()).is_err() {
                debug!(room_code = %code, peer = %identity, "Signaling peer gone, skipped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::connection::{ClientHandle, OutboundFrame};
    use serde_json::json;
    use tokio::sync::mpsc;

    fn setup() -> (Arc<RoomRegistry>, SignalingRelay) {
        let registry = Arc::new(RoomRegistry::new());
        let relay = SignalingRelay::new(Arc::clone(&registry));
        (registry, relay)
    }

    fn recv_message(rx: &mut mpsc::UnboundedReceiver<OutboundFrame>) -> Option<WebSocketMessage> {
        match rx.try_recv() {
            Ok(OutboundFrame::Text(text)) => serde_json::from_str(&text).ok(),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_offer_is_delivered_to_target_only() {
        let (registry, relay) = setup();
        let (teacher, mut teacher_rx) = ClientHandle::channel();
        let session = registry.create_room("t", teacher).unwrap();
        let (alice, mut alice_rx) = ClientHandle::channel();
        let (bob, mut bob_rx) = ClientHandle::channel();
        registry.add_student(&session.code, "alice", "Alice", alice);
        registry.add_student(&session.code, "bob", "Bob", bob);

        let message = WebSocketMessage::new(
            MessageType::Offer,
            json!({"target": "bob", "sdp": "v=0..."}),
        );
        relay
            .route(&session.code, "alice", SignalKind::Offer, message)
            .await;

        let delivered = recv_message(&mut bob_rx).expect("bob should receive the offer");
        assert!(matches!(delivered.message_type, MessageType::Offer));
        assert_eq!(delivered.data["from"], "alice");
        assert_eq!(delivered.data["sdp"], "v=0...");

        assert!(recv_message(&mut alice_rx).is_none());
        assert!(recv_message(&mut teacher_rx).is_none());
    }

    #[tokio::test]
    async fn test_answer_reaches_teacher_identity() {
        let (registry, relay) = setup();
        let (teacher, mut teacher_rx) = ClientHandle::channel();
        let session = registry.create_room("t", teacher).unwrap();
        let (alice, _alice_rx) = ClientHandle::channel();
        registry.add_student(&session.code, "alice", "Alice", alice);

        let message = WebSocketMessage::new(
            MessageType::Answer,
            json!({"target": session.identity, "sdp": "answer"}),
        );
        relay
            .route(&session.code, "alice", SignalKind::Answer, message)
            .await;

        let delivered = recv_message(&mut teacher_rx).expect("teacher should receive the answer");
        assert!(matches!(delivered.message_type, MessageType::Answer));
        assert_eq!(delivered.data["from"], "alice");
    }

    #[tokio::test]
    async fn test_stale_target_is_dropped_silently() {
        let (registry, relay) = setup();
        let (teacher, mut teacher_rx) = ClientHandle::channel();
        let session = registry.create_room("t", teacher).unwrap();

        let message = WebSocketMessage::new(
            MessageType::IceCandidate,
            json!({"target": "long-gone", "candidate": "..."}),
        );
        relay
            .route(&session.code, &session.identity, SignalKind::IceCandidate, message)
            .await;

        assert!(recv_message(&mut teacher_rx).is_none());
    }

    #[tokio::test]
    async fn test_ready_broadcasts_to_everyone_but_sender() {
        let (registry, relay) = setup();
        let (teacher, mut teacher_rx) = ClientHandle::channel();
        let session = registry.create_room("t", teacher).unwrap();
        let (alice, mut alice_rx) = ClientHandle::channel();
        let (bob, mut bob_rx) = ClientHandle::channel();
        registry.add_student(&session.code, "alice", "Alice", alice);
        registry.add_student(&session.code, "bob", "Bob", bob);

        let message = WebSocketMessage::new(MessageType::Ready, json!({}));
        relay
            .route(&session.code, "alice", SignalKind::Ready, message)
            .await;

        assert!(recv_message(&mut alice_rx).is_none());
        for rx in [&mut teacher_rx, &mut bob_rx] {
            let delivered = recv_message(rx).expect("peers should receive ready");
            assert!(matches!(delivered.message_type, MessageType::Ready));
            assert_eq!(delivered.data["from"], "alice");
        }
    }

    #[test]
    fn test_signal_kind_classification() {
        assert!(SignalKind::Offer.is_targeted());
        assert!(SignalKind::Answer.is_targeted());
        assert!(SignalKind::IceCandidate.is_targeted());
        assert!(!SignalKind::Ready.is_targeted());
        assert!(!SignalKind::Stopped.is_targeted());
        assert!(!SignalKind::SpeakingLevel.is_targeted());

        assert_eq!(
            SignalKind::from_message_type(&MessageType::SpeakingLevel),
            Some(SignalKind::SpeakingLevel)
        );
        assert_eq!(SignalKind::from_message_type(&MessageType::ChatMessage), None);
    }
}
