use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval};

use crate::room::connection::OutboundFrame;
use crate::websockets::messages::WebSocketMessage;

/// Simple WebSocket abstraction - all we care about is send/receive/close
#[async_trait]
pub trait SocketWrapper: Send {
    /// Send a text message to the client
    async fn send_text(&mut self, message: String) -> Result<(), SocketError>;

    /// Close the connection with an application close code
    async fn send_close(&mut self, code: u16, reason: &'static str) -> Result<(), SocketError>;

    /// Receive the next message from the client (None if connection closed)
    async fn receive_message(&mut self) -> Result<Option<String>, SocketError>;
}

/// Handler for incoming WebSocket messages
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle an incoming message from the client
    async fn handle_message(&self, message: String);
}

#[derive(Debug)]
pub enum SocketError {
    SendFailed(String),
    ReceiveFailed(String),
}

/// Direct implementation on axum's WebSocket
#[async_trait]
impl SocketWrapper for WebSocket {
    async fn send_text(&mut self, message: String) -> Result<(), SocketError> {
        self.send(Message::Text(message))
            .await
            .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn send_close(&mut self, code: u16, reason: &'static str) -> Result<(), SocketError> {
        self.send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(|e| SocketError::SendFailed(e.to_string()))
    }

    async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
        match self.next().await {
            Some(Ok(Message::Text(text))) => Ok(Some(text)),
            Some(Ok(Message::Close(_))) => Ok(None),
            Some(Ok(_)) => Ok(None), // Ignore binary/ping/pong
            Some(Err(e)) => Err(SocketError::ReceiveFailed(e.to_string())),
            None => Ok(None), // Connection closed
        }
    }
}

/// Connection pumps one client's WebSocket until disconnect.
///
/// Frames queued by the manager arrive on the outbound receiver; inbound
/// client messages go to the message handler. Handling is strictly
/// sequential per connection, so one client's messages are never reordered
/// or processed concurrently with each other.
pub struct Connection {
    socket: Box<dyn SocketWrapper>,
    outbound_receiver: mpsc::UnboundedReceiver<OutboundFrame>,
    message_handler: Arc<dyn MessageHandler>,
    /// Keep-alive probe period; None disables probing (student sockets).
    heartbeat: Option<Duration>,
}

impl Connection {
    pub fn new(
        socket: Box<dyn SocketWrapper>,
        outbound_receiver: mpsc::UnboundedReceiver<OutboundFrame>,
        message_handler: Arc<dyn MessageHandler>,
        heartbeat: Option<Duration>,
    ) -> Self {
        Self {
            socket,
            outbound_receiver,
            message_handler,
            heartbeat,
        }
    }

    /// Run the connection - handles sending, receiving, and keep-alive
    /// probing until disconnect. The probe lives inside this select loop, so
    /// it is cancelled with the pump on every exit path.
    pub async fn run(mut self) -> Result<(), SocketError> {
        let mut probe = self
            .heartbeat
            .map(|period| interval_at(Instant::now() + period, period));

        loop {
            tokio::select! {
                // Handle outbound frames (from our app to client)
                frame = self.outbound_receiver.recv() => {
                    match frame {
                        Some(OutboundFrame::Text(message)) => {
                            self.socket.send_text(message).await?
                        }
                        Some(OutboundFrame::Close { code, reason }) => {
                            // Manager-initiated close; skip the generic close below.
                            let _ = self.socket.send_close(code, reason).await;
                            return Ok(());
                        }
                        None => break, // Channel closed, disconnect
                    }
                }

                // Handle inbound messages (from client to our app)
                msg = self.socket.receive_message() => {
                    match msg {
                        Ok(Some(message)) => {
                            self.message_handler.handle_message(message).await;
                        }
                        Ok(None) => break, // Client disconnected
                        Err(e) => return Err(e),
                    }
                }

                // Periodic keep-alive probe
                _ = Self::next_tick(&mut probe) => {
                    let probe_text = serde_json::to_string(&WebSocketMessage::heartbeat())
                        .unwrap_or_default();
                    self.socket.send_text(probe_text).await?;
                }
            }
        }

        // Clean disconnect
        let _ = self.socket.send_close(1000, "").await;
        Ok(())
    }

    async fn next_tick(probe: &mut Option<Interval>) {
        match probe {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::connection::ClientHandle;
    use std::sync::Mutex;

    /// Socket double that records sent frames and replays scripted inbound
    /// messages.
    struct ScriptedSocket {
        inbound: Vec<Option<String>>,
        sent: Arc<Mutex<Vec<String>>>,
        closed: Arc<Mutex<Vec<(u16, &'static str)>>>,
    }

    #[async_trait]
    impl SocketWrapper for ScriptedSocket {
        async fn send_text(&mut self, message: String) -> Result<(), SocketError> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn send_close(&mut self, code: u16, reason: &'static str) -> Result<(), SocketError> {
            self.closed.lock().unwrap().push((code, reason));
            Ok(())
        }

        async fn receive_message(&mut self) -> Result<Option<String>, SocketError> {
            if self.inbound.is_empty() {
                // Simulate a quiet client; never resolves.
                std::future::pending::<()>().await;
            }
            Ok(self.inbound.remove(0))
        }
    }

    struct RecordingHandler {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl MessageHandler for RecordingHandler {
        async fn handle_message(&self, message: String) {
            self.seen.lock().unwrap().push(message);
        }
    }

    #[tokio::test]
    async fn test_inbound_messages_reach_handler_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(Vec::new()));

        let socket = ScriptedSocket {
            inbound: vec![Some("one".to_string()), Some("two".to_string()), None],
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        let (_handle, rx) = ClientHandle::channel();
        let handler = Arc::new(RecordingHandler {
            seen: Arc::clone(&seen),
        });

        Connection::new(Box::new(socket), rx, handler, None)
            .run()
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["one", "two"]);
        // Clean disconnect sends a normal closure.
        assert_eq!(closed.lock().unwrap().as_slice(), &[(1000, "")]);
    }

    #[tokio::test]
    async fn test_manager_close_frame_closes_socket_with_code() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(Vec::new()));

        let socket = ScriptedSocket {
            inbound: vec![],
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        let (handle, rx) = ClientHandle::channel();
        let handler = Arc::new(RecordingHandler {
            seen: Arc::new(Mutex::new(Vec::new())),
        });

        handle.send_raw("goodbye".to_string()).unwrap();
        handle.close(4003, "Room closed");

        Connection::new(Box::new(socket), rx, handler, None)
            .run()
            .await
            .unwrap();

        assert_eq!(sent.lock().unwrap().as_slice(), &["goodbye"]);
        assert_eq!(closed.lock().unwrap().as_slice(), &[(4003, "Room closed")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keep_alive_probe_fires_on_interval() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(Mutex::new(Vec::new()));

        let socket = ScriptedSocket {
            inbound: vec![],
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        let (handle, rx) = ClientHandle::channel();
        let handler = Arc::new(RecordingHandler {
            seen: Arc::new(Mutex::new(Vec::new())),
        });

        let pump = tokio::spawn(
            Connection::new(
                Box::new(socket),
                rx,
                handler,
                Some(Duration::from_secs(30)),
            )
            .run(),
        );

        tokio::time::sleep(Duration::from_secs(65)).await;
        drop(handle); // Channel closes, pump exits.
        pump.await.unwrap().unwrap();

        let probes = sent.lock().unwrap();
        assert_eq!(probes.len(), 2);
        assert!(probes[0].contains("heartbeat"));
    }
}
