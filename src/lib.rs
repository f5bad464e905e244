// Library crate for the classlive classroom monitoring server
// This file exposes the public API for integration tests

pub mod attention;
pub mod config;
pub mod room;
pub mod shared;
pub mod signaling;
pub mod websockets;

// Re-export commonly used types for easier access in tests
pub use attention::{AlertSeverity, AlertTransition, AttentionMonitor, AttentionStatus};
pub use config::ServerConfig;
pub use room::{ClassroomService, ClientHandle, RoomRegistry};
pub use shared::{AppError, AppState};
pub use signaling::{SignalKind, SignalingRelay};
pub use websockets::{MessageType, WebSocketMessage};
