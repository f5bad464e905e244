// Public API
pub use handler::{student_websocket, teacher_websocket};
pub use messages::{MessageType, WebSocketMessage};
pub use socket::{Connection, MessageHandler, SocketWrapper};

// Internal modules
mod handler;
pub mod messages;
pub mod socket;
