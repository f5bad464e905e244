// Public API
pub use connection::ClientHandle;
pub use registry::RoomRegistry;
pub use service::ClassroomService;

// Internal modules
pub mod code;
pub mod connection;
pub mod handlers;
pub mod models;
pub mod registry;
pub mod service;
