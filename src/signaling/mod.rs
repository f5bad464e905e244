// Public API
pub use relay::{SignalKind, SignalingRelay};

// Internal modules
mod relay;
