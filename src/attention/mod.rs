// Public API
pub use monitor::{AlertTransition, AttentionMonitor};
pub use status::{AlertSeverity, AttentionStatus};

// Internal modules
mod monitor;
mod status;
