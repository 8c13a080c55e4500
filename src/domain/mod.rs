pub mod log_event;
pub mod status;

pub use log_event::LogEvent;
pub use status::{AggregatedStatus, LogStats, NodeHealth, NodeStatus, StatusUpdate};
