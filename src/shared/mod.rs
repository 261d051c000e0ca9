//! Event channel between the scan worker and whatever consumes it

pub mod messages;

pub use messages::{Disconnected, EventSender, PipelineEvent};
