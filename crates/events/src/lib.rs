//! Event system for the deployment orchestrator
//!
//! Step lifecycle notifications are published on a broadcast bus so that
//! progress can be observed live while the durable progress messages are
//! written to the database.

mod bus;
mod types;

pub use bus::{EventBus, ProcessEventStream};
pub use types::*;
