//! Terminal manager
//!
//! Top-level entry point: adapter selection, session registry, health
//! aggregation and periodic maintenance.

mod events;
mod maintenance;
#[allow(clippy::module_inception)]
mod manager;

pub use events::{EventReceiver, EventSender, MaintenanceSummary, ManagerEvent, event_channel};
pub use maintenance::MaintenanceHandle;
pub use manager::{TerminalManager, TerminalManagerBuilder};
