//! Terminal sessions
//!
//! This module handles:
//! - Per-agent shell setup and teardown
//! - Serialized, timeout-bounded command execution
//! - Output listeners and their subscriptions

mod output;
#[allow(clippy::module_inception)]
mod session;

pub use output::{OutputListeners, OutputSubscription};
pub use session::TerminalSession;
