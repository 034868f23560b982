//! Bounded terminal pool

#[allow(clippy::module_inception)]
mod pool;
mod pooled;

pub use pool::{PoolMaintenanceReport, TerminalPool};
pub use pooled::PooledTerminal;
