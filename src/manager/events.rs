//! Events emitted by the terminal manager
//!
//! Observers receive events through an optional unbounded channel injected
//! with [`TerminalManagerBuilder::events`](super::TerminalManagerBuilder::events).

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::pool::PoolMaintenanceReport;
use crate::types::PoolHealth;

/// Sending half of the manager event channel
pub type EventSender = mpsc::UnboundedSender<ManagerEvent>;

/// Receiving half of the manager event channel
pub type EventReceiver = mpsc::UnboundedReceiver<ManagerEvent>;

/// Create an event channel for [`TerminalManagerBuilder::events`](super::TerminalManagerBuilder::events)
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ManagerEvent {
    #[serde(rename_all = "camelCase")]
    SessionSpawned {
        session_id: String,
        agent_id: String,
        terminal_id: String,
    },
    #[serde(rename_all = "camelCase")]
    SessionTerminated { session_id: String, agent_id: String },
    Maintenance(MaintenanceSummary),
}

/// Result of one manager maintenance pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceSummary {
    /// Unhealthy sessions that were terminated
    pub dead_sessions: usize,
    /// Sessions still registered afterwards
    pub active_sessions: usize,
    /// Pool snapshot after maintenance
    pub pool: PoolHealth,
    /// What pool maintenance changed
    pub pool_report: PoolMaintenanceReport,
}
