//! Health snapshots reported by the pool and the manager

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived snapshot of the terminal pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolHealth {
    /// At least one tracked terminal is alive
    pub healthy: bool,
    /// Total tracked terminals
    pub size: usize,
    /// Alive terminals not in use
    pub available: usize,
    /// Terminals at or above the recycle threshold
    pub recycled: usize,
}

/// Aggregated manager health
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<HealthMetrics>,
}

impl HealthStatus {
    /// Unhealthy status with an explanation
    pub fn unhealthy(error: impl Into<String>, metrics: Option<HealthMetrics>) -> Self {
        Self {
            healthy: false,
            error: Some(error.into()),
            metrics,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetrics {
    pub active_sessions: usize,
    pub healthy_sessions: usize,
    pub pool_size: usize,
    pub available_terminals: usize,
    pub recycled_terminals: usize,
}

/// Read-only view of a live session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub agent_id: String,
    pub agent_type: String,
    pub terminal_id: String,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_command_time: Option<DateTime<Utc>>,
    pub command_count: usize,
    pub healthy: bool,
}
