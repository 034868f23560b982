//! Public types for the terminal pool
//!
//! This module contains all the shared types used across the crate.

mod config;
mod error;
mod health;
mod profile;

pub use config::{
    AdapterType, ENV_ADAPTER, ENV_COMMAND_TIMEOUT_MS, ENV_HEALTH_CHECK_INTERVAL_MS, ENV_POOL_SIZE,
    ENV_RECYCLE_AFTER, ENV_SHELL, PoolConfig, TerminalConfig,
};
pub use error::{ErrorKind, Result, TerminalError};
pub use health::{HealthMetrics, HealthStatus, PoolHealth, SessionInfo};
pub use profile::{AgentEnvironment, AgentProfile};

pub(crate) use profile::is_shell_identifier;
