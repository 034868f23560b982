//! Terminal pool configuration
//!
//! Defaults are overridden by settings files, then by environment variables,
//! then by CLI flags.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{Result, TerminalError};

/// Environment variable names understood by [`TerminalConfig::apply_env`]
pub const ENV_ADAPTER: &str = "TERMINAL_POOL_ADAPTER";
pub const ENV_POOL_SIZE: &str = "TERMINAL_POOL_SIZE";
pub const ENV_RECYCLE_AFTER: &str = "TERMINAL_POOL_RECYCLE_AFTER";
pub const ENV_COMMAND_TIMEOUT_MS: &str = "TERMINAL_POOL_COMMAND_TIMEOUT_MS";
pub const ENV_HEALTH_CHECK_INTERVAL_MS: &str = "TERMINAL_POOL_HEALTH_CHECK_INTERVAL_MS";
pub const ENV_SHELL: &str = "TERMINAL_POOL_SHELL";

const DEFAULT_POOL_SIZE: usize = 5;
const DEFAULT_RECYCLE_AFTER: u32 = 10;
const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 60_000;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_ACQUIRE_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_IDLE_RECYCLE_MS: u64 = 5 * 60 * 1000;

/// Which terminal adapter the manager should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterType {
    /// Detect from the host environment
    #[default]
    Auto,
    /// Local shell processes
    Native,
    /// Terminals provided by the hosting editor
    #[serde(alias = "vscode-hosted", alias = "hosted")]
    Vscode,
}

impl std::str::FromStr for AdapterType {
    type Err = TerminalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "native" => Ok(Self::Native),
            "vscode" | "vscode-hosted" | "hosted" => Ok(Self::Vscode),
            _ => Err(TerminalError::config_error(format!(
                "Invalid terminal adapter: '{}'. Valid options: 'auto', 'native', 'vscode'",
                s
            ))),
        }
    }
}

impl std::fmt::Display for AdapterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Native => write!(f, "native"),
            Self::Vscode => write!(f, "vscode"),
        }
    }
}

/// Terminal subsystem configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TerminalConfig {
    /// Adapter selection
    pub adapter: AdapterType,

    /// Maximum number of pooled terminals
    pub pool_size: usize,

    /// Number of uses after which a terminal is destroyed instead of reused
    pub recycle_after: u32,

    /// Per-command timeout in milliseconds
    pub command_timeout_ms: u64,

    /// Period of the background maintenance loop in milliseconds
    pub health_check_interval_ms: u64,

    /// How long `acquire` waits on a full pool in milliseconds
    pub acquire_timeout_ms: u64,

    /// How often a blocked `acquire` re-checks the pool in milliseconds
    pub acquire_poll_interval_ms: u64,

    /// Idle time after which an available terminal is marked for recycling
    pub idle_recycle_ms: u64,

    /// Shell program used by the native adapter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            adapter: AdapterType::Auto,
            pool_size: DEFAULT_POOL_SIZE,
            recycle_after: DEFAULT_RECYCLE_AFTER,
            command_timeout_ms: DEFAULT_COMMAND_TIMEOUT_MS,
            health_check_interval_ms: DEFAULT_HEALTH_CHECK_INTERVAL_MS,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            acquire_poll_interval_ms: DEFAULT_ACQUIRE_POLL_INTERVAL_MS,
            idle_recycle_ms: DEFAULT_IDLE_RECYCLE_MS,
            shell: None,
        }
    }
}

impl TerminalConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load defaults overridden by process environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Override fields from an environment lookup
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_ADAPTER) {
            match value.parse() {
                Ok(adapter) => self.adapter = adapter,
                Err(e) => tracing::warn!(key = ENV_ADAPTER, "{}", e),
            }
        }
        if let Some(size) = parse_env(&lookup, ENV_POOL_SIZE) {
            self.pool_size = size;
        }
        if let Some(count) = parse_env(&lookup, ENV_RECYCLE_AFTER) {
            self.recycle_after = count;
        }
        if let Some(ms) = parse_env(&lookup, ENV_COMMAND_TIMEOUT_MS) {
            self.command_timeout_ms = ms;
        }
        if let Some(ms) = parse_env(&lookup, ENV_HEALTH_CHECK_INTERVAL_MS) {
            self.health_check_interval_ms = ms;
        }
        if let Some(shell) = lookup(ENV_SHELL).filter(|s| !s.trim().is_empty()) {
            self.shell = Some(shell);
        }
    }

    /// Reject values the pool cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            return Err(TerminalError::config_error("poolSize must be at least 1"));
        }
        if self.recycle_after == 0 {
            return Err(TerminalError::config_error("recycleAfter must be at least 1"));
        }
        let timeouts = [
            ("commandTimeoutMs", self.command_timeout_ms),
            ("healthCheckIntervalMs", self.health_check_interval_ms),
            ("acquireTimeoutMs", self.acquire_timeout_ms),
            ("acquirePollIntervalMs", self.acquire_poll_interval_ms),
            ("idleRecycleMs", self.idle_recycle_ms),
        ];
        for (name, value) in timeouts {
            if value == 0 {
                return Err(TerminalError::config_error(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Per-command timeout
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Period of the background maintenance loop
    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    /// Settings for the terminal pool
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_size: self.pool_size,
            recycle_after: self.recycle_after,
            acquire_timeout: Duration::from_millis(self.acquire_timeout_ms),
            poll_interval: Duration::from_millis(self.acquire_poll_interval_ms),
            idle_recycle_after: Duration::from_millis(self.idle_recycle_ms),
        }
    }
}

fn parse_env<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key = key, value = %raw, "Ignoring unparseable environment value");
            None
        }
    }
}

/// Terminal pool sizing and timing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Upper bound on tracked terminals
    pub max_size: usize,
    /// Uses before a terminal is recycled on release
    pub recycle_after: u32,
    /// How long `acquire` waits on a full pool
    pub acquire_timeout: Duration,
    /// Sleep between checks while `acquire` waits
    pub poll_interval: Duration,
    /// Idle time after which an available terminal is marked for recycling
    pub idle_recycle_after: Duration,
}

impl PoolConfig {
    /// Create a pool config with the default timings
    pub fn new(max_size: usize, recycle_after: u32) -> Self {
        Self {
            max_size,
            recycle_after,
            ..TerminalConfig::default().pool_config()
        }
    }

    /// Number of terminals kept warm: `min(2, max_size)`
    pub fn warm_floor(&self) -> usize {
        self.max_size.min(2)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        TerminalConfig::default().pool_config()
    }
}
