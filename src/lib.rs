//! Agent Terminal Pool
//!
//! A bounded pool of reusable shell terminals and a session manager that
//! hands them to concurrently running agents.
//!
//! ## Features
//!
//! - Bounded, lazily grown terminal pool with use-count recycling
//! - One persistent shell session per agent, initialised from an
//!   [`AgentProfile`] and cleaned up on termination
//! - Per-command timeouts, command history and output listeners
//! - Health aggregation and periodic maintenance
//! - Adapter selection between a native shell and a host-embedded terminal
//!
//! ## Quick Start
//!
//! ```no_run
//! use agent_terminal_pool::{AgentProfile, TerminalConfig, TerminalManager};
//!
//! #[tokio::main]
//! async fn main() -> agent_terminal_pool::Result<()> {
//!     let manager = TerminalManager::new(TerminalConfig::from_env())?;
//!     manager.initialize().await?;
//!
//!     let profile = AgentProfile::new("agent-1", "builder").with_working_directory("/tmp");
//!     let session_id = manager.spawn_terminal(profile).await?;
//!     let output = manager.execute_command(&session_id, "pwd").await?;
//!     println!("{output}");
//!
//!     manager.terminate_terminal(&session_id).await?;
//!     manager.shutdown().await
//! }
//! ```
//!
//! ## Environment Variables
//!
//! - `TERMINAL_POOL_ADAPTER`: `auto`, `native` or `vscode`
//! - `TERMINAL_POOL_SIZE`: maximum number of pooled terminals (default 5)
//! - `TERMINAL_POOL_RECYCLE_AFTER`: uses before a terminal is recycled (default 10)
//! - `TERMINAL_POOL_COMMAND_TIMEOUT_MS`: per-command timeout (default 30000)
//! - `TERMINAL_POOL_HEALTH_CHECK_INTERVAL_MS`: maintenance period (default 60000)
//! - `TERMINAL_POOL_SHELL`: shell program for the native adapter (default `bash`)
//!
//! ## Configuration Loading Priority
//!
//! 1. **CLI flags** (binary only)
//! 2. **Environment Variables**
//! 3. **Settings Files - Top-level fields**
//! 4. **Settings Files - `env` object**
//! 5. **Defaults**
//!
//! Settings files are loaded from:
//! - `~/.terminal-pool/settings.json` (user settings)
//! - `.terminal-pool/settings.json` (project settings)
//! - `.terminal-pool/settings.local.json` (local settings, highest priority among settings files)
//!
//! ### Example settings.json
//!
//! ```json
//! {
//!   "poolSize": 8,
//!   "commandTimeoutMs": 60000,
//!   "env": {
//!     "TERMINAL_POOL_SHELL": "/bin/zsh"
//!   }
//! }
//! ```

pub mod cli;
pub mod diagnostics;
pub mod manager;
pub mod pool;
pub mod runner;
pub mod session;
pub mod settings;
pub mod terminal;
pub mod types;

pub use cli::Cli;
pub use manager::{
    EventReceiver, EventSender, MaintenanceHandle, MaintenanceSummary, ManagerEvent,
    TerminalManager, TerminalManagerBuilder, event_channel,
};
pub use pool::{PoolMaintenanceReport, PooledTerminal, TerminalPool};
pub use runner::{run_with_cli, shutdown_otel};
pub use session::{OutputSubscription, TerminalSession};
pub use settings::{Settings, SettingsManager};
pub use terminal::{
    AdapterKind, NativeAdapter, OutputListener, Terminal, TerminalAdapter, select_adapter_kind,
};
pub use types::{
    AdapterType, AgentEnvironment, AgentProfile, ErrorKind, HealthMetrics, HealthStatus,
    PoolConfig, PoolHealth, Result, SessionInfo, TerminalConfig, TerminalError,
};
