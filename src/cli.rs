//! Command-line interface definitions
//!
//! Provides CLI argument parsing using clap for the terminal pool binary.

use std::path::PathBuf;

use clap::Parser;

use crate::types::{AdapterType, AgentProfile, TerminalConfig};

const BINARY_NAME: &str = "agent-terminal-pool";

/// Run shell commands for an agent through a pooled, persistent terminal
#[derive(Parser, Debug, Clone)]
#[command(name = "agent-terminal-pool")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Commands to run in order; read one per stdin line when omitted
    #[arg(value_name = "COMMAND")]
    pub commands: Vec<String>,

    /// Terminal adapter (auto, native, vscode)
    #[arg(long, value_name = "KIND")]
    pub adapter: Option<AdapterType>,

    /// Maximum number of pooled terminals
    #[arg(long, value_name = "N")]
    pub pool_size: Option<usize>,

    /// Uses before a terminal is recycled
    #[arg(long, value_name = "N")]
    pub recycle_after: Option<u32>,

    /// Per-command timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub command_timeout_ms: Option<u64>,

    /// Shell program for the native adapter
    #[arg(long, value_name = "PROGRAM")]
    pub shell: Option<String>,

    /// Project directory used to locate `.terminal-pool/` settings
    #[arg(long, value_name = "DIR")]
    pub project_dir: Option<PathBuf>,

    /// Agent id of the session
    #[arg(long, value_name = "ID", default_value = "cli")]
    pub agent_id: String,

    /// Agent type of the session
    #[arg(long, value_name = "TYPE", default_value = "shell")]
    pub agent_type: String,

    /// Working directory of the session
    #[arg(long, value_name = "DIR")]
    pub cwd: Option<PathBuf>,

    /// Command run when the session starts (repeatable)
    #[arg(long = "init", value_name = "COMMAND")]
    pub init_commands: Vec<String>,

    /// Command run when the session ends (repeatable)
    #[arg(long = "cleanup", value_name = "COMMAND")]
    pub cleanup_commands: Vec<String>,

    /// Print the manager health status as JSON before shutting down
    #[arg(long)]
    pub health: bool,

    /// Enable diagnostic mode (auto-log to temp file)
    #[arg(short, long)]
    pub diagnostic: bool,

    /// Log directory (implies diagnostic mode)
    #[arg(short = 'l', long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log file name (implies diagnostic mode)
    #[arg(short = 'f', long, value_name = "FILE")]
    pub log_file: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    /// Note: RUST_LOG env var takes priority over this flag
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (only errors)
    /// Note: RUST_LOG env var takes priority over this flag
    #[arg(short, long)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// OpenTelemetry OTLP endpoint (e.g., http://localhost:4317)
    /// When otel feature is enabled, this configures the OTLP exporter.
    /// When otel feature is disabled, this argument is accepted but ignored.
    #[arg(long, value_name = "URL", env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    pub otel_endpoint: Option<String>,

    /// OpenTelemetry service name
    #[arg(long, value_name = "NAME", default_value = BINARY_NAME)]
    pub otel_service_name: String,
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            adapter: None,
            pool_size: None,
            recycle_after: None,
            command_timeout_ms: None,
            shell: None,
            project_dir: None,
            agent_id: "cli".to_string(),
            agent_type: "shell".to_string(),
            cwd: None,
            init_commands: Vec::new(),
            cleanup_commands: Vec::new(),
            health: false,
            diagnostic: false,
            log_dir: None,
            log_file: None,
            verbose: 0,
            quiet: false,
            json_logs: false,
            otel_endpoint: None,
            otel_service_name: BINARY_NAME.to_string(),
        }
    }
}

impl Cli {
    /// Check if diagnostic mode is enabled (output to file)
    ///
    /// Returns true if `--diagnostic` is set, or if `--log-dir` or `--log-file` is specified.
    pub fn is_diagnostic(&self) -> bool {
        self.diagnostic || self.log_dir.is_some() || self.log_file.is_some()
    }

    /// Check if OpenTelemetry tracing is enabled
    #[cfg(feature = "otel")]
    pub fn is_otel_enabled(&self) -> bool {
        self.otel_endpoint.is_some()
    }

    /// Always false without the otel feature
    #[cfg(not(feature = "otel"))]
    pub fn is_otel_enabled(&self) -> bool {
        if self.otel_endpoint.is_some() {
            tracing::warn!("--otel-endpoint specified but otel feature is not enabled, ignoring");
        }
        false
    }

    /// Get the log level based on CLI arguments
    ///
    /// - `--quiet`: ERROR
    /// - default: WARN
    /// - `-v`: INFO
    /// - `-vv`: DEBUG
    /// - `-vvv` or more: TRACE
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else {
            match self.verbose {
                0 => tracing::Level::WARN,
                1 => tracing::Level::INFO,
                2 => tracing::Level::DEBUG,
                _ => tracing::Level::TRACE,
            }
        }
    }

    /// Get the log file path for diagnostic mode
    ///
    /// Uses the specified log directory and file name, or defaults to:
    /// - Directory: system temp directory
    /// - File: `agent-terminal-pool-{timestamp}.log`
    pub fn log_path(&self) -> PathBuf {
        let dir = self.log_dir.clone().unwrap_or_else(std::env::temp_dir);

        let filename = self.log_file.clone().unwrap_or_else(|| {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            format!("{BINARY_NAME}-{timestamp}.log")
        });

        dir.join(filename)
    }

    /// Directory searched for project settings
    pub fn project_dir(&self) -> PathBuf {
        self.project_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Overwrite `config` with the flags that were given
    pub fn apply_to(&self, config: &mut TerminalConfig) {
        if let Some(adapter) = self.adapter {
            config.adapter = adapter;
        }
        if let Some(size) = self.pool_size {
            config.pool_size = size;
        }
        if let Some(count) = self.recycle_after {
            config.recycle_after = count;
        }
        if let Some(ms) = self.command_timeout_ms {
            config.command_timeout_ms = ms;
        }
        if let Some(shell) = &self.shell {
            config.shell = Some(shell.clone());
        }
    }

    /// Profile of the session the binary runs commands in
    pub fn profile(&self) -> AgentProfile {
        let mut profile = AgentProfile::new(&self.agent_id, &self.agent_type);
        if let Some(cwd) = &self.cwd {
            profile = profile.with_working_directory(cwd);
        }
        for command in &self.init_commands {
            profile = profile.with_init_command(command);
        }
        for command in &self.cleanup_commands {
            profile = profile.with_cleanup_command(command);
        }
        profile
    }
}
