//! Agent profiles
//!
//! A profile describes the consumer a terminal session is spawned for. The
//! pool and manager treat it as read-only input.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::{Result, TerminalError};

/// Identity and environment of an agent that owns a terminal session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentProfile {
    /// Agent identifier
    pub id: String,

    /// Agent type (e.g. "coder", "reviewer")
    #[serde(rename = "type")]
    pub agent_type: String,

    /// Declared capabilities
    pub capabilities: Vec<String>,

    /// Environment the session is prepared with
    pub environment: AgentEnvironment,

    /// Scheduling priority, higher first
    pub priority: i32,
}

/// Per-agent shell environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentEnvironment {
    /// Directory to `cd` into during initialization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<PathBuf>,

    /// Commands run in order after the environment is set up
    pub init_commands: Vec<String>,

    /// Commands run best-effort before the terminal goes back to the pool
    pub cleanup_commands: Vec<String>,

    /// Extra environment variables exported during initialization
    pub env: BTreeMap<String, String>,
}

impl AgentProfile {
    /// Create a profile with the given id and type
    pub fn new(id: impl Into<String>, agent_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent_type: agent_type.into(),
            ..Default::default()
        }
    }

    /// Set the working directory
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.environment.working_directory = Some(dir.into());
        self
    }

    /// Append an initialization command
    pub fn with_init_command(mut self, command: impl Into<String>) -> Self {
        self.environment.init_commands.push(command.into());
        self
    }

    /// Append a cleanup command
    pub fn with_cleanup_command(mut self, command: impl Into<String>) -> Self {
        self.environment.cleanup_commands.push(command.into());
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.env.insert(key.into(), value.into());
        self
    }

    /// Add a capability
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Check whether the profile declares a capability
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    /// Reject profiles that cannot be turned into shell commands
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(TerminalError::config_error("Agent id must not be empty"));
        }
        for key in self.environment.env.keys() {
            if !is_shell_identifier(key) {
                return Err(TerminalError::config_error(format!(
                    "Invalid environment variable name for agent {}: '{}'",
                    self.id, key
                )));
            }
        }
        Ok(())
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub(crate) fn is_shell_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
