//! Error types for the terminal pool

use thiserror::Error;

/// Broad classification of a [`TerminalError`]
///
/// Callers pick a retry policy per kind: pool exhaustion and command
/// timeouts are worth retrying, protocol violations are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No terminal could be acquired before the pool timeout
    PoolExhausted,
    /// The terminal adapter failed to create, destroy or drive a terminal
    Adapter,
    /// A session was used out of order (not initialized, dead terminal)
    Protocol,
    /// A command exceeded its timeout
    Timeout,
    /// A command ran but failed
    Execution,
    /// Unknown session or terminal id
    NotFound,
    /// Invalid configuration
    Config,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Stable name used in structured logs
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PoolExhausted => "pool_exhausted",
            Self::Adapter => "adapter",
            Self::Protocol => "protocol",
            Self::Timeout => "timeout",
            Self::Execution => "execution",
            Self::NotFound => "not_found",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

/// Main error type for the terminal pool, sessions and manager
#[derive(Debug, Error)]
pub enum TerminalError {
    // === Pool errors ===
    /// Pool at capacity and nothing was released before the acquire timeout
    #[error("No terminal available in pool (timeout)")]
    PoolTimeout,

    // === Lookup errors ===
    /// Unknown session id
    #[error("Terminal not found: {0}")]
    TerminalNotFound(String),

    // === Adapter errors ===
    /// The adapter failed to perform an operation
    #[error("Terminal adapter failed to {operation}: {message}")]
    Adapter {
        operation: &'static str,
        message: String,
    },

    /// Spawning a session failed
    #[error("Failed to spawn terminal for agent {agent_id}: {source}")]
    Spawn {
        agent_id: String,
        #[source]
        source: Box<TerminalError>,
    },

    // === Session protocol errors ===
    /// Used before initialization
    #[error("Not initialized: {0}")]
    NotInitialized(String),

    /// The underlying terminal is no longer alive
    #[error("Terminal is not alive: {0}")]
    TerminalDead(String),

    // === Command errors ===
    /// Command did not complete within the session timeout
    #[error("Command timed out after {timeout_ms}ms: {command}")]
    CommandTimeout { command: String, timeout_ms: u64 },

    /// Command execution failed
    #[error("Command failed: {command}: {source}")]
    CommandFailed {
        command: String,
        #[source]
        source: Box<TerminalError>,
    },

    // === Configuration errors ===
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // === External errors ===
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic errors ===
    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for the terminal pool
pub type Result<T> = std::result::Result<T, TerminalError>;

impl TerminalError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            TerminalError::PoolTimeout => ErrorKind::PoolExhausted,
            TerminalError::TerminalNotFound(_) => ErrorKind::NotFound,
            TerminalError::Adapter { .. } => ErrorKind::Adapter,
            TerminalError::Spawn { source, .. } => source.kind(),
            TerminalError::NotInitialized(_) => ErrorKind::Protocol,
            TerminalError::TerminalDead(_) => ErrorKind::Protocol,
            TerminalError::CommandTimeout { .. } => ErrorKind::Timeout,
            TerminalError::CommandFailed { .. } => ErrorKind::Execution,
            TerminalError::Config(_) => ErrorKind::Config,
            TerminalError::Io(_) => ErrorKind::Adapter,
            TerminalError::Json(_) => ErrorKind::Config,
            TerminalError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error is retryable by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::PoolExhausted | ErrorKind::Timeout)
    }

    /// Check if this error means "already gone" rather than "failed"
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if this error is a command timeout
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    // === Constructor helpers ===

    /// Create an adapter error
    pub fn adapter(operation: &'static str, message: impl Into<String>) -> Self {
        TerminalError::Adapter {
            operation,
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        TerminalError::TerminalNotFound(id.into())
    }

    /// Wrap a failure that happened while spawning a session
    pub fn spawn(agent_id: impl Into<String>, source: TerminalError) -> Self {
        TerminalError::Spawn {
            agent_id: agent_id.into(),
            source: Box::new(source),
        }
    }

    /// Create a not initialized error
    pub fn not_initialized(what: impl Into<String>) -> Self {
        TerminalError::NotInitialized(what.into())
    }

    /// Wrap a command execution failure
    pub fn command_failed(command: impl Into<String>, source: TerminalError) -> Self {
        TerminalError::CommandFailed {
            command: command.into(),
            source: Box::new(source),
        }
    }

    /// Create a command timeout error
    pub fn command_timeout(command: impl Into<String>, timeout_ms: u64) -> Self {
        TerminalError::CommandTimeout {
            command: command.into(),
            timeout_ms,
        }
    }

    /// Create a configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        TerminalError::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        TerminalError::Internal(msg.into())
    }
}
