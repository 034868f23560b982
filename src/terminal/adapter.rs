//! Terminal and adapter traits
//!
//! The pool, sessions and manager only see terminals through these traits.
//! Concrete adapters (a local shell, a host editor's terminals, a test mock)
//! are injected.

use std::sync::Arc;

use async_trait::async_trait;

use crate::types::Result;

/// Callback receiving terminal output chunks
pub type OutputListener = Arc<dyn Fn(&str) + Send + Sync>;

/// Handle returned by native listener registration
pub type ListenerId = u64;

/// A terminal-like resource that executes shell commands
#[async_trait]
pub trait Terminal: Send + Sync + std::fmt::Debug {
    /// Unique terminal id
    fn id(&self) -> &str;

    /// Whether the terminal can still execute commands
    ///
    /// Must not block; called while the pool holds its lock.
    fn is_alive(&self) -> bool;

    /// Execute a command and return its output
    async fn execute_command(&self, command: &str) -> Result<String>;

    /// Execute a command without streaming its output to listeners
    ///
    /// Used for internal round trips such as health checks.
    async fn execute_silent(&self, command: &str) -> Result<String> {
        self.execute_command(command).await
    }

    /// Register a listener for output produced by the terminal itself
    ///
    /// Returns `None` when the terminal has no native output stream.
    fn add_output_listener(&self, _listener: OutputListener) -> Option<ListenerId> {
        None
    }

    /// Remove a listener registered with [`Terminal::add_output_listener`]
    fn remove_output_listener(&self, _id: ListenerId) {}
}

/// Creates and destroys terminals
#[async_trait]
pub trait TerminalAdapter: Send + Sync + std::fmt::Debug {
    /// Adapter name for logs
    fn name(&self) -> &str;

    /// Prepare the adapter before the first terminal is created
    async fn initialize(&self) -> Result<()>;

    /// Release adapter-wide resources
    async fn shutdown(&self) -> Result<()>;

    /// Create a new terminal
    async fn create_terminal(&self) -> Result<Arc<dyn Terminal>>;

    /// Destroy a terminal
    ///
    /// Destroying an already dead terminal is not an error.
    async fn destroy_terminal(&self, terminal: &Arc<dyn Terminal>) -> Result<()>;
}
