//! Terminal manager
//!
//! Binds agent profiles to terminal sessions. Owns the adapter, the pool and
//! the session registry; the registry is the only record of which sessions
//! are live.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use tokio::sync::RwLock;

use super::events::{EventSender, MaintenanceSummary, ManagerEvent};
use super::maintenance::MaintenanceHandle;
use crate::diagnostics::ErrorTraceExt;
use crate::pool::TerminalPool;
use crate::session::{OutputSubscription, TerminalSession};
use crate::terminal::{
    AdapterKind, NativeAdapter, OutputListener, Terminal, TerminalAdapter, detect_from_env,
};
use crate::types::{
    AgentProfile, HealthMetrics, HealthStatus, Result, SessionInfo, TerminalConfig, TerminalError,
};

/// Builder for [`TerminalManager`]
#[derive(Debug, Default)]
pub struct TerminalManagerBuilder {
    config: TerminalConfig,
    adapter: Option<Arc<dyn TerminalAdapter>>,
    hosted_adapter: Option<Arc<dyn TerminalAdapter>>,
    events: Option<EventSender>,
}

impl TerminalManagerBuilder {
    pub fn new(config: TerminalConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Use `adapter` regardless of the configured adapter type
    pub fn adapter(mut self, adapter: Arc<dyn TerminalAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Adapter to use when selection picks the host editor's terminals
    pub fn hosted_adapter(mut self, adapter: Arc<dyn TerminalAdapter>) -> Self {
        self.hosted_adapter = Some(adapter);
        self
    }

    /// Send lifecycle and maintenance events to `sender`
    pub fn events(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn build(self) -> Result<TerminalManager> {
        let Self {
            config,
            adapter,
            hosted_adapter,
            events,
        } = self;
        config.validate()?;

        let adapter = match adapter {
            Some(adapter) => adapter,
            None => match detect_from_env(config.adapter) {
                AdapterKind::Native => native_adapter(&config),
                AdapterKind::Hosted => hosted_adapter.unwrap_or_else(|| {
                    tracing::warn!(
                        "Hosted terminal adapter selected but none was provided, using native"
                    );
                    native_adapter(&config)
                }),
            },
        };

        let pool = Arc::new(TerminalPool::new(
            Arc::clone(&adapter),
            config.pool_config(),
        ));
        Ok(TerminalManager {
            config,
            adapter,
            pool,
            sessions: DashMap::new(),
            initialized: RwLock::new(false),
            events,
        })
    }
}

fn native_adapter(config: &TerminalConfig) -> Arc<dyn TerminalAdapter> {
    Arc::new(NativeAdapter::new(config.shell.clone()))
}

/// Top-level facade over the pool and the live sessions
#[derive(Debug)]
pub struct TerminalManager {
    config: TerminalConfig,
    adapter: Arc<dyn TerminalAdapter>,
    pool: Arc<TerminalPool>,
    /// Active sessions keyed by session id
    sessions: DashMap<String, Arc<TerminalSession>>,
    /// Held for reading by spawns and maintenance, for writing by
    /// initialize/shutdown
    initialized: RwLock<bool>,
    events: Option<EventSender>,
}

impl TerminalManager {
    /// Create a manager with an adapter selected from the environment
    pub fn new(config: TerminalConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: TerminalConfig) -> TerminalManagerBuilder {
        TerminalManagerBuilder::new(config)
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    pub fn pool(&self) -> &Arc<TerminalPool> {
        &self.pool
    }

    /// Start the adapter, then pre-warm the pool
    pub async fn initialize(&self) -> Result<()> {
        let mut initialized = self.initialized.write().await;
        if *initialized {
            return Ok(());
        }

        self.adapter.initialize().await?;
        self.pool.initialize().await?;

        *initialized = true;
        tracing::info!(
            adapter = self.adapter.name(),
            pool_size = self.config.pool_size,
            recycle_after = self.config.recycle_after,
            "Terminal manager initialized"
        );
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        *self.initialized.read().await
    }

    /// Terminate every session, then shut down the pool and the adapter
    pub async fn shutdown(&self) -> Result<()> {
        let mut initialized = self.initialized.write().await;
        if !*initialized {
            return Ok(());
        }

        let ids = self.active_sessions();
        let results = join_all(ids.iter().map(|id| self.terminate_terminal(id))).await;
        for (id, result) in ids.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(session_id = %id, error = %e, "Failed to terminate session on shutdown");
            }
        }

        self.pool.shutdown().await;
        *initialized = false;
        self.adapter.shutdown().await?;

        tracing::info!(terminated = ids.len(), "Terminal manager shut down");
        Ok(())
    }

    /// Acquire a terminal, prepare a session for `profile` and register it
    ///
    /// On any failure the terminal, if one was acquired, goes back to the
    /// pool.
    pub async fn spawn_terminal(&self, profile: AgentProfile) -> Result<String> {
        let agent_id = profile.id.clone();
        let initialized = self.initialized.read().await;
        let result = if *initialized {
            self.spawn_session(profile).await
        } else {
            Err(TerminalError::not_initialized("terminal manager"))
        };
        drop(initialized);

        result.map_err(|e| {
            let error = TerminalError::spawn(agent_id, e);
            error.trace_error();
            error
        })
    }

    async fn spawn_session(&self, profile: AgentProfile) -> Result<String> {
        let checkout = Checkout::new(Arc::clone(&self.pool), self.pool.acquire().await?);

        let session_id = format!("session-{}", uuid::Uuid::new_v4());
        let session = Arc::new(TerminalSession::new(
            session_id.clone(),
            Arc::clone(checkout.terminal()),
            profile,
            self.config.command_timeout(),
        ));
        if let Err(e) = session.initialize().await {
            checkout.release().await;
            return Err(e);
        }
        let terminal = checkout.keep();

        self.sessions
            .insert(session_id.clone(), Arc::clone(&session));
        tracing::info!(
            session_id = %session_id,
            agent_id = %session.profile().id,
            terminal_id = %terminal.id(),
            "Spawned terminal session"
        );
        self.emit(ManagerEvent::SessionSpawned {
            session_id: session_id.clone(),
            agent_id: session.profile().id.clone(),
            terminal_id: terminal.id().to_string(),
        });
        Ok(session_id)
    }

    /// Clean up a session and return its terminal to the pool
    ///
    /// The session is deregistered before anything is awaited, so a second
    /// concurrent call fails with not-found instead of releasing twice.
    pub async fn terminate_terminal(&self, session_id: &str) -> Result<()> {
        let Some((_, session)) = self.sessions.remove(session_id) else {
            return Err(TerminalError::not_found(session_id));
        };

        session.cleanup().await;
        self.pool.release(session.terminal()).await;

        tracing::info!(session_id = %session_id, agent_id = %session.profile().id, "Terminated terminal session");
        self.emit(ManagerEvent::SessionTerminated {
            session_id: session_id.to_string(),
            agent_id: session.profile().id.clone(),
        });
        Ok(())
    }

    /// Run a command in the named session
    pub async fn execute_command(&self, session_id: &str, command: &str) -> Result<String> {
        let session = self.session(session_id)?;
        session.execute_command(command).await
    }

    /// Register an output listener on the named session
    pub fn stream_output(
        &self,
        session_id: &str,
        listener: OutputListener,
    ) -> Result<OutputSubscription> {
        Ok(self.session(session_id)?.stream_output(listener))
    }

    /// Aggregate pool and session health
    ///
    /// Healthy iff the manager is initialized, the pool has a live terminal
    /// and every registered session is healthy.
    pub async fn get_health_status(&self) -> HealthStatus {
        let initialized = self.is_initialized().await;
        let pool = self.pool.get_health_status();
        let sessions = self.sessions_snapshot();
        let healthy_sessions = sessions.iter().filter(|s| s.is_healthy()).count();

        let metrics = HealthMetrics {
            active_sessions: sessions.len(),
            healthy_sessions,
            pool_size: pool.size,
            available_terminals: pool.available,
            recycled_terminals: pool.recycled,
        };

        if !initialized {
            HealthStatus::unhealthy("Terminal manager not initialized", Some(metrics))
        } else if !pool.healthy {
            HealthStatus::unhealthy("Terminal pool has no live terminals", Some(metrics))
        } else if healthy_sessions != sessions.len() {
            HealthStatus::unhealthy("Some terminals are unhealthy", Some(metrics))
        } else {
            HealthStatus {
                healthy: true,
                error: None,
                metrics: Some(metrics),
            }
        }
    }

    /// Terminate unhealthy sessions, then maintain the pool
    ///
    /// Never fails: termination errors are logged and every unhealthy
    /// session is visited.
    pub async fn perform_maintenance(&self) -> MaintenanceSummary {
        let initialized = self.initialized.read().await;
        if !*initialized {
            return MaintenanceSummary::default();
        }

        let dead: Vec<String> = self
            .sessions_snapshot()
            .iter()
            .filter(|s| !s.is_healthy())
            .map(|s| s.id().to_string())
            .collect();
        let results = join_all(dead.iter().map(|id| self.terminate_terminal(id))).await;
        for (id, result) in dead.iter().zip(results) {
            match result {
                Ok(()) => tracing::info!(session_id = %id, "Terminated unhealthy session"),
                Err(e) if e.is_not_found() => {
                    tracing::debug!(session_id = %id, "Unhealthy session already terminated");
                }
                Err(e) => {
                    tracing::warn!(session_id = %id, error = %e, "Failed to terminate unhealthy session");
                }
            }
        }

        let pool_report = self.pool.perform_maintenance().await;
        let summary = MaintenanceSummary {
            dead_sessions: dead.len(),
            active_sessions: self.sessions.len(),
            pool: self.pool.get_health_status(),
            pool_report,
        };
        drop(initialized);

        tracing::debug!(
            dead_sessions = summary.dead_sessions,
            active_sessions = summary.active_sessions,
            pool_size = summary.pool.size,
            pool_available = summary.pool.available,
            "Maintenance completed"
        );
        self.emit(ManagerEvent::Maintenance(summary));
        summary
    }

    /// Run [`perform_maintenance`](Self::perform_maintenance) every
    /// `healthCheckIntervalMs` in the background
    pub fn start_maintenance(self: &Arc<Self>) -> MaintenanceHandle {
        MaintenanceHandle::spawn(self, self.config.health_check_interval())
    }

    /// Ids of all registered sessions
    pub fn active_sessions(&self) -> Vec<String> {
        self.sessions.iter().map(|r| r.key().clone()).collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn session_info(&self, session_id: &str) -> Result<SessionInfo> {
        Ok(self.session(session_id)?.info())
    }

    pub fn command_history(&self, session_id: &str) -> Result<Vec<String>> {
        Ok(self.session(session_id)?.command_history())
    }

    fn session(&self, session_id: &str) -> Result<Arc<TerminalSession>> {
        self.sessions
            .get(session_id)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| TerminalError::not_found(session_id))
    }

    fn sessions_snapshot(&self) -> Vec<Arc<TerminalSession>> {
        self.sessions.iter().map(|r| Arc::clone(r.value())).collect()
    }

    fn emit(&self, event: ManagerEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                tracing::trace!("Manager event receiver dropped");
            }
        }
    }
}

/// A terminal acquired for a spawn that has not been registered yet
///
/// If the spawn is abandoned (its future dropped), the terminal is released
/// in the background.
struct Checkout {
    pool: Arc<TerminalPool>,
    terminal: Arc<dyn Terminal>,
    armed: bool,
}

impl Checkout {
    fn new(pool: Arc<TerminalPool>, terminal: Arc<dyn Terminal>) -> Self {
        Self {
            pool,
            terminal,
            armed: true,
        }
    }

    fn terminal(&self) -> &Arc<dyn Terminal> {
        &self.terminal
    }

    /// Keep the terminal; the caller is now responsible for releasing it
    fn keep(mut self) -> Arc<dyn Terminal> {
        self.armed = false;
        Arc::clone(&self.terminal)
    }

    async fn release(mut self) {
        self.armed = false;
        self.pool.release(&self.terminal).await;
    }
}

impl Drop for Checkout {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let terminal = Arc::clone(&self.terminal);
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(terminal_id = %terminal.id(), "Abandoned terminal could not be released");
            return;
        };
        let pool = Arc::clone(&self.pool);
        runtime.spawn(async move {
            tracing::debug!(terminal_id = %terminal.id(), "Releasing terminal of abandoned spawn");
            pool.release(&terminal).await;
        });
    }
}
