//! Terminal session
//!
//! A session borrows one terminal from the pool for the lifetime of one
//! agent. It prepares the shell environment, runs commands one at a time
//! under a timeout, forwards output to listeners and runs the agent's cleanup
//! commands before the terminal is handed back.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{Instant, timeout};

use super::output::{OutputListeners, OutputSubscription};
use crate::terminal::{OutputListener, Terminal};
use crate::types::{AgentProfile, Result, SessionInfo, TerminalError};

/// Idle time after which `is_healthy` pings the terminal
const IDLE_PING_AFTER: Duration = Duration::from_secs(5 * 60);

/// Timeout of the health-check ping
const HEALTH_PING_TIMEOUT: Duration = Duration::from_secs(5);

const HEALTH_PING_COMMAND: &str = "echo \"health check\"";

#[derive(Debug)]
struct Activity {
    last_command_time: Option<DateTime<Utc>>,
    last_activity: Instant,
}

/// One agent's view of a pooled terminal
#[derive(Debug)]
pub struct TerminalSession {
    id: String,
    terminal: Arc<dyn Terminal>,
    profile: AgentProfile,
    start_time: DateTime<Utc>,
    command_timeout: Duration,
    initialized: AtomicBool,
    /// Held for the duration of every command so commands never overlap
    exec_lock: tokio::sync::Mutex<()>,
    history: Mutex<Vec<String>>,
    activity: Mutex<Activity>,
    listeners: Arc<OutputListeners>,
    ping_in_flight: Arc<AtomicBool>,
}

impl TerminalSession {
    pub fn new(
        id: impl Into<String>,
        terminal: Arc<dyn Terminal>,
        profile: AgentProfile,
        command_timeout: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            listeners: Arc::new(OutputListeners::new(Arc::clone(&terminal))),
            terminal,
            profile,
            start_time: Utc::now(),
            command_timeout,
            initialized: AtomicBool::new(false),
            exec_lock: tokio::sync::Mutex::new(()),
            history: Mutex::new(Vec::new()),
            activity: Mutex::new(Activity {
                last_command_time: None,
                last_activity: Instant::now(),
            }),
            ping_in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn terminal(&self) -> &Arc<dyn Terminal> {
        &self.terminal
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Commands executed successfully, oldest first
    pub fn command_history(&self) -> Vec<String> {
        lock(&self.history).clone()
    }

    pub fn last_command_time(&self) -> Option<DateTime<Utc>> {
        lock(&self.activity).last_command_time
    }

    /// Prepare the shell for the agent
    ///
    /// Exports the session and agent identity, the profile's environment,
    /// changes into the working directory, runs the init commands and sets the
    /// prompt. Calling it again after success does nothing. On failure the
    /// session stays uninitialized.
    pub async fn initialize(&self) -> Result<()> {
        let _guard = self.exec_lock.lock().await;
        if self.is_initialized() {
            return Ok(());
        }
        self.profile.validate()?;

        for command in self.setup_commands() {
            self.run(&command).await?;
        }

        self.initialized.store(true, Ordering::Release);
        tracing::info!(
            session_id = %self.id,
            agent_id = %self.profile.id,
            terminal_id = %self.terminal.id(),
            "Terminal session initialized"
        );
        Ok(())
    }

    fn setup_commands(&self) -> Vec<String> {
        let environment = &self.profile.environment;
        let mut commands = vec![format!(
            "export AGENT_SESSION_ID={} AGENT_ID={} AGENT_TYPE={}",
            shell_quote(&self.id),
            shell_quote(&self.profile.id),
            shell_quote(&self.profile.agent_type)
        )];
        commands.extend(
            environment
                .env
                .iter()
                .map(|(key, value)| format!("export {}={}", key, shell_quote(value))),
        );
        if let Some(dir) = &environment.working_directory {
            commands.push(format!("cd {}", shell_quote(&dir.to_string_lossy())));
        }
        commands.extend(environment.init_commands.iter().cloned());
        commands.push(format!(
            "export PS1={}",
            shell_quote(&format!("[{}]$ ", self.profile.id))
        ));
        commands
    }

    /// Execute a command under the session timeout
    ///
    /// Commands submitted concurrently run one after another in submission
    /// order. A timeout fails the command but leaves the terminal usable.
    pub async fn execute_command(&self, command: &str) -> Result<String> {
        // Checked under the lock: a queued command must not outlive cleanup
        let _guard = self.exec_lock.lock().await;
        if !self.is_initialized() {
            return Err(TerminalError::not_initialized(format!(
                "session {}",
                self.id
            )));
        }
        if !self.terminal.is_alive() {
            return Err(TerminalError::TerminalDead(self.terminal.id().to_string()));
        }

        self.listeners.emit(&format!("$ {}\n", command));

        let output = match self.run(command).await {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!(session_id = %self.id, command, error = %e, "Command failed");
                return Err(e);
            }
        };

        self.listeners.emit(&output);
        lock(&self.history).push(command.to_string());
        {
            let mut activity = lock(&self.activity);
            activity.last_command_time = Some(Utc::now());
            activity.last_activity = Instant::now();
        }
        Ok(output)
    }

    async fn run(&self, command: &str) -> Result<String> {
        match timeout(self.command_timeout, self.terminal.execute_command(command)).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => Err(TerminalError::command_failed(command, e)),
            Err(_) => Err(TerminalError::command_timeout(
                command,
                u64::try_from(self.command_timeout.as_millis()).unwrap_or(u64::MAX),
            )),
        }
    }

    /// Run the profile's cleanup commands and drop all listeners
    ///
    /// Failures are logged and skipped; this always completes.
    pub async fn cleanup(&self) {
        let _guard = self.exec_lock.lock().await;
        if self.terminal.is_alive() {
            for command in &self.profile.environment.cleanup_commands {
                if let Err(e) = self.run(command).await {
                    tracing::warn!(
                        session_id = %self.id,
                        command = %command,
                        error = %e,
                        "Cleanup command failed"
                    );
                }
            }
        } else {
            tracing::debug!(session_id = %self.id, "Terminal dead, skipping cleanup commands");
        }
        self.listeners.clear();
        self.initialized.store(false, Ordering::Release);
    }

    /// Whether the session's terminal is alive
    ///
    /// After five idle minutes this also fires a background `echo` ping
    /// (5 s timeout) whose failure is only logged.
    pub fn is_healthy(&self) -> bool {
        if !self.terminal.is_alive() {
            return false;
        }
        let idle = lock(&self.activity).last_activity.elapsed();
        if idle > IDLE_PING_AFTER {
            self.spawn_health_ping();
        }
        true
    }

    fn spawn_health_ping(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        if self.ping_in_flight.swap(true, Ordering::AcqRel) {
            return;
        }

        let terminal = Arc::clone(&self.terminal);
        let in_flight = Arc::clone(&self.ping_in_flight);
        let session_id = self.id.clone();
        runtime.spawn(async move {
            let ping = terminal.execute_silent(HEALTH_PING_COMMAND);
            match timeout(HEALTH_PING_TIMEOUT, ping).await {
                Ok(Ok(_)) => tracing::trace!(session_id = %session_id, "Health check ping ok"),
                Ok(Err(e)) => {
                    tracing::warn!(session_id = %session_id, error = %e, "Health check ping failed");
                }
                Err(_) => tracing::warn!(session_id = %session_id, "Health check ping timed out"),
            }
            in_flight.store(false, Ordering::Release);
        });
    }

    /// Register an output listener
    pub fn stream_output(&self, listener: OutputListener) -> OutputSubscription {
        self.listeners.subscribe(listener)
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            agent_id: self.profile.id.clone(),
            agent_type: self.profile.agent_type.clone(),
            terminal_id: self.terminal.id().to_string(),
            start_time: self.start_time,
            last_command_time: self.last_command_time(),
            command_count: lock(&self.history).len(),
            healthy: self.terminal.is_alive(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Single-quote `value` for a POSIX shell
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::TerminalAdapter;
    use crate::terminal::testing::{MockAdapter, MockTerminal};
    use pretty_assertions::assert_eq;

    async fn session_with(
        profile: AgentProfile,
        command_timeout: Duration,
    ) -> (Arc<MockAdapter>, Arc<MockTerminal>, TerminalSession) {
        let adapter = MockAdapter::new();
        let terminal = adapter.create_terminal().await.unwrap();
        let mock = adapter.terminal(terminal.id()).unwrap();
        let session = TerminalSession::new("session-1", terminal, profile, command_timeout);
        (adapter, mock, session)
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, OutputListener) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let listener: OutputListener = Arc::new(move |chunk: &str| {
            sink.lock().unwrap().push(chunk.to_string());
        });
        (seen, listener)
    }

    #[tokio::test]
    async fn test_initialize_runs_setup_in_order() {
        let profile = AgentProfile::new("agent-1", "coder")
            .with_env("FOO", "it's")
            .with_working_directory("/tmp/work")
            .with_init_command("git status");
        let (_, mock, session) = session_with(profile, Duration::from_secs(1)).await;

        session.initialize().await.unwrap();
        session.initialize().await.unwrap();

        assert_eq!(
            mock.executed(),
            vec![
                "export AGENT_SESSION_ID='session-1' AGENT_ID='agent-1' AGENT_TYPE='coder'",
                r"export FOO='it'\''s'",
                "cd '/tmp/work'",
                "git status",
                "export PS1='[agent-1]$ '",
            ]
        );
        assert!(session.is_initialized());
    }

    #[tokio::test]
    async fn test_failed_initialize_leaves_session_uninitialized() {
        let profile = AgentProfile::new("agent-1", "coder").with_init_command("fail:setup");
        let (_, _, session) = session_with(profile, Duration::from_secs(1)).await;

        let err = session.initialize().await.unwrap_err();
        assert!(matches!(err, TerminalError::CommandFailed { ref command, .. } if command == "fail:setup"));
        assert!(!session.is_initialized());
        assert!(matches!(
            session.execute_command("ls").await,
            Err(TerminalError::NotInitialized(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_profile_is_rejected() {
        let profile = AgentProfile::new("agent-1", "coder").with_env("NOT VALID", "x");
        let (_, mock, session) = session_with(profile, Duration::from_secs(1)).await;

        assert!(matches!(
            session.initialize().await,
            Err(TerminalError::Config(_))
        ));
        assert!(mock.executed().is_empty());
    }

    #[tokio::test]
    async fn test_execute_requires_initialization() {
        let (_, mock, session) =
            session_with(AgentProfile::new("agent-1", "coder"), Duration::from_secs(1)).await;

        let err = session.execute_command("ls").await.unwrap_err();
        assert!(matches!(err, TerminalError::NotInitialized(_)));
        assert!(mock.executed().is_empty());
    }

    #[tokio::test]
    async fn test_execute_on_dead_terminal() {
        let (_, mock, session) =
            session_with(AgentProfile::new("agent-1", "coder"), Duration::from_secs(1)).await;
        session.initialize().await.unwrap();
        mock.set_alive(false);

        let err = session.execute_command("ls").await.unwrap_err();
        assert!(matches!(err, TerminalError::TerminalDead(_)));
    }

    #[tokio::test]
    async fn test_execute_records_history() {
        let (_, _, session) =
            session_with(AgentProfile::new("agent-1", "coder"), Duration::from_secs(1)).await;
        session.initialize().await.unwrap();
        assert!(session.last_command_time().is_none());

        assert_eq!(session.execute_command("ls").await.unwrap(), "ok:ls");
        assert_eq!(session.execute_command("pwd").await.unwrap(), "ok:pwd");
        assert!(session.execute_command("fail:oops").await.is_err());

        assert_eq!(session.command_history(), vec!["ls", "pwd"]);
        assert!(session.last_command_time().is_some());
        assert_eq!(session.info().command_count, 2);
    }

    #[tokio::test]
    async fn test_execution_error_carries_command_and_cause() {
        let (_, _, session) =
            session_with(AgentProfile::new("agent-1", "coder"), Duration::from_secs(1)).await;
        session.initialize().await.unwrap();

        let err = session.execute_command("fail:make").await.unwrap_err();
        match err {
            TerminalError::CommandFailed { command, source } => {
                assert_eq!(command, "fail:make");
                assert!(matches!(*source, TerminalError::Adapter { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_leaves_session_usable() {
        let (_, _, session) =
            session_with(AgentProfile::new("agent-1", "coder"), Duration::from_millis(50)).await;
        session.initialize().await.unwrap();

        let started = Instant::now();
        let err = session.execute_command("sleep_ms:200").await.unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(
            err,
            TerminalError::CommandTimeout { timeout_ms: 50, .. }
        ));
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(200));

        assert_eq!(session.execute_command("echo ok").await.unwrap(), "ok:echo ok");
        assert!(session.is_healthy());
    }

    #[tokio::test]
    async fn test_commands_run_in_submission_order() {
        let (_, mock, session) =
            session_with(AgentProfile::new("agent-1", "coder"), Duration::from_secs(1)).await;
        session.initialize().await.unwrap();

        let (a, b, c) = tokio::join!(
            session.execute_command("sleep_ms:30"),
            session.execute_command("echo second"),
            session.execute_command("sleep_ms:1"),
        );
        a.unwrap();
        b.unwrap();
        c.unwrap();

        assert_eq!(
            session.command_history(),
            vec!["sleep_ms:30", "echo second", "sleep_ms:1"]
        );
        assert_eq!(mock.executed().last().map(String::as_str), Some("sleep_ms:1"));
    }

    #[tokio::test]
    async fn test_stream_output() {
        let (_, mock, session) =
            session_with(AgentProfile::new("agent-1", "coder"), Duration::from_secs(1)).await;
        session.initialize().await.unwrap();

        let (seen, listener) = recorder();
        let subscription = session.stream_output(listener);
        assert_eq!(mock.listener_count(), 1);

        session.execute_command("ls").await.unwrap();
        subscription.unsubscribe();
        subscription.unsubscribe();
        session.execute_command("pwd").await.unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.first().map(String::as_str), Some("$ ls\n"));
        assert_eq!(seen.last().map(String::as_str), Some("ok:ls"));
        assert!(seen.iter().all(|chunk| !chunk.contains("pwd")));
        assert_eq!(mock.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_is_best_effort() {
        let profile = AgentProfile::new("agent-1", "coder")
            .with_cleanup_command("fail:first")
            .with_cleanup_command("rm -rf tmp");
        let (_, mock, session) = session_with(profile, Duration::from_secs(1)).await;
        session.initialize().await.unwrap();
        let (_, listener) = recorder();
        let subscription = session.stream_output(listener);

        session.cleanup().await;

        assert_eq!(mock.executed().last().map(String::as_str), Some("rm -rf tmp"));
        assert!(!subscription.is_active());
        assert_eq!(mock.listener_count(), 0);
        assert!(!session.is_initialized());
    }

    #[tokio::test]
    async fn test_cleanup_skips_dead_terminal() {
        let profile = AgentProfile::new("agent-1", "coder").with_cleanup_command("echo bye");
        let (_, mock, session) = session_with(profile, Duration::from_secs(1)).await;
        session.initialize().await.unwrap();
        mock.set_alive(false);

        session.cleanup().await;
        assert!(!mock.executed().contains(&"echo bye".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_session_pings_terminal() {
        let (_, mock, session) =
            session_with(AgentProfile::new("agent-1", "coder"), Duration::from_secs(1)).await;
        session.initialize().await.unwrap();

        assert!(session.is_healthy());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!mock.executed().contains(&HEALTH_PING_COMMAND.to_string()));

        tokio::time::advance(Duration::from_secs(6 * 60)).await;
        assert!(session.is_healthy());
        tokio::time::sleep(Duration::from_millis(10)).await;

        let pings = mock
            .executed()
            .iter()
            .filter(|c| c.as_str() == HEALTH_PING_COMMAND)
            .count();
        assert_eq!(pings, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_ping_is_not_streamed() {
        let (_, mock, session) =
            session_with(AgentProfile::new("agent-1", "coder"), Duration::from_secs(1)).await;
        session.initialize().await.unwrap();
        let (seen, listener) = recorder();
        let _subscription = session.stream_output(listener);

        tokio::time::advance(Duration::from_secs(6 * 60)).await;
        assert!(session.is_healthy());
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(mock.executed().contains(&HEALTH_PING_COMMAND.to_string()));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_command_queued_behind_cleanup_is_rejected() {
        let profile = AgentProfile::new("agent-1", "coder").with_cleanup_command("sleep_ms:50");
        let (_, mock, session) = session_with(profile, Duration::from_secs(1)).await;
        session.initialize().await.unwrap();

        let ((), result) = tokio::join!(
            session.cleanup(),
            session.execute_command("rm -rf after-cleanup")
        );

        assert!(matches!(result, Err(TerminalError::NotInitialized(_))));
        assert_eq!(mock.executed().last().map(String::as_str), Some("sleep_ms:50"));
    }

    #[tokio::test]
    async fn test_dead_terminal_is_unhealthy() {
        let (_, mock, session) =
            session_with(AgentProfile::new("agent-1", "coder"), Duration::from_secs(1)).await;
        mock.set_alive(false);
        assert!(!session.is_healthy());
        assert!(!session.info().healthy);
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("a'b"), r"'a'\''b'");
        assert_eq!(shell_quote("$HOME"), "'$HOME'");
    }
}
