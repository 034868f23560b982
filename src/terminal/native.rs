//! Native terminal adapter
//!
//! Each terminal is one long-lived, non-interactive shell. Commands are
//! written to its stdin and their combined output is read back up to a
//! per-command completion marker, so environment variables and the working
//! directory persist between commands.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
#[cfg(unix)]
use process_wrap::tokio::ProcessGroup;
use process_wrap::tokio::{CommandWrap, KillOnDrop};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::Mutex;

use super::adapter::{ListenerId, OutputListener, Terminal, TerminalAdapter};
use super::wrapped_child::WrappedChild;
use crate::types::{Result, TerminalError};

/// Shell used when none is configured
pub const DEFAULT_SHELL: &str = "bash";

/// Maximum output returned for a single command
const MAX_OUTPUT_BYTES: usize = 30_000;

const MARKER_PREFIX: &str = "__TERMINAL_POOL_DONE_";

/// Adapter spawning local shell processes
#[derive(Debug)]
pub struct NativeAdapter {
    shell: String,
    working_dir: Option<PathBuf>,
    terminals: DashMap<String, Arc<NativeTerminal>>,
}

impl NativeAdapter {
    /// Create an adapter using `shell`, or bash when `None`
    pub fn new(shell: Option<String>) -> Self {
        Self {
            shell: shell.unwrap_or_else(|| DEFAULT_SHELL.to_string()),
            working_dir: None,
            terminals: DashMap::new(),
        }
    }

    /// Start new shells in `dir` instead of the current directory
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Shell program
    pub fn shell(&self) -> &str {
        &self.shell
    }

    /// Number of live terminals created by this adapter
    pub fn terminal_count(&self) -> usize {
        self.terminals.len()
    }

    fn spawn_shell(&self) -> Result<WrappedChild> {
        let mut command = CommandWrap::with_new(&self.shell, |command| {
            if is_bash(&self.shell) {
                command.args(["--noprofile", "--norc"]);
            }
            command
                .env("TERM", "dumb")
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::null());
            if let Some(dir) = &self.working_dir {
                command.current_dir(dir);
            }
        });
        #[cfg(unix)]
        command.wrap(ProcessGroup::leader());
        command.wrap(KillOnDrop);

        let child = command.spawn().map_err(|e| {
            TerminalError::adapter("create terminal", format!("{}: {}", self.shell, e))
        })?;
        Ok(WrappedChild::new(child))
    }
}

impl Default for NativeAdapter {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl TerminalAdapter for NativeAdapter {
    fn name(&self) -> &str {
        "native"
    }

    async fn initialize(&self) -> Result<()> {
        tracing::debug!(shell = %self.shell, "Native terminal adapter initialized");
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        let ids: Vec<String> = self.terminals.iter().map(|r| r.key().clone()).collect();
        for id in ids {
            if let Some((_, terminal)) = self.terminals.remove(&id) {
                if let Err(e) = terminal.kill().await {
                    tracing::warn!(terminal_id = %id, error = %e, "Failed to kill shell on shutdown");
                }
            }
        }
        Ok(())
    }

    async fn create_terminal(&self) -> Result<Arc<dyn Terminal>> {
        let mut child = self.spawn_shell()?;
        let (stdin, stdout) = child
            .take_stdio()
            .ok_or_else(|| TerminalError::adapter("create terminal", "shell stdio not piped"))?;

        let id = format!("native-{}", uuid::Uuid::new_v4());
        tracing::debug!(terminal_id = %id, pid = child.id(), shell = %self.shell, "Spawned shell");

        let terminal = Arc::new(NativeTerminal {
            id: id.clone(),
            io: Mutex::new(ShellIo {
                stdin,
                stdout: BufReader::new(stdout),
                partial: Vec::new(),
                pending_marker: None,
            }),
            child: Mutex::new(child),
            alive: AtomicBool::new(true),
            listeners: DashMap::new(),
            next_listener_id: AtomicU64::new(1),
        });
        self.terminals.insert(id, Arc::clone(&terminal));
        Ok(terminal)
    }

    async fn destroy_terminal(&self, terminal: &Arc<dyn Terminal>) -> Result<()> {
        let Some((_, native)) = self.terminals.remove(terminal.id()) else {
            tracing::debug!(terminal_id = %terminal.id(), "Terminal already destroyed");
            return Ok(());
        };
        native
            .kill()
            .await
            .map_err(|e| TerminalError::adapter("destroy terminal", e.to_string()))
    }
}

fn is_bash(shell: &str) -> bool {
    Path::new(shell)
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name == "bash")
}

#[derive(Debug)]
struct ShellIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    /// Bytes of a line whose read was interrupted
    partial: Vec<u8>,
    /// Marker of a command whose output has not been fully consumed
    pending_marker: Option<String>,
}

impl ShellIo {
    /// Read one line, keeping partial bytes across cancellation
    ///
    /// Returns `None` on EOF.
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        let read = self.stdout.read_until(b'\n', &mut self.partial).await?;
        if read == 0 && self.partial.is_empty() {
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.partial).into_owned();
        self.partial.clear();
        Ok(Some(line))
    }
}

/// One persistent shell process
pub struct NativeTerminal {
    id: String,
    io: Mutex<ShellIo>,
    child: Mutex<WrappedChild>,
    alive: AtomicBool,
    listeners: DashMap<ListenerId, OutputListener>,
    next_listener_id: AtomicU64,
}

impl std::fmt::Debug for NativeTerminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeTerminal")
            .field("id", &self.id)
            .field("alive", &self.alive.load(Ordering::Acquire))
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

impl NativeTerminal {
    async fn kill(&self) -> std::io::Result<()> {
        self.alive.store(false, Ordering::Release);
        let mut child = self.child.lock().await;
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        child.kill().await
    }

    fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
    }

    fn notify(&self, chunk: &str) {
        if self.listeners.is_empty() {
            return;
        }
        let listeners: Vec<OutputListener> =
            self.listeners.iter().map(|r| Arc::clone(r.value())).collect();
        for listener in listeners {
            listener(chunk);
        }
    }

    /// Run one marker-delimited command, optionally notifying listeners
    async fn run(&self, command: &str, notify: bool) -> Result<String> {
        let mut io = self.io.lock().await;
        if !self.alive.load(Ordering::Acquire) {
            return Err(TerminalError::TerminalDead(self.id.clone()));
        }
        self.drain_pending(&mut io).await?;

        let marker = format!("{}{}__", MARKER_PREFIX, uuid::Uuid::new_v4().simple());
        let script = format!(
            "{{ {}\n}} </dev/null 2>&1; echo \"{}:$?\"\n",
            command, marker
        );
        io.pending_marker = Some(marker.clone());

        let written = async {
            io.stdin.write_all(script.as_bytes()).await?;
            io.stdin.flush().await
        }
        .await;
        if let Err(e) = written {
            self.mark_dead();
            return Err(TerminalError::adapter("write command", e.to_string()));
        }

        let mut output = String::new();
        let mut truncated = false;
        loop {
            let line = match io.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    self.mark_dead();
                    return Err(TerminalError::TerminalDead(self.id.clone()));
                }
                Err(e) => {
                    self.mark_dead();
                    return Err(TerminalError::adapter("read output", e.to_string()));
                }
            };

            // Output without a trailing newline shares a line with the marker
            let (content, done) = match line.find(&marker) {
                Some(pos) => (&line[..pos], true),
                None => (line.as_str(), false),
            };
            if !content.is_empty() {
                if notify {
                    self.notify(content);
                }
                if !truncated {
                    truncated = push_bounded(&mut output, content);
                }
            }
            if done {
                break;
            }
        }
        io.pending_marker = None;

        if output.ends_with('\n') {
            output.pop();
        }
        if truncated {
            output.push_str("\n... (output truncated)");
        }
        Ok(output)
    }

    /// Consume the output of a command whose caller stopped waiting
    async fn drain_pending(&self, io: &mut ShellIo) -> Result<()> {
        let Some(marker) = io.pending_marker.clone() else {
            return Ok(());
        };
        tracing::debug!(terminal_id = %self.id, "Draining output of an abandoned command");
        loop {
            match io.next_line().await {
                Ok(Some(line)) if line.contains(&marker) => break,
                Ok(Some(_)) => {}
                Ok(None) => {
                    self.mark_dead();
                    return Err(TerminalError::TerminalDead(self.id.clone()));
                }
                Err(e) => {
                    self.mark_dead();
                    return Err(TerminalError::adapter("read output", e.to_string()));
                }
            }
        }
        io.pending_marker = None;
        Ok(())
    }
}

#[async_trait]
impl Terminal for NativeTerminal {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_alive(&self) -> bool {
        if !self.alive.load(Ordering::Acquire) {
            return false;
        }
        // Locked only while being killed or polled elsewhere
        let Ok(mut child) = self.child.try_lock() else {
            return true;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(_)) | Err(_) => {
                self.mark_dead();
                false
            }
        }
    }

    async fn execute_command(&self, command: &str) -> Result<String> {
        self.run(command, true).await
    }

    async fn execute_silent(&self, command: &str) -> Result<String> {
        self.run(command, false).await
    }

    fn add_output_listener(&self, listener: OutputListener) -> Option<ListenerId> {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, listener);
        Some(id)
    }

    fn remove_output_listener(&self, id: ListenerId) {
        self.listeners.remove(&id);
    }
}

/// Append `chunk` while staying under the output limit
///
/// Returns true once the limit was hit.
fn push_bounded(output: &mut String, chunk: &str) -> bool {
    let room = MAX_OUTPUT_BYTES.saturating_sub(output.len());
    if chunk.len() <= room {
        output.push_str(chunk);
        return false;
    }
    let mut end = room;
    while !chunk.is_char_boundary(end) {
        end -= 1;
    }
    output.push_str(&chunk[..end]);
    true
}
