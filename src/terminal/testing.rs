//! Scriptable in-memory adapter for tests
//!
//! Commands are interpreted instead of executed:
//! - `sleep_ms:N` waits N milliseconds, then succeeds
//! - `fail:...` returns an adapter error
//! - anything else succeeds with `ok:<command>`

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use super::adapter::{ListenerId, OutputListener, Terminal, TerminalAdapter};
use crate::types::{Result, TerminalError};

#[derive(Debug, Default)]
pub struct MockAdapter {
    next_id: AtomicUsize,
    destroyed: AtomicUsize,
    destroy_delay_ms: AtomicU64,
    fail_create: AtomicBool,
    initialized: AtomicBool,
    terminals: DashMap<String, Arc<MockTerminal>>,
}

impl MockAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created_count(&self) -> usize {
        self.next_id.load(Ordering::SeqCst)
    }

    pub fn destroyed_count(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Make every destroy take `delay` before completing
    pub fn set_destroy_delay(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.destroy_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn terminal(&self, id: &str) -> Option<Arc<MockTerminal>> {
        self.terminals.get(id).map(|t| Arc::clone(t.value()))
    }

    /// Simulate a terminal dying underneath the pool
    pub fn kill(&self, id: &str) {
        if let Some(terminal) = self.terminal(id) {
            terminal.set_alive(false);
        }
    }
}

#[async_trait]
impl TerminalAdapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn initialize(&self) -> Result<()> {
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn create_terminal(&self) -> Result<Arc<dyn Terminal>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(TerminalError::adapter("create terminal", "mock refused"));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let terminal = Arc::new(MockTerminal::new(format!("mock-{}", n)));
        self.terminals.insert(terminal.id.clone(), Arc::clone(&terminal));
        Ok(terminal)
    }

    async fn destroy_terminal(&self, terminal: &Arc<dyn Terminal>) -> Result<()> {
        let delay = self.destroy_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.destroyed.fetch_add(1, Ordering::SeqCst);
        if let Some(mock) = self.terminal(terminal.id()) {
            mock.set_alive(false);
        }
        Ok(())
    }
}

pub struct MockTerminal {
    id: String,
    alive: AtomicBool,
    executed: Mutex<Vec<String>>,
    listeners: DashMap<ListenerId, OutputListener>,
    next_listener_id: AtomicU64,
}

impl std::fmt::Debug for MockTerminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTerminal")
            .field("id", &self.id)
            .field("alive", &self.alive.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl MockTerminal {
    fn new(id: String) -> Self {
        Self {
            id,
            alive: AtomicBool::new(true),
            executed: Mutex::new(Vec::new()),
            listeners: DashMap::new(),
            next_listener_id: AtomicU64::new(1),
        }
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Commands that completed, in order
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[async_trait]
impl Terminal for MockTerminal {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn execute_command(&self, command: &str) -> Result<String> {
        self.run(command, true).await
    }

    async fn execute_silent(&self, command: &str) -> Result<String> {
        self.run(command, false).await
    }

    fn add_output_listener(&self, listener: OutputListener) -> Option<ListenerId> {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners.insert(id, listener);
        Some(id)
    }

    fn remove_output_listener(&self, id: ListenerId) {
        self.listeners.remove(&id);
    }
}

impl MockTerminal {
    async fn run(&self, command: &str, notify: bool) -> Result<String> {
        if !self.is_alive() {
            return Err(TerminalError::TerminalDead(self.id.clone()));
        }
        if let Some(ms) = command.strip_prefix("sleep_ms:") {
            let ms: u64 = ms.trim().parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if command.starts_with("fail:") {
            return Err(TerminalError::adapter("execute command", "mock failure"));
        }
        self.executed.lock().unwrap().push(command.to_string());
        let output = format!("ok:{}", command);
        if !notify {
            return Ok(output);
        }
        let listeners: Vec<OutputListener> =
            self.listeners.iter().map(|r| Arc::clone(r.value())).collect();
        for listener in listeners {
            listener(&output);
        }
        Ok(output)
    }
}
