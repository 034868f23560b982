//! Pool bookkeeping for one terminal

use std::sync::Arc;

use tokio::time::Instant;

use crate::terminal::Terminal;

/// A terminal tracked by the pool
#[derive(Debug, Clone)]
pub struct PooledTerminal {
    terminal: Arc<dyn Terminal>,
    use_count: u32,
    last_used: Instant,
    in_use: bool,
}

impl PooledTerminal {
    /// Wrap a freshly created terminal that goes straight to the available queue
    pub(crate) fn available(terminal: Arc<dyn Terminal>) -> Self {
        Self {
            terminal,
            use_count: 0,
            last_used: Instant::now(),
            in_use: false,
        }
    }

    /// Wrap a freshly created terminal that is handed out immediately
    pub(crate) fn checked_out(terminal: Arc<dyn Terminal>) -> Self {
        Self {
            in_use: true,
            ..Self::available(terminal)
        }
    }

    pub fn terminal(&self) -> &Arc<dyn Terminal> {
        &self.terminal
    }

    pub fn id(&self) -> &str {
        self.terminal.id()
    }

    pub fn use_count(&self) -> u32 {
        self.use_count
    }

    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    pub fn in_use(&self) -> bool {
        self.in_use
    }

    pub(crate) fn check_out(&mut self) -> Arc<dyn Terminal> {
        self.in_use = true;
        self.last_used = Instant::now();
        Arc::clone(&self.terminal)
    }

    /// Undo a check-out whose terminal never reached a caller
    pub(crate) fn cancel_check_out(&mut self) {
        self.in_use = false;
    }

    /// Record a completed use; returns the new use count
    pub(crate) fn check_in(&mut self) -> u32 {
        self.in_use = false;
        self.last_used = Instant::now();
        self.use_count = self.use_count.saturating_add(1);
        self.use_count
    }

    /// Force the use count so the next release recycles this terminal
    pub(crate) fn mark_for_recycle(&mut self, recycle_after: u32) {
        self.use_count = self.use_count.max(recycle_after);
    }
}
