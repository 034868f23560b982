//! Output listeners of a session
//!
//! Listeners receive the echoed command, the command output and, when the
//! terminal supports it, the raw output the terminal streams natively.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dashmap::DashMap;

use crate::terminal::{ListenerId, OutputListener, Terminal};

/// Listener set of one session
pub struct OutputListeners {
    terminal: Arc<dyn Terminal>,
    listeners: DashMap<u64, OutputListener>,
    /// Native registrations on the terminal, keyed by our listener id
    native: DashMap<u64, ListenerId>,
    next_id: AtomicU64,
}

impl OutputListeners {
    pub fn new(terminal: Arc<dyn Terminal>) -> Self {
        Self {
            terminal,
            listeners: DashMap::new(),
            native: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener, also on the terminal if it streams output
    pub fn subscribe(self: &Arc<Self>, listener: OutputListener) -> OutputSubscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.insert(id, Arc::clone(&listener));
        if let Some(native_id) = self.terminal.add_output_listener(listener) {
            self.native.insert(id, native_id);
        }
        OutputSubscription {
            registry: Arc::clone(self),
            id,
            active: AtomicBool::new(true),
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.listeners.remove(&id);
        if let Some((_, native_id)) = self.native.remove(&id) {
            self.terminal.remove_output_listener(native_id);
        }
    }

    /// Call every listener with `chunk`
    pub fn emit(&self, chunk: &str) {
        // Snapshot so a listener may unsubscribe while being called
        let listeners: Vec<OutputListener> =
            self.listeners.iter().map(|r| Arc::clone(r.value())).collect();
        for listener in listeners {
            listener(chunk);
        }
    }

    /// Remove every listener, including native registrations
    pub fn clear(&self) {
        let ids: Vec<u64> = self.listeners.iter().map(|r| *r.key()).collect();
        for id in ids {
            self.unsubscribe(id);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl std::fmt::Debug for OutputListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputListeners")
            .field("terminal_id", &self.terminal.id())
            .field("count", &self.listeners.len())
            .field("native", &self.native.len())
            .finish()
    }
}

/// Handle returned by `stream_output`
///
/// Dropping the handle keeps the listener registered; call
/// [`OutputSubscription::unsubscribe`] to remove it. Unsubscribing twice is
/// harmless.
#[derive(Debug)]
pub struct OutputSubscription {
    registry: Arc<OutputListeners>,
    id: u64,
    active: AtomicBool,
}

impl OutputSubscription {
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            self.registry.unsubscribe(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && self.registry.listeners.contains_key(&self.id)
    }
}
