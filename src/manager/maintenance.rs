//! Periodic maintenance loop

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::manager::TerminalManager;

/// Handle to a running maintenance loop
///
/// The loop stops when the handle is stopped or dropped, or when the manager
/// it maintains is dropped.
#[derive(Debug)]
pub struct MaintenanceHandle {
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl MaintenanceHandle {
    pub(crate) fn spawn(manager: &Arc<TerminalManager>, interval: Duration) -> Self {
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(run(Arc::downgrade(manager), interval, cancel_token.clone()));
        Self {
            cancel_token,
            handle: Some(handle),
        }
    }

    /// Stop the loop and wait for an in-progress pass to finish
    pub async fn stop(mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Maintenance task ended abnormally");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn run(manager: Weak<TerminalManager>, interval: Duration, cancel_token: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    tracing::debug!(interval_ms = interval.as_millis(), "Maintenance loop started");
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(manager) = manager.upgrade() else {
            break;
        };
        manager.perform_maintenance().await;
    }
    tracing::debug!("Maintenance loop stopped");
}
