//! Bounded terminal pool
//!
//! Terminals are reused until they have been released `recycle_after` times,
//! then destroyed and replaced. When every terminal is in use and the pool is
//! at capacity, `acquire` polls until one is released or the acquire timeout
//! elapses.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep};

use super::pooled::PooledTerminal;
use crate::terminal::{Terminal, TerminalAdapter};
use crate::types::{PoolConfig, PoolHealth, Result, TerminalError};

/// What one maintenance pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolMaintenanceReport {
    /// Dead terminals removed
    pub removed: usize,
    /// Replacement terminals created
    pub created: usize,
    /// Idle terminals marked for recycling on their next release
    pub marked_for_recycle: usize,
}

#[derive(Debug, Default)]
struct PoolState {
    terminals: HashMap<String, PooledTerminal>,
    /// FIFO of ids believed available; re-validated on acquire
    available: VecDeque<String>,
    /// Terminals being created outside the lock, counted against `max_size`
    creating: usize,
}

impl PoolState {
    fn occupied(&self) -> usize {
        self.terminals.len() + self.creating
    }
}

/// Bounded pool of adapter-created terminals
///
/// The state lock is never held across an `.await`; adapter calls happen
/// after capacity has been reserved.
#[derive(Debug)]
pub struct TerminalPool {
    adapter: Arc<dyn TerminalAdapter>,
    config: PoolConfig,
    state: Mutex<PoolState>,
    /// Serializes initialize/shutdown; `true` once pre-warmed
    initialized: tokio::sync::Mutex<bool>,
}

impl TerminalPool {
    pub fn new(adapter: Arc<dyn TerminalAdapter>, config: PoolConfig) -> Self {
        Self {
            adapter,
            config,
            state: Mutex::new(PoolState::default()),
            initialized: tokio::sync::Mutex::new(false),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pre-create `min(2, max_size)` terminals in parallel
    ///
    /// Concurrent callers wait for the same initialization; once it has
    /// succeeded, further calls are no-ops.
    pub async fn initialize(&self) -> Result<()> {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return Ok(());
        }

        let missing = {
            let state = self.lock_state();
            self.config.warm_floor().saturating_sub(state.occupied())
        };
        let (created, mut errors) = self.replenish(missing).await;
        if !errors.is_empty() {
            return Err(errors.swap_remove(0));
        }

        *initialized = true;
        tracing::info!(
            max_size = self.config.max_size,
            recycle_after = self.config.recycle_after,
            prewarmed = created,
            "Terminal pool initialized"
        );
        Ok(())
    }

    pub async fn is_initialized(&self) -> bool {
        *self.initialized.lock().await
    }

    /// Take an exclusive terminal, waiting while the pool is exhausted
    pub async fn acquire(&self) -> Result<Arc<dyn Terminal>> {
        let deadline = Instant::now() + self.config.acquire_timeout;
        loop {
            if let Some(terminal) = self.try_acquire().await? {
                return Ok(terminal);
            }
            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    max_size = self.config.max_size,
                    timeout_ms = self.config.acquire_timeout.as_millis(),
                    "No terminal available in pool"
                );
                return Err(TerminalError::PoolTimeout);
            }
            sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    /// One non-blocking acquire attempt
    ///
    /// Hands out the longest-waiting alive terminal, or creates a new one
    /// if the pool has room. Dead terminals found in the queue are dropped.
    async fn try_acquire(&self) -> Result<Option<Arc<dyn Terminal>>> {
        let mut dead = Vec::new();
        let (found, reserved) = {
            let mut state = self.lock_state();
            let mut found = None;
            while let Some(id) = state.available.pop_front() {
                let Some(entry) = state.terminals.get_mut(&id) else {
                    continue;
                };
                if entry.in_use() {
                    continue;
                }
                if entry.terminal().is_alive() {
                    found = Some(entry.check_out());
                    break;
                }
                if let Some(entry) = state.terminals.remove(&id) {
                    tracing::debug!(terminal_id = %id, "Dropping dead terminal from pool");
                    dead.push(Arc::clone(entry.terminal()));
                }
            }
            let reserved = found.is_none() && state.occupied() < self.config.max_size;
            if reserved {
                state.creating += 1;
            }
            (found, reserved)
        };
        let reservation = Reservation::new(self, usize::from(reserved));
        let handout = Handout {
            pool: self,
            terminal: found,
        };

        self.destroy_all(dead).await;

        if let Some(terminal) = handout.hand_over() {
            tracing::trace!(terminal_id = %terminal.id(), "Acquired pooled terminal");
            return Ok(Some(terminal));
        }
        if !reserved {
            return Ok(None);
        }

        let terminal = self.adapter.create_terminal().await?;
        let id = terminal.id().to_string();
        {
            let mut state = self.lock_state();
            state.creating -= reservation.take();
            state
                .terminals
                .insert(id.clone(), PooledTerminal::checked_out(Arc::clone(&terminal)));
        }
        tracing::debug!(terminal_id = %id, "Created terminal on demand");
        Ok(Some(terminal))
    }

    /// Return a terminal to the pool
    ///
    /// Unknown or not-checked-out terminals are ignored with a warning.
    /// A terminal that reached `recycle_after` uses, or died, is destroyed and
    /// replaced.
    pub async fn release(&self, terminal: &Arc<dyn Terminal>) {
        let id = terminal.id();
        let recycled = {
            let mut state = self.lock_state();
            let Some(entry) = state.terminals.get_mut(id) else {
                tracing::warn!(terminal_id = %id, "Released terminal is not tracked by the pool");
                return;
            };
            if !entry.in_use() {
                tracing::warn!(terminal_id = %id, "Released terminal was not in use");
                return;
            }
            let use_count = entry.check_in();
            if use_count >= self.config.recycle_after || !entry.terminal().is_alive() {
                state
                    .terminals
                    .remove(id)
                    .map(|entry| (Arc::clone(entry.terminal()), use_count))
            } else {
                state.available.push_back(id.to_string());
                None
            }
        };

        let Some((terminal, use_count)) = recycled else {
            return;
        };
        tracing::debug!(terminal_id = %terminal.id(), use_count, "Recycling terminal");
        if let Err(e) = self.adapter.destroy_terminal(&terminal).await {
            tracing::warn!(terminal_id = %terminal.id(), error = %e, "Failed to destroy recycled terminal");
        }
        let (_, errors) = self.replenish(1).await;
        for e in errors {
            tracing::warn!(error = %e, "Failed to create replacement terminal");
        }
    }

    /// Derived snapshot of the pool
    pub fn get_health_status(&self) -> PoolHealth {
        let state = self.lock_state();
        let mut health = PoolHealth {
            size: state.terminals.len(),
            ..PoolHealth::default()
        };
        for entry in state.terminals.values() {
            let alive = entry.terminal().is_alive();
            health.healthy |= alive;
            if alive && !entry.in_use() {
                health.available += 1;
            }
            if entry.use_count() >= self.config.recycle_after {
                health.recycled += 1;
            }
        }
        health
    }

    /// Evict dead terminals, restore the warm floor, flag idle terminals
    ///
    /// Idle terminals are not destroyed here; their use count is raised so
    /// that the next release recycles them.
    pub async fn perform_maintenance(&self) -> PoolMaintenanceReport {
        let mut report = PoolMaintenanceReport::default();
        let (dead, missing) = {
            let mut state = self.lock_state();
            let PoolState {
                terminals,
                available,
                ..
            } = &mut *state;

            let dead_ids: Vec<String> = terminals
                .iter()
                .filter(|(_, entry)| !entry.terminal().is_alive())
                .map(|(id, _)| id.clone())
                .collect();
            let dead: Vec<_> = dead_ids
                .iter()
                .filter_map(|id| terminals.remove(id))
                .map(|entry| Arc::clone(entry.terminal()))
                .collect();
            available.retain(|id| terminals.contains_key(id));
            report.removed = dead.len();

            let now = Instant::now();
            for entry in terminals.values_mut() {
                let idle = now.saturating_duration_since(entry.last_used());
                if !entry.in_use()
                    && idle > self.config.idle_recycle_after
                    && entry.use_count() < self.config.recycle_after
                {
                    entry.mark_for_recycle(self.config.recycle_after);
                    report.marked_for_recycle += 1;
                }
            }

            (
                dead,
                self.config.warm_floor().saturating_sub(state.occupied()),
            )
        };

        self.destroy_all(dead).await;

        let (created, errors) = self.replenish(missing).await;
        report.created = created;
        for e in errors {
            tracing::warn!(error = %e, "Failed to replenish terminal pool during maintenance");
        }

        if report != PoolMaintenanceReport::default() {
            tracing::debug!(
                removed = report.removed,
                created = report.created,
                marked_for_recycle = report.marked_for_recycle,
                "Pool maintenance"
            );
        }
        report
    }

    /// Destroy every terminal and reset the pool
    pub async fn shutdown(&self) {
        let mut initialized = self.initialized.lock().await;
        let terminals: Vec<_> = {
            let mut state = self.lock_state();
            state.available.clear();
            state
                .terminals
                .drain()
                .map(|(_, entry)| Arc::clone(entry.terminal()))
                .collect()
        };
        let count = terminals.len();
        self.destroy_all(terminals).await;
        *initialized = false;
        tracing::info!(destroyed = count, "Terminal pool shut down");
    }

    /// Total tracked terminals
    pub fn size(&self) -> usize {
        self.lock_state().terminals.len()
    }

    /// Terminals currently checked out
    pub fn in_use_count(&self) -> usize {
        self.lock_state()
            .terminals
            .values()
            .filter(|entry| entry.in_use())
            .count()
    }

    /// Snapshot of one tracked terminal
    pub fn get(&self, terminal_id: &str) -> Option<PooledTerminal> {
        self.lock_state().terminals.get(terminal_id).cloned()
    }

    /// Create up to `wanted` available terminals without exceeding `max_size`
    async fn replenish(&self, wanted: usize) -> (usize, Vec<TerminalError>) {
        let count = {
            let mut state = self.lock_state();
            let room = self.config.max_size.saturating_sub(state.occupied());
            let count = wanted.min(room);
            state.creating += count;
            count
        };
        if count == 0 {
            return (0, Vec::new());
        }
        let reservation = Reservation::new(self, count);

        let results = join_all((0..count).map(|_| self.adapter.create_terminal())).await;

        let mut created = 0;
        let mut errors = Vec::new();
        let mut state = self.lock_state();
        state.creating -= reservation.take();
        for result in results {
            match result {
                Ok(terminal) => {
                    let id = terminal.id().to_string();
                    tracing::debug!(terminal_id = %id, "Created pooled terminal");
                    state
                        .terminals
                        .insert(id.clone(), PooledTerminal::available(terminal));
                    state.available.push_back(id);
                    created += 1;
                }
                Err(e) => errors.push(e),
            }
        }
        (created, errors)
    }

    async fn destroy_all(&self, terminals: Vec<Arc<dyn Terminal>>) {
        let results = join_all(terminals.iter().map(|t| self.adapter.destroy_terminal(t))).await;
        for (terminal, result) in terminals.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(terminal_id = %terminal.id(), error = %e, "Failed to destroy terminal");
            }
        }
    }
}

/// A terminal checked out by `try_acquire` that has not reached the caller
///
/// Dropped before [`Handout::hand_over`], the terminal goes back to the
/// front of the available queue.
struct Handout<'a> {
    pool: &'a TerminalPool,
    terminal: Option<Arc<dyn Terminal>>,
}

impl Handout<'_> {
    fn hand_over(mut self) -> Option<Arc<dyn Terminal>> {
        self.terminal.take()
    }
}

impl Drop for Handout<'_> {
    fn drop(&mut self) {
        let Some(terminal) = self.terminal.take() else {
            return;
        };
        let id = terminal.id();
        let mut state = self.pool.lock_state();
        let returned = match state.terminals.get_mut(id) {
            Some(entry) if entry.in_use() => {
                entry.cancel_check_out();
                true
            }
            _ => false,
        };
        if returned {
            state.available.push_front(id.to_string());
            tracing::debug!(terminal_id = %id, "Returned terminal of abandoned acquire");
        }
    }
}

/// Capacity reserved for terminals being created
///
/// Returned to the pool on drop unless taken, so a cancelled acquire cannot
/// leak capacity.
struct Reservation<'a> {
    pool: &'a TerminalPool,
    count: usize,
}

impl<'a> Reservation<'a> {
    fn new(pool: &'a TerminalPool, count: usize) -> Self {
        Self { pool, count }
    }

    /// Hand the reserved count to the caller, who adjusts `creating` itself
    fn take(mut self) -> usize {
        std::mem::take(&mut self.count)
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.count > 0 {
            let mut state = self.pool.lock_state();
            state.creating = state.creating.saturating_sub(self.count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::testing::MockAdapter;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::time::Duration;

    fn pool_with(adapter: &Arc<MockAdapter>, max_size: usize, recycle_after: u32) -> TerminalPool {
        TerminalPool::new(
            Arc::clone(adapter) as Arc<dyn TerminalAdapter>,
            PoolConfig::new(max_size, recycle_after),
        )
    }

    #[tokio::test]
    async fn test_initialize_prewarms_floor() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 5, 10);
        pool.initialize().await.unwrap();
        assert_eq!(pool.size(), 2);
        assert_eq!(adapter.created_count(), 2);

        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 1, 10);
        pool.initialize().await.unwrap();
        assert_eq!(pool.size(), 1);
    }

    #[tokio::test]
    async fn test_initialize_is_memoized() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 5, 10);

        let (a, b) = tokio::join!(pool.initialize(), pool.initialize());
        a.unwrap();
        b.unwrap();
        pool.initialize().await.unwrap();

        assert_eq!(adapter.created_count(), 2);
        assert!(pool.is_initialized().await);
    }

    #[tokio::test]
    async fn test_initialize_propagates_create_failure() {
        let adapter = MockAdapter::new();
        adapter.set_fail_create(true);
        let pool = pool_with(&adapter, 3, 10);

        let err = pool.initialize().await.unwrap_err();
        assert!(matches!(err, TerminalError::Adapter { .. }));
        assert!(!pool.is_initialized().await);
        assert_eq!(pool.lock_state().creating, 0);
    }

    #[tokio::test]
    async fn test_acquire_is_exclusive() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 4, 10);
        pool.initialize().await.unwrap();

        let terminals = join_all((0..4).map(|_| pool.acquire())).await;
        let ids: HashSet<String> = terminals
            .into_iter()
            .map(|t| t.unwrap().id().to_string())
            .collect();

        assert_eq!(ids.len(), 4);
        assert_eq!(pool.size(), 4);
        assert_eq!(pool.in_use_count(), 4);
        assert_eq!(pool.get_health_status().available, 0);
    }

    #[tokio::test]
    async fn test_released_terminals_are_reused_fifo() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 3, 10);
        pool.initialize().await.unwrap();

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        pool.release(&b).await;
        pool.release(&a).await;

        assert_eq!(pool.acquire().await.unwrap().id(), b.id());
        assert_eq!(pool.acquire().await.unwrap().id(), a.id());
    }

    #[tokio::test]
    async fn test_recycles_after_use_count() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 1, 3);
        pool.initialize().await.unwrap();

        let first = pool.acquire().await.unwrap();
        for _ in 0..2 {
            pool.release(&first).await;
            let again = pool.acquire().await.unwrap();
            assert_eq!(again.id(), first.id());
        }
        assert_eq!(pool.get(first.id()).unwrap().use_count(), 2);

        pool.release(&first).await;

        assert!(pool.get(first.id()).is_none());
        assert!(!first.is_alive());
        assert_eq!(adapter.destroyed_count(), 1);
        assert_eq!(adapter.created_count(), 2);
        assert_eq!(pool.size(), 1);
        assert_ne!(pool.acquire().await.unwrap().id(), first.id());
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_times_out_when_exhausted() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 1, 10);
        pool.initialize().await.unwrap();
        let _held = pool.acquire().await.unwrap();

        let started = Instant::now();
        let err = pool.acquire().await.unwrap_err();

        assert!(matches!(err, TerminalError::PoolTimeout));
        assert!(err.is_retryable());
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert!(started.elapsed() < Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_acquire_gets_released_terminal_then_recycles() {
        let adapter = MockAdapter::new();
        let pool = Arc::new(pool_with(&adapter, 2, 2));
        pool.initialize().await.unwrap();

        let t1 = pool.acquire().await.unwrap();
        let _t2 = pool.acquire().await.unwrap();

        let waiter = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire().await })
        };
        sleep(Duration::from_millis(250)).await;
        assert!(!waiter.is_finished());

        pool.release(&t1).await;
        let reacquired = waiter.await.unwrap().unwrap();
        assert_eq!(reacquired.id(), t1.id());
        assert_eq!(pool.get(t1.id()).unwrap().use_count(), 1);

        pool.release(&reacquired).await;

        assert!(pool.get(t1.id()).is_none());
        assert_eq!(adapter.destroyed_count(), 1);
        assert_eq!(adapter.created_count(), 3);
        assert_eq!(pool.size(), 2);
    }

    #[tokio::test]
    async fn test_release_unknown_or_idle_is_noop() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 2, 10);
        pool.initialize().await.unwrap();

        let other = MockAdapter::new();
        for _ in 0..3 {
            other.create_terminal().await.unwrap();
        }
        let stranger = other.create_terminal().await.unwrap();
        assert!(pool.get(stranger.id()).is_none());
        pool.release(&stranger).await;

        let t = pool.acquire().await.unwrap();
        pool.release(&t).await;
        pool.release(&t).await;

        assert_eq!(pool.get(t.id()).unwrap().use_count(), 1);
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.lock_state().available.len(), 2);
    }

    #[tokio::test]
    async fn test_acquire_skips_dead_terminals() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 2, 10);
        pool.initialize().await.unwrap();
        adapter.kill("mock-1");

        let t = pool.acquire().await.unwrap();

        assert_eq!(t.id(), "mock-2");
        assert!(pool.get("mock-1").is_none());
        assert_eq!(adapter.destroyed_count(), 1);
    }

    #[tokio::test]
    async fn test_abandoned_acquire_returns_terminal() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 2, 10);
        pool.initialize().await.unwrap();
        adapter.kill("mock-1");
        adapter.set_destroy_delay(Duration::from_millis(200));

        // Parked while the dead terminal is being destroyed, then dropped
        let mut acquire = tokio_test::task::spawn(pool.acquire());
        tokio_test::assert_pending!(acquire.poll());
        assert_eq!(pool.in_use_count(), 1);
        drop(acquire);

        assert_eq!(pool.in_use_count(), 0);
        assert_eq!(pool.get("mock-2").unwrap().use_count(), 0);

        adapter.set_destroy_delay(Duration::ZERO);
        let t = pool.acquire().await.unwrap();
        assert_eq!(t.id(), "mock-2");
        assert_eq!(pool.in_use_count(), 1);
    }

    #[tokio::test]
    async fn test_dead_terminal_is_replaced_on_release() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 2, 10);
        pool.initialize().await.unwrap();

        let t = pool.acquire().await.unwrap();
        adapter.kill(t.id());
        pool.release(&t).await;

        assert!(pool.get(t.id()).is_none());
        assert_eq!(pool.size(), 2);
        assert_eq!(adapter.created_count(), 3);
    }

    #[tokio::test]
    async fn test_maintenance_replaces_dead_terminal() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 2, 10);
        pool.initialize().await.unwrap();
        adapter.kill("mock-1");

        let report = pool.perform_maintenance().await;

        assert_eq!(
            report,
            PoolMaintenanceReport {
                removed: 1,
                created: 1,
                marked_for_recycle: 0,
            }
        );
        assert_eq!(pool.size(), 2);
        assert!(pool.get("mock-1").is_none());
        assert!(!pool.lock_state().available.contains(&"mock-1".to_string()));
    }

    #[tokio::test]
    async fn test_maintenance_keeps_floor_only() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 5, 10);
        pool.initialize().await.unwrap();
        let held: Vec<_> = join_all((0..4).map(|_| pool.acquire()))
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();
        adapter.kill(held[0].id());

        let report = pool.perform_maintenance().await;

        assert_eq!(report.removed, 1);
        assert_eq!(report.created, 0);
        assert_eq!(pool.size(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_terminals_are_marked_not_destroyed() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 2, 10);
        pool.initialize().await.unwrap();

        tokio::time::advance(Duration::from_secs(6 * 60)).await;
        let report = pool.perform_maintenance().await;

        assert_eq!(report.marked_for_recycle, 2);
        assert_eq!(adapter.destroyed_count(), 0);
        assert_eq!(pool.size(), 2);
        assert_eq!(pool.get_health_status().recycled, 2);

        let t = pool.acquire().await.unwrap();
        pool.release(&t).await;
        assert!(pool.get(t.id()).is_none());
        assert_eq!(adapter.destroyed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recently_used_terminals_are_not_marked() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 2, 10);
        pool.initialize().await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        let report = pool.perform_maintenance().await;
        assert_eq!(report.marked_for_recycle, 0);
    }

    #[tokio::test]
    async fn test_health_status() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 3, 10);
        assert!(!pool.get_health_status().healthy);

        pool.initialize().await.unwrap();
        let _t = pool.acquire().await.unwrap();
        let health = pool.get_health_status();
        assert_eq!(
            health,
            PoolHealth {
                healthy: true,
                size: 2,
                available: 1,
                recycled: 0,
            }
        );

        adapter.kill("mock-1");
        adapter.kill("mock-2");
        assert!(!pool.get_health_status().healthy);
    }

    #[tokio::test]
    async fn test_shutdown_destroys_everything() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 3, 10);
        pool.initialize().await.unwrap();
        let _t = pool.acquire().await.unwrap();

        pool.shutdown().await;

        assert_eq!(pool.size(), 0);
        assert_eq!(adapter.destroyed_count(), 2);
        assert!(!pool.is_initialized().await);

        pool.initialize().await.unwrap();
        assert_eq!(pool.size(), 2);
    }

    #[tokio::test]
    async fn test_acquire_create_failure_releases_reservation() {
        let adapter = MockAdapter::new();
        let pool = pool_with(&adapter, 1, 10);
        adapter.set_fail_create(true);

        assert!(pool.acquire().await.is_err());
        assert_eq!(pool.lock_state().creating, 0);

        adapter.set_fail_create(false);
        assert!(pool.acquire().await.is_ok());
    }
}
