//! Connection manager: connect, monitor, reconnect
//!
//! The manager owns the single "current" connection. It drives the state
//! machine in [`ManagerState`] on its own: a failed attempt or a closed
//! connection schedules another attempt after the configured reconnect
//! interval, forever. Callers never see connection failures; they only ever
//! read a snapshot of the current handle.
//!
//! Background tasks (close monitor, reconnect timer) only hold a weak
//! reference to the manager, so dropping the last manager clone stops them.

use super::handle::ConnectionHandle;
use super::state::ManagerState;
use crate::client::{ClientConfig, Driver};
use crate::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::Instrument;

/// Reconnect timer bookkeeping
struct ReconnectState {
    /// A timer is armed and has not fired yet
    pending: AtomicBool,
    interval: Duration,
    /// Timers started over the manager's lifetime
    scheduled: AtomicU64,
}

struct ManagerInner<D: Driver> {
    driver: Arc<D>,
    config: ClientConfig,
    current: Mutex<Option<ConnectionHandle<D::Connection>>>,
    state: watch::Sender<ManagerState>,
    reconnect: ReconnectState,
}

/// Keeps one connection alive, reconnecting on a fixed interval
pub struct ConnectionManager<D: Driver> {
    inner: Arc<ManagerInner<D>>,
}

impl<D: Driver> Clone for ConnectionManager<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: Driver> fmt::Debug for ConnectionManager<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.state())
            .field("reconnect_pending", &self.reconnect_pending())
            .finish_non_exhaustive()
    }
}

impl<D: Driver> ConnectionManager<D> {
    /// Create a manager in the `Disconnected` state
    ///
    /// Nothing happens until [`connect`](Self::connect) is called.
    pub fn new(driver: Arc<D>, config: ClientConfig) -> Self {
        let (state, _) = watch::channel(ManagerState::Disconnected);
        let interval = config.reconnect_interval();
        Self {
            inner: Arc::new(ManagerInner {
                driver,
                config,
                current: Mutex::new(None),
                state,
                reconnect: ReconnectState {
                    pending: AtomicBool::new(false),
                    interval,
                    scheduled: AtomicU64::new(0),
                },
            }),
        }
    }

    /// Attempt to connect once
    ///
    /// Resolves when this attempt finishes. On failure a reconnect is
    /// scheduled and retried in the background; the error is only logged.
    /// Does nothing while an attempt is in flight or a connection is current.
    pub async fn connect(&self) {
        self.inner.connect().await;
    }

    /// Arm the reconnect timer unless one is already pending
    pub fn schedule_reconnect(&self) {
        self.inner.schedule_reconnect();
    }

    /// Snapshot of the current connection, if any
    pub fn current_handle(&self) -> Option<ConnectionHandle<D::Connection>> {
        self.inner.current_slot().clone()
    }

    /// Current state
    pub fn state(&self) -> ManagerState {
        *self.inner.state.borrow()
    }

    /// Receive state transitions
    pub fn subscribe(&self) -> watch::Receiver<ManagerState> {
        self.inner.state.subscribe()
    }

    /// Wait until a connection is current and return it
    pub async fn connected(&self) -> ConnectionHandle<D::Connection> {
        let mut rx = self.subscribe();
        loop {
            if let Some(handle) = self.current_handle().filter(|h| h.status().is_live()) {
                return handle;
            }
            // The sender lives as long as `self`
            let _ = rx.wait_for(|s| *s == ManagerState::Connected).await;
            if let Some(handle) = self.current_handle().filter(|h| h.status().is_live()) {
                return handle;
            }
            let _ = rx.changed().await;
        }
    }

    /// Whether a reconnect timer is armed
    pub fn reconnect_pending(&self) -> bool {
        self.inner.reconnect.pending.load(Ordering::Acquire)
    }

    /// Number of reconnect timers started so far
    pub fn reconnects_scheduled(&self) -> u64 {
        self.inner.reconnect.scheduled.load(Ordering::Relaxed)
    }

    /// Configuration used for every attempt
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn driver(&self) -> &Arc<D> {
        &self.inner.driver
    }
}

impl<D: Driver> ManagerInner<D> {
    fn current_slot(&self) -> MutexGuard<'_, Option<ConnectionHandle<D::Connection>>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, next: ManagerState) -> bool {
        self.state.send_if_modified(|state| state.transition(next).is_ok())
    }

    async fn attempt(&self) -> Result<ConnectionHandle<D::Connection>> {
        let connect = self.driver.connect(&self.config);
        match self.config.connect_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| Error::ConnectTimeout(timeout))?,
            None => connect.await,
        }
    }

    async fn connect(self: &Arc<Self>) {
        if !self.transition(ManagerState::Connecting) {
            let state = *self.state.borrow();
            tracing::debug!(%state, "connect skipped");
            return;
        }

        crate::metrics::counters::connect_attempted();
        let start = std::time::Instant::now();

        let result = self
            .attempt()
            .instrument(tracing::info_span!(
                "connect",
                host = %self.config.host,
                port = ?self.config.port
            ))
            .await;

        match result {
            Ok(handle) => {
                crate::metrics::histograms::connect_duration(start.elapsed().as_millis() as u64);
                *self.current_slot() = Some(handle.clone());
                self.transition(ManagerState::Connected);
                tracing::info!(connection = handle.id(), "connection success");
                self.monitor(&handle);
            }
            Err(e) => {
                self.current_slot().take();
                self.transition(ManagerState::Disconnected);
                crate::metrics::counters::connect_failed(e.category());
                tracing::warn!(error = %e, "connection error");
                self.schedule_reconnect();
            }
        }
    }

    /// Watch a connection for close and error notifications
    fn monitor(self: &Arc<Self>, handle: &ConnectionHandle<D::Connection>) {
        let id = handle.id();
        let mut status = handle.watch_status();
        let mut errors = handle.subscribe_errors();
        let weak: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = status.closed() => break,
                    event = errors.recv() => match event {
                        // Transient: the connection is still up, so no transition
                        Ok(message) => {
                            crate::metrics::counters::connection_error();
                            tracing::warn!(connection = id, "connection error event: {}", message);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(connection = id, skipped, "connection error events dropped");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }

            if let Some(inner) = weak.upgrade() {
                inner.on_closed(id);
            }
        });
    }

    fn on_closed(self: &Arc<Self>, id: u64) {
        let was_current = {
            let mut current = self.current_slot();
            if current.as_ref().is_some_and(|h| h.id() == id) {
                *current = None;
                true
            } else {
                false
            }
        };

        if !was_current {
            tracing::debug!(connection = id, "stale connection closed");
            return;
        }

        self.transition(ManagerState::Disconnected);
        crate::metrics::counters::connection_lost();
        tracing::warn!(connection = id, "connection closed, reconnect");
        self.schedule_reconnect();
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        if self
            .reconnect
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("reconnect already pending");
            return;
        }

        let interval = self.reconnect.interval;
        self.reconnect.scheduled.fetch_add(1, Ordering::Relaxed);
        crate::metrics::counters::reconnect_scheduled();
        tracing::warn!("reconnect in {} ms", interval.as_millis());

        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.reconnect.pending.store(false, Ordering::Release);
            inner.connect().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{QueryOutput, QueryParams};
    use crate::stream::Cursor;
    use std::sync::atomic::AtomicUsize;

    struct NoCursor;

    impl Cursor for NoCursor {
        type Row = ();

        async fn next(&mut self) -> Result<Option<()>> {
            Ok(None)
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    /// Fails the first `failures` attempts, then hands out handles
    struct FlakyDriver {
        failures: usize,
        attempts: AtomicUsize,
        handles: Mutex<Vec<ConnectionHandle<()>>>,
    }

    impl FlakyDriver {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self {
                failures,
                attempts: AtomicUsize::new(0),
                handles: Mutex::new(Vec::new()),
            })
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }

        fn last_handle(&self) -> ConnectionHandle<()> {
            self.handles.lock().unwrap().last().cloned().expect("no handle yet")
        }
    }

    impl Driver for FlakyDriver {
        type Connection = ();
        type Cursor = NoCursor;
        type Query = ();

        async fn connect(&self, _config: &ClientConfig) -> Result<ConnectionHandle<()>> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(Error::Connection("refused".into()));
            }
            let handle = ConnectionHandle::new(());
            self.handles.lock().unwrap().push(handle.clone());
            Ok(handle)
        }

        async fn execute(
            &self,
            _conn: &ConnectionHandle<()>,
            _query: &(),
            _params: &QueryParams,
        ) -> Result<QueryOutput<NoCursor>> {
            Ok(QueryOutput::Value(()))
        }
    }

    fn config(interval_ms: u64) -> ClientConfig {
        ClientConfig {
            reconnect_interval_ms: interval_ms,
            ..ClientConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state_is_disconnected() {
        let manager = ConnectionManager::new(FlakyDriver::new(0), config(1000));
        assert_eq!(manager.state(), ManagerState::Disconnected);
        assert!(manager.current_handle().is_none());
        assert!(!manager.reconnect_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_success_sets_current() {
        let driver = FlakyDriver::new(0);
        let manager = ConnectionManager::new(driver.clone(), config(1000));

        manager.connect().await;

        assert_eq!(manager.state(), ManagerState::Connected);
        let handle = manager.current_handle().expect("connected");
        assert!(handle.same_connection(&driver.last_handle()));
        assert_eq!(manager.reconnects_scheduled(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_schedules_reconnect() {
        let manager = ConnectionManager::new(FlakyDriver::new(1), config(1000));

        manager.connect().await;

        assert_eq!(manager.state(), ManagerState::Disconnected);
        assert!(manager.current_handle().is_none());
        assert!(manager.reconnect_pending());
        assert_eq!(manager.reconnects_scheduled(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_is_noop_while_pending() {
        let manager = ConnectionManager::new(FlakyDriver::new(0), config(1000));

        manager.schedule_reconnect();
        manager.schedule_reconnect();
        manager.schedule_reconnect();

        assert_eq!(manager.reconnects_scheduled(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_is_noop_when_connected() {
        let driver = FlakyDriver::new(0);
        let manager = ConnectionManager::new(driver.clone(), config(1000));

        manager.connect().await;
        manager.connect().await;

        assert_eq!(driver.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_clears_current_and_reconnects() {
        let driver = FlakyDriver::new(0);
        let manager = ConnectionManager::new(driver.clone(), config(1000));
        manager.connect().await;
        let first = manager.current_handle().unwrap();

        first.mark_closed();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(manager.current_handle().is_none());
        assert_eq!(manager.state(), ManagerState::Disconnected);
        assert_eq!(manager.reconnects_scheduled(), 1);

        let second = manager.connected().await;
        assert!(!second.same_connection(&first));
        assert_eq!(driver.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_event_does_not_reconnect() {
        let driver = FlakyDriver::new(0);
        let manager = ConnectionManager::new(driver.clone(), config(1000));
        manager.connect().await;

        manager.current_handle().unwrap().report_error("transient");
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(manager.state(), ManagerState::Connected);
        assert_eq!(manager.reconnects_scheduled(), 0);
        assert_eq!(driver.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_manager_stops_retries() {
        let driver = FlakyDriver::new(usize::MAX);
        let manager = ConnectionManager::new(driver.clone(), config(1000));
        manager.connect().await;
        drop(manager);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(driver.attempts(), 1);
    }
}
