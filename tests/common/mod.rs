//! Shared test doubles: an in-memory driver with scripted connect outcomes

#![allow(dead_code)]

use durable_cursor::{
    ClientConfig, ConnectionHandle, Cursor, Driver, Error, QueryOutput, QueryParams, Result,
};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Route crate logs to the test output (`RUST_LOG=durable_cursor=debug`)
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config(reconnect_interval_ms: u64) -> ClientConfig {
    ClientConfig::builder("localhost")
        .db("test")
        .reconnect_interval(Duration::from_millis(reconnect_interval_ms))
        .build()
}

/// Driver-side connection object
#[derive(Debug)]
pub struct MockConnection;

/// Counts cursor calls across every cursor a driver hands out
#[derive(Debug, Default)]
pub struct CursorProbe {
    pub fetches: AtomicUsize,
    pub closes: AtomicUsize,
}

impl CursorProbe {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Yields its rows, then reports exhaustion as an error
pub struct MockCursor {
    rows: VecDeque<Value>,
    probe: Arc<CursorProbe>,
}

impl Cursor for MockCursor {
    type Row = Value;

    async fn next(&mut self) -> Result<Option<Value>> {
        self.probe.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.rows.pop_front().map(Some).ok_or(Error::CursorExhausted)
    }

    async fn close(&mut self) -> Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct MockState {
    /// `false` entries fail the corresponding attempt; empty means succeed
    plan: Mutex<VecDeque<bool>>,
    attempts: Mutex<Vec<Instant>>,
    handles: Mutex<Vec<ConnectionHandle<MockConnection>>>,
    tables: Mutex<HashMap<String, Vec<Value>>>,
    executed: Mutex<Vec<(u64, QueryParams)>>,
    probe: Arc<CursorProbe>,
}

/// In-memory driver; clones share state so tests can inspect it
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<MockState>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` connect attempts
    pub fn fail_next(self, n: usize) -> Self {
        self.state.plan.lock().unwrap().extend(std::iter::repeat(false).take(n));
        self
    }

    pub fn with_table(self, name: &str, rows: Vec<Value>) -> Self {
        self.state.tables.lock().unwrap().insert(name.to_string(), rows);
        self
    }

    pub fn attempts(&self) -> usize {
        self.state.attempts.lock().unwrap().len()
    }

    /// Attempt times relative to `start`
    pub fn attempt_offsets(&self, start: Instant) -> Vec<Duration> {
        self.state
            .attempts
            .lock()
            .unwrap()
            .iter()
            .map(|t| t.duration_since(start))
            .collect()
    }

    pub fn last_handle(&self) -> ConnectionHandle<MockConnection> {
        self.state.handles.lock().unwrap().last().cloned().expect("no connection yet")
    }

    /// `(connection id, params)` of every executed query
    pub fn executed(&self) -> Vec<(u64, QueryParams)> {
        self.state.executed.lock().unwrap().clone()
    }

    pub fn probe(&self) -> Arc<CursorProbe> {
        Arc::clone(&self.state.probe)
    }
}

impl Driver for MockDriver {
    type Connection = MockConnection;
    type Cursor = MockCursor;
    /// Table name, or `value:<json>` for a single-value result
    type Query = String;

    async fn connect(&self, _config: &ClientConfig) -> Result<ConnectionHandle<MockConnection>> {
        self.state.attempts.lock().unwrap().push(Instant::now());
        let succeed = self.state.plan.lock().unwrap().pop_front().unwrap_or(true);
        if !succeed {
            return Err(Error::Connection("connection refused".into()));
        }
        let handle = ConnectionHandle::new(MockConnection);
        self.state.handles.lock().unwrap().push(handle.clone());
        Ok(handle)
    }

    async fn execute(
        &self,
        conn: &ConnectionHandle<MockConnection>,
        query: &String,
        params: &QueryParams,
    ) -> Result<QueryOutput<MockCursor>> {
        self.state.executed.lock().unwrap().push((conn.id(), params.clone()));
        if !conn.is_open() {
            return Err(Error::Connection("connection closed".into()));
        }

        if let Some(raw) = query.strip_prefix("value:") {
            let value = serde_json::from_str(raw).map_err(Error::driver)?;
            return Ok(QueryOutput::Value(value));
        }

        let rows = self
            .state
            .tables
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .ok_or_else(|| Error::Cursor(format!("table `{}` does not exist", query)))?;

        Ok(QueryOutput::Cursor(MockCursor {
            rows: rows.into(),
            probe: self.probe(),
        }))
    }
}
