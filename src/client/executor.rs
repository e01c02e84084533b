//! Query execution on top of the managed connection

use super::config::ClientConfig;
use super::driver::{Driver, QueryOutput, QueryParams};
use crate::connection::{ConnectionHandle, ConnectionManager};
use crate::stream::{collect_rows, Cursor, CursorStream, StreamOptions};
use crate::{Error, Result};
use serde_json::Value;
use std::sync::Arc;

/// Option that selects raw cursor output; never forwarded to the driver
const CURSOR_OPTION: &str = "cursor";

/// Options for [`QueryExecutor::run`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    /// Return the raw cursor instead of materialized rows
    pub cursor: bool,
    /// Options forwarded to the driver
    pub params: QueryParams,
}

impl RunOptions {
    /// Options requesting the raw cursor
    pub fn cursor() -> Self {
        Self {
            cursor: true,
            ..Self::default()
        }
    }

    /// Add a driver option
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Split a JSON options object into the `cursor` flag and driver options
    pub fn from_json(value: Value) -> Result<Self> {
        let mut params = match value {
            Value::Object(map) => map,
            Value::Null => QueryParams::new(),
            other => {
                return Err(Error::Config(format!(
                    "run options must be an object, got {}",
                    other
                )))
            }
        };

        let cursor = match params.remove(CURSOR_OPTION) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => flag,
            Some(other) => {
                return Err(Error::Config(format!(
                    "run option `cursor` must be a boolean, got {}",
                    other
                )))
            }
        };

        Ok(Self { cursor, params })
    }
}

/// Result of [`QueryExecutor::run`]
pub enum RunOutput<C: Cursor> {
    /// All rows, in cursor order
    Rows(Vec<C::Row>),
    /// The raw cursor, for manual pagination
    Cursor(C),
    /// A single value produced without a cursor
    Value(C::Row),
}

impl<C: Cursor> RunOutput<C> {
    /// Materialized rows, if that is what the query produced
    pub fn into_rows(self) -> Option<Vec<C::Row>> {
        match self {
            RunOutput::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    /// The raw cursor, if requested
    pub fn into_cursor(self) -> Option<C> {
        match self {
            RunOutput::Cursor(cursor) => Some(cursor),
            _ => None,
        }
    }

    /// Whether this is a raw cursor
    pub fn is_cursor(&self) -> bool {
        matches!(self, RunOutput::Cursor(_))
    }
}

/// Runs queries against the managed connection
///
/// Wraps the driver's execute primitive: the current connection is supplied
/// automatically, cursors are materialized unless asked for, and results can
/// be consumed as a [`CursorStream`].
pub struct QueryExecutor<D: Driver> {
    manager: ConnectionManager<D>,
    stream_options: StreamOptions,
}

impl<D: Driver> Clone for QueryExecutor<D> {
    fn clone(&self) -> Self {
        Self {
            manager: self.manager.clone(),
            stream_options: self.stream_options,
        }
    }
}

impl<D: Driver> std::fmt::Debug for QueryExecutor<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryExecutor")
            .field("manager", &self.manager)
            .field("stream_options", &self.stream_options)
            .finish()
    }
}

impl<D: Driver> QueryExecutor<D> {
    /// Validate the configuration, start the connection manager and wait for
    /// the first connect attempt
    ///
    /// Only configuration errors are returned. A failed first attempt is
    /// retried in the background; queries fail with
    /// [`Error::NotConnected`] until a connection is up.
    pub async fn connect(driver: D, config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let manager = ConnectionManager::new(Arc::new(driver), config);
        manager.connect().await;
        Ok(Self::new(manager))
    }

    /// Wrap an existing manager
    pub fn new(manager: ConnectionManager<D>) -> Self {
        let stream_options = StreamOptions::from(manager.config());
        Self {
            manager,
            stream_options,
        }
    }

    /// Override stream tuning for [`to_stream`](Self::to_stream)
    pub fn with_stream_options(mut self, options: StreamOptions) -> Self {
        self.stream_options = options;
        self
    }

    /// The connection manager
    pub fn manager(&self) -> &ConnectionManager<D> {
        &self.manager
    }

    /// Run a query
    ///
    /// Uses `connection` when given, otherwise the current connection.
    pub async fn run(
        &self,
        connection: Option<&ConnectionHandle<D::Connection>>,
        query: &D::Query,
        options: RunOptions,
    ) -> Result<RunOutput<D::Cursor>> {
        let conn = match connection {
            Some(conn) => conn.clone(),
            None => self.manager.current_handle().ok_or(Error::NotConnected)?,
        };

        let RunOptions { cursor, mut params } = options;
        params.remove(CURSOR_OPTION);

        let output = self.manager.driver().execute(&conn, query, &params).await?;
        match output {
            QueryOutput::Cursor(c) if cursor => Ok(RunOutput::Cursor(c)),
            QueryOutput::Cursor(c) => Ok(RunOutput::Rows(collect_rows(c).await?)),
            QueryOutput::Value(value) => Ok(RunOutput::Value(value)),
        }
    }

    /// Run a query on the current connection and stream its rows
    ///
    /// `params` are passed to the driver unchanged.
    pub async fn to_stream(
        &self,
        query: &D::Query,
        params: QueryParams,
    ) -> Result<CursorStream<<D::Cursor as Cursor>::Row>> {
        let conn = self.manager.current_handle().ok_or(Error::NotConnected)?;

        let cursor = match self.manager.driver().execute(&conn, query, &params).await? {
            QueryOutput::Cursor(c) => Some(c),
            QueryOutput::Value(_) => {
                tracing::debug!("query produced a single value, stream has no cursor");
                None
            }
        };

        CursorStream::new(cursor, &conn, self.stream_options).await
    }
}
