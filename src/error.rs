//! Error types for durable-cursor

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error reported by a driver
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Invalid configuration or options
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Failed to establish a connection
    #[error("connection failed: {0}")]
    Connection(String),

    /// Connect attempt did not finish in time
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// No current connection is available
    #[error("not connected")]
    NotConnected,

    /// The cursor has no more rows (normal end of data)
    #[error("no more rows in the cursor")]
    CursorExhausted,

    /// Fetching the next row failed
    #[error("cursor fetch failed: {0}")]
    Cursor(String),

    /// Releasing the remote cursor failed
    #[error("cursor close failed: {0}")]
    CursorClose(#[source] Box<Error>),

    /// A stream was read with no cursor bound to it
    #[error("db cursor not available")]
    CursorUnavailable,

    /// The connection was already gone while setting up a stream
    #[error("db disconnect during stream setup")]
    Disconnected,

    /// Invalid state transition
    #[error("invalid state: expected {expected}, got {actual}")]
    InvalidState {
        /// Expected state
        expected: String,
        /// Actual state
        actual: String,
    },

    /// Opaque failure from the underlying client library
    #[error("driver error: {0}")]
    Driver(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap an arbitrary driver error
    pub fn driver(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Driver(Box::new(err))
    }

    /// Whether this error marks the normal end of a cursor
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Error::CursorExhausted)
    }

    /// Whether the failure is recovered by reconnecting
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Connection(_)
                | Error::ConnectTimeout(_)
                | Error::NotConnected
        )
    }

    /// Short label used in logs and metrics
    pub fn category(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Config(_) => "config",
            Error::Connection(_) => "connection",
            Error::ConnectTimeout(_) => "timeout",
            Error::NotConnected => "not_connected",
            Error::CursorExhausted => "exhausted",
            Error::Cursor(_) => "cursor",
            Error::CursorClose(_) => "cursor_close",
            Error::CursorUnavailable | Error::Disconnected => "precondition",
            Error::InvalidState { .. } => "invalid_state",
            Error::Driver(_) => "driver",
        }
    }
}
