//! durable-cursor: a self-healing connection with backpressured cursor streams
//!
//! Two pieces sit on top of an existing database client library:
//!
//! * [`ConnectionManager`] keeps at most one live connection, and reconnects
//!   on a fixed interval whenever an attempt fails or the connection closes.
//!   Callers never handle connection failures themselves.
//! * [`CursorStream`] turns a paginated cursor into a push stream with
//!   backpressure: rows are fetched only while the consumer has room for them,
//!   end of data is reported as `End`, and the cursor is always released.
//!
//! The client library plugs in through the [`Driver`] and [`Cursor`] traits.
//!
//! # Example
//!
//! ```no_run
//! # async fn example<D: durable_cursor::Driver>(driver: D, query: D::Query) -> durable_cursor::Result<()> {
//! use durable_cursor::{ClientConfig, QueryExecutor, RunOptions, StreamEvent};
//! use futures::StreamExt;
//!
//! let config = ClientConfig::parse("rethinkdb://localhost:28015/app?reconnect_interval_ms=1000")?;
//! let db = QueryExecutor::connect(driver, config).await?;
//!
//! // Materialized rows
//! let rows = db.run(None, &query, RunOptions::default()).await?;
//!
//! // Streamed rows
//! let mut stream = db.to_stream(&query, Default::default()).await?;
//! while let Some(event) = stream.next().await {
//!     if let StreamEvent::Data(_row) = event {
//!         // ...
//!     }
//! }
//! # let _ = rows;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod stream;

pub use client::{ClientConfig, Driver, QueryExecutor, QueryOutput, QueryParams, RunOptions, RunOutput};
pub use connection::{ConnectionHandle, ConnectionManager, HandleStatus, ManagerState};
pub use error::{Error, Result};
pub use stream::{Cursor, CursorStream, StreamEvent, StreamOptions};
