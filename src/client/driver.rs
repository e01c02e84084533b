//! Seam to the wrapped client library

use super::config::ClientConfig;
use crate::connection::ConnectionHandle;
use crate::stream::Cursor;
use crate::Result;
use std::future::Future;

/// Options forwarded verbatim to the driver's execute call
pub type QueryParams = serde_json::Map<String, serde_json::Value>;

/// What executing a query produced
pub enum QueryOutput<C: Cursor> {
    /// A paginated result set
    Cursor(C),
    /// A single final value (no cursor involved)
    Value(C::Row),
}

/// Connection factory and query execution primitive of a client library
///
/// `connect` creates a [`ConnectionHandle`] and keeps a clone of it to report
/// closure ([`ConnectionHandle::mark_closed`]) and non-fatal errors
/// ([`ConnectionHandle::report_error`]).
pub trait Driver: Send + Sync + 'static {
    /// Driver connection object
    type Connection: Send + Sync + 'static;

    /// Cursor returned by queries
    type Cursor: Cursor;

    /// Query term built by the caller
    type Query: Send + Sync;

    /// Open a new connection
    fn connect(
        &self,
        config: &ClientConfig,
    ) -> impl Future<Output = Result<ConnectionHandle<Self::Connection>>> + Send;

    /// Run a query on the given connection
    fn execute(
        &self,
        conn: &ConnectionHandle<Self::Connection>,
        query: &Self::Query,
        params: &QueryParams,
    ) -> impl Future<Output = Result<QueryOutput<Self::Cursor>>> + Send;
}
