//! Remote cursor abstraction

use crate::Result;
use std::future::Future;

/// Paginated remote iterator provided by the client library
///
/// Every call suspends on the network. End of data is reported as `Ok(None)`;
/// libraries that signal it as an error may return
/// [`Error::CursorExhausted`](crate::Error::CursorExhausted) instead, which is
/// treated the same way.
pub trait Cursor: Send + 'static {
    /// Row type yielded by the cursor
    type Row: Send + 'static;

    /// Fetch the next row
    fn next(&mut self) -> impl Future<Output = Result<Option<Self::Row>>> + Send;

    /// Release the remote cursor
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Fetch one row, folding the exhaustion error into `None`
pub(crate) async fn next_row<C: Cursor>(cursor: &mut C) -> Result<Option<C::Row>> {
    match cursor.next().await {
        Err(e) if e.is_exhausted() => Ok(None),
        other => other,
    }
}

/// Drain a cursor into a vector, preserving order
pub async fn collect_rows<C: Cursor>(mut cursor: C) -> Result<Vec<C::Row>> {
    let mut rows = Vec::new();
    loop {
        match next_row(&mut cursor).await {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => break,
            Err(e) => {
                if let Err(close_err) = cursor.close().await {
                    tracing::warn!("cursor close after fetch error failed: {}", close_err);
                }
                return Err(e);
            }
        }
    }

    if let Err(e) = cursor.close().await {
        tracing::warn!("cursor close after exhaustion failed: {}", e);
    }
    Ok(rows)
}
