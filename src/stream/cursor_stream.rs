//! Cursor-to-stream adapter
//!
//! A [`CursorStream`] moves its cursor into a background task that fetches
//! rows and pushes them into a bounded channel. The channel capacity is the
//! stream's high-water mark:
//!
//! * a row is only fetched once a slot is free, so at most `high_water_mark`
//!   rows are ever buffered ahead of the consumer
//! * while slots remain the task fetches again immediately
//! * once the buffer is full the task waits until the consumer polls
//!
//! Every exit path (end of data, fetch error, consumer close, lost
//! connection, consumer dropped) runs the same teardown: close the cursor,
//! report a close failure as an `Error` event, then emit exactly one `Close`.

use super::cursor::{next_row, Cursor};
use crate::client::{ClientConfig, DEFAULT_HIGH_WATER_MARK};
use crate::connection::{ConnectionHandle, StatusWatch};
use crate::metrics::labels;
use crate::{Error, Result};
use futures::stream::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, Notify};
use tracing::Instrument;

/// Notification delivered to a stream consumer
#[derive(Debug)]
pub enum StreamEvent<R> {
    /// One row
    Data(R),
    /// Normal completion, no more rows
    End,
    /// A fetch failed, or releasing the cursor failed
    Error(Error),
    /// Terminal; always delivered exactly once
    Close,
}

impl<R> StreamEvent<R> {
    /// Whether the event is still delivered after `close()` was requested
    fn survives_close(&self) -> bool {
        matches!(
            self,
            StreamEvent::Close | StreamEvent::Error(Error::CursorClose(_))
        )
    }
}

/// Stream tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Rows fetched ahead of the consumer before fetching pauses
    pub high_water_mark: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

impl From<&ClientConfig> for StreamOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            high_water_mark: config.high_water_mark,
        }
    }
}

/// State shared between the consumer and the fetch task
#[derive(Default)]
struct StreamShared {
    /// Close requested (by the consumer or forced by connection loss)
    closed: AtomicBool,
    cancel: Notify,
}

impl StreamShared {
    /// Returns false if the stream was already closed
    fn request_close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.cancel.notify_one();
        true
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Why the fetch loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    End,
    Error,
    Cancelled,
    Disconnected,
    Dropped,
    Unavailable,
}

impl Outcome {
    fn label(self) -> &'static str {
        match self {
            Outcome::End => labels::OUTCOME_END,
            Outcome::Error => labels::OUTCOME_ERROR,
            Outcome::Cancelled => labels::OUTCOME_CANCELLED,
            Outcome::Disconnected => labels::OUTCOME_DISCONNECTED,
            Outcome::Dropped => labels::OUTCOME_DROPPED,
            Outcome::Unavailable => labels::OUTCOME_UNAVAILABLE,
        }
    }
}

/// Push-based stream of rows read from a remote cursor
///
/// Polling the stream is the consumer's read request. Events arrive in order
/// `Data*`, then optionally `End` or `Error`, then `Close`; after `Close` the
/// stream yields `None`.
///
/// # Examples
///
/// ```no_run
/// # async fn example<C: durable_cursor::Cursor>(
/// #     mut stream: durable_cursor::CursorStream<C::Row>,
/// # ) {
/// use durable_cursor::StreamEvent;
/// use futures::StreamExt;
///
/// while let Some(event) = stream.next().await {
///     match event {
///         StreamEvent::Data(_row) => { /* handle row */ }
///         StreamEvent::End => tracing::info!("all rows received"),
///         StreamEvent::Error(e) => tracing::warn!("stream error: {}", e),
///         StreamEvent::Close => break,
///     }
/// }
/// # }
/// ```
pub struct CursorStream<R> {
    events: mpsc::Receiver<StreamEvent<R>>,
    shared: Arc<StreamShared>,
    done: bool,
}

impl<R> std::fmt::Debug for CursorStream<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorStream")
            .field("closed", &self.is_closed())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<R: Send + 'static> CursorStream<R> {
    /// Wrap a cursor obtained through `handle`
    ///
    /// `cursor` is `None` when the query produced no cursor; the first read
    /// then reports [`Error::CursorUnavailable`].
    ///
    /// Fails with [`Error::Disconnected`] if the connection is already closed
    /// or closing. The cursor is released and nothing is emitted in that case.
    pub async fn new<C, H>(
        cursor: Option<C>,
        handle: &ConnectionHandle<H>,
        options: StreamOptions,
    ) -> Result<Self>
    where
        C: Cursor<Row = R>,
    {
        let status = handle.watch_status();
        if !status.current().is_live() {
            tracing::debug!(
                connection = handle.id(),
                status = %status.current(),
                "connection gone before stream setup"
            );
            if let Some(mut cursor) = cursor {
                if let Err(e) = cursor.close().await {
                    tracing::warn!("cursor close after failed stream setup failed: {}", e);
                }
            }
            crate::metrics::counters::stream_completed(labels::OUTCOME_DISCONNECTED);
            return Err(Error::Disconnected);
        }

        let (tx, rx) = mpsc::channel(options.high_water_mark.max(1));
        let shared = Arc::new(StreamShared::default());

        let span = tracing::debug_span!(
            "cursor_stream",
            connection = handle.id(),
            high_water_mark = options.high_water_mark
        );
        tokio::spawn(fetch_loop(cursor, tx, Arc::clone(&shared), status).instrument(span));

        Ok(Self {
            events: rx,
            shared,
            done: false,
        })
    }
}

impl<R> CursorStream<R> {
    /// Request the stream to close
    ///
    /// Idempotent. Rows still buffered are discarded; keep polling to observe
    /// the final `Close` (preceded by an `Error` if releasing the cursor fails).
    pub fn close(&self) {
        if self.shared.request_close() {
            tracing::debug!("stream close requested");
        }
    }

    /// Whether close was requested or the stream has finished
    pub fn is_closed(&self) -> bool {
        self.done || self.shared.is_closed()
    }

    /// Only rows and errors, ending after the terminal events
    pub fn rows(self) -> impl Stream<Item = Result<R>> {
        self.filter_map(|event| async move {
            match event {
                StreamEvent::Data(row) => Some(Ok(row)),
                StreamEvent::Error(e) => Some(Err(e)),
                StreamEvent::End | StreamEvent::Close => None,
            }
        })
    }
}

impl<R> Stream for CursorStream<R> {
    type Item = StreamEvent<R>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if this.done {
                return Poll::Ready(None);
            }

            match this.events.poll_recv(cx) {
                Poll::Pending => return Poll::Pending,
                // Task ended without reaching teardown (runtime shutting down)
                Poll::Ready(None) => {
                    this.done = true;
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(StreamEvent::Close)) => {
                    this.done = true;
                    return Poll::Ready(Some(StreamEvent::Close));
                }
                Poll::Ready(Some(event)) => {
                    if this.shared.is_closed() && !event.survives_close() {
                        continue;
                    }
                    return Poll::Ready(Some(event));
                }
            }
        }
    }
}

async fn fetch_loop<C: Cursor>(
    mut cursor: Option<C>,
    tx: mpsc::Sender<StreamEvent<C::Row>>,
    shared: Arc<StreamShared>,
    mut conn: StatusWatch,
) {
    let outcome = loop {
        if shared.is_closed() {
            break Outcome::Cancelled;
        }

        // Wait for the consumer to have room
        let permit = tokio::select! {
            biased;
            _ = shared.cancel.notified() => break Outcome::Cancelled,
            _ = conn.closed() => break Outcome::Disconnected,
            permit = tx.reserve() => match permit {
                Ok(permit) => permit,
                Err(_) => break Outcome::Dropped,
            },
        };

        let Some(active) = cursor.as_mut() else {
            permit.send(StreamEvent::Error(Error::CursorUnavailable));
            break Outcome::Unavailable;
        };

        // Dropping the in-flight fetch discards its result; teardown then
        // closes the cursor, which unblocks a long-polling server side
        let fetched = tokio::select! {
            biased;
            _ = shared.cancel.notified() => break Outcome::Cancelled,
            _ = conn.closed() => break Outcome::Disconnected,
            fetched = next_row(active) => fetched,
        };

        if shared.is_closed() {
            tracing::debug!("discarding fetch result after close");
            break Outcome::Cancelled;
        }

        match fetched {
            Ok(Some(row)) => {
                crate::metrics::counters::stream_row();
                permit.send(StreamEvent::Data(row));
            }
            Ok(None) => {
                permit.send(StreamEvent::End);
                break Outcome::End;
            }
            Err(e) => {
                tracing::debug!(error = %e, "cursor fetch failed");
                permit.send(StreamEvent::Error(e));
                break Outcome::Error;
            }
        }
    };

    if outcome == Outcome::Disconnected && shared.request_close() {
        tracing::debug!("connection closed, closing stream");
    }

    if let Some(mut cursor) = cursor.take() {
        if let Err(e) = cursor.close().await {
            tracing::warn!(error = %e, "cursor close failed");
            let _ = tx.send(StreamEvent::Error(Error::CursorClose(Box::new(e)))).await;
        }
    }

    // Receiver may already be gone
    let _ = tx.send(StreamEvent::Close).await;
    crate::metrics::counters::stream_completed(outcome.label());
    tracing::debug!(outcome = outcome.label(), "stream closed");
}
