//! Handle to one live connection
//!
//! A [`ConnectionHandle`] wraps the driver's connection object together with
//! the two notifications the rest of the crate observes:
//!
//! * a status channel (`Open` → `Closing` → `Closed`), read by the connection
//!   manager and by every stream created through the handle
//! * an error channel for non-fatal errors reported while the connection stays up
//!
//! The driver creates the handle on a successful connect and keeps a clone to
//! report status changes. Status only ever moves forward; a closed handle is
//! never reopened.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Buffered error notifications per handle before slow subscribers lag
const ERROR_CHANNEL_CAPACITY: usize = 16;

/// Observable connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HandleStatus {
    /// Connected and usable
    Open,
    /// Still open, but shutting down
    Closing,
    /// Gone
    Closed,
}

impl HandleStatus {
    /// Whether the underlying connection is still open (possibly closing)
    pub fn is_open(&self) -> bool {
        !matches!(self, HandleStatus::Closed)
    }

    /// Whether a close has been initiated but not finished
    pub fn is_closing(&self) -> bool {
        matches!(self, HandleStatus::Closing)
    }

    /// Open and not closing
    pub fn is_live(&self) -> bool {
        matches!(self, HandleStatus::Open)
    }
}

impl fmt::Display for HandleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

struct HandleInner<C> {
    id: u64,
    conn: C,
    status: watch::Sender<HandleStatus>,
    errors: broadcast::Sender<String>,
}

/// Shared handle to a live connection
pub struct ConnectionHandle<C> {
    inner: Arc<HandleInner<C>>,
}

impl<C> Clone for ConnectionHandle<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for ConnectionHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl<C> ConnectionHandle<C> {
    /// Wrap a freshly established driver connection
    pub fn new(conn: C) -> Self {
        let (status, _) = watch::channel(HandleStatus::Open);
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(HandleInner {
                id: NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed),
                conn,
                status,
                errors,
            }),
        }
    }

    /// Process-unique identifier of this connection
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Borrow the driver connection
    pub fn connection(&self) -> &C {
        &self.inner.conn
    }

    /// Current status snapshot
    pub fn status(&self) -> HandleStatus {
        *self.inner.status.borrow()
    }

    /// See [`HandleStatus::is_open`]
    pub fn is_open(&self) -> bool {
        self.status().is_open()
    }

    /// See [`HandleStatus::is_closing`]
    pub fn is_closing(&self) -> bool {
        self.status().is_closing()
    }

    /// Watch status changes without keeping the connection alive
    pub fn watch_status(&self) -> StatusWatch {
        StatusWatch {
            rx: self.inner.status.subscribe(),
        }
    }

    /// Subscribe to non-fatal error notifications
    pub fn subscribe_errors(&self) -> broadcast::Receiver<String> {
        self.inner.errors.subscribe()
    }

    /// Driver side: a close has been initiated
    pub fn begin_close(&self) {
        self.advance(HandleStatus::Closing);
    }

    /// Driver side: the connection is gone
    pub fn mark_closed(&self) {
        self.advance(HandleStatus::Closed);
    }

    /// Driver side: report an error that did not close the connection
    pub fn report_error(&self, message: impl Into<String>) {
        // No subscribers is fine
        let _ = self.inner.errors.send(message.into());
    }

    /// Whether both handles refer to the same connection
    pub fn same_connection(&self, other: &ConnectionHandle<C>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn advance(&self, next: HandleStatus) {
        let changed = self.inner.status.send_if_modified(|status| {
            if next > *status {
                *status = next;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::debug!(connection = self.inner.id, status = %next, "connection status changed");
        }
    }
}

/// Status receiver that does not own the connection
///
/// Dropping every [`ConnectionHandle`] clone counts as the connection closing.
#[derive(Debug, Clone)]
pub struct StatusWatch {
    rx: watch::Receiver<HandleStatus>,
}

impl StatusWatch {
    /// Current status snapshot
    pub fn current(&self) -> HandleStatus {
        *self.rx.borrow()
    }

    /// Resolve once the connection is closed
    pub async fn closed(&mut self) {
        // Err means the sender is gone, which is a close as well
        let _ = self.rx.wait_for(|status| !status.is_open()).await;
    }
}
