//! Connection management
//!
//! This module handles:
//! * Connection handles and their close/error notifications
//! * Connection lifecycle (connect, monitor, reconnect)
//! * State machine enforcement

mod handle;
mod manager;
mod state;

pub use handle::{ConnectionHandle, HandleStatus, StatusWatch};
pub use manager::ConnectionManager;
pub use state::ManagerState;
