//! Metrics for connection lifecycle and streaming
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! application installs a recorder.
//!
//! Counters:
//! * `durable_cursor_connect_attempts_total`
//! * `durable_cursor_connect_failures_total{reason}`
//! * `durable_cursor_reconnects_scheduled_total`
//! * `durable_cursor_connections_lost_total`
//! * `durable_cursor_connection_errors_total`
//! * `durable_cursor_stream_rows_total`
//! * `durable_cursor_streams_completed_total{outcome}`
//!
//! Histograms:
//! * `durable_cursor_connect_duration_ms`

pub mod counters;
pub mod histograms;
pub mod labels;
