//! Counter helpers

use metrics::counter;

/// A connect attempt started
pub fn connect_attempted() {
    counter!("durable_cursor_connect_attempts_total").increment(1);
}

/// A connect attempt failed (`reason` is the error category)
pub fn connect_failed(reason: &'static str) {
    counter!("durable_cursor_connect_failures_total", "reason" => reason).increment(1);
}

/// A reconnect timer was started
pub fn reconnect_scheduled() {
    counter!("durable_cursor_reconnects_scheduled_total").increment(1);
}

/// An established connection closed
pub fn connection_lost() {
    counter!("durable_cursor_connections_lost_total").increment(1);
}

/// A live connection reported a non-fatal error
pub fn connection_error() {
    counter!("durable_cursor_connection_errors_total").increment(1);
}

/// A row was pushed to a stream consumer
pub fn stream_row() {
    counter!("durable_cursor_stream_rows_total").increment(1);
}

/// A stream reached its closed state
pub fn stream_completed(outcome: &'static str) {
    counter!("durable_cursor_streams_completed_total", "outcome" => outcome).increment(1);
}
