//! Histogram helpers

use metrics::histogram;

/// Time taken by a successful connect attempt
pub fn connect_duration(duration_ms: u64) {
    histogram!("durable_cursor_connect_duration_ms").record(duration_ms as f64);
}
