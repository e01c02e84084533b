//! Label values shared by counters

/// Stream reached end of data
pub const OUTCOME_END: &str = "end";
/// Stream stopped on a fetch error
pub const OUTCOME_ERROR: &str = "error";
/// Stream closed by its consumer
pub const OUTCOME_CANCELLED: &str = "cancelled";
/// Stream closed because its connection went away
pub const OUTCOME_DISCONNECTED: &str = "disconnected";
/// Stream consumer was dropped without closing
pub const OUTCOME_DROPPED: &str = "dropped";
/// Stream had no cursor to read from
pub const OUTCOME_UNAVAILABLE: &str = "unavailable";
