//! Client surface
//!
//! This module handles:
//! * Configuration (builder, connection string, serde)
//! * The driver seam to the wrapped client library
//! * Query execution (`run`, `to_stream`) on the managed connection

mod config;
mod driver;
mod executor;

pub use config::{
    ClientConfig, ClientConfigBuilder, DEFAULT_HIGH_WATER_MARK, DEFAULT_RECONNECT_INTERVAL_MS,
};
pub use driver::{Driver, QueryOutput, QueryParams};
pub use executor::{QueryExecutor, RunOptions, RunOutput};
