//! Client configuration
//!
//! Supports building a [`ClientConfig`] three ways:
//! * `ClientConfig::builder("db.internal")...build()`
//! * `ClientConfig::parse("scheme://[user[:password]@]host[:port][/db][?options]")`
//! * deserializing with serde (every field optional, defaults applied)
//!
//! Recognized connection string options:
//! * `reconnect_interval_ms` - delay between reconnect attempts (default 5000)
//! * `connect_timeout_ms` - give up on a single connect attempt after this long
//! * `high_water_mark` - rows a stream buffers ahead of its consumer (default 16)

use crate::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Default delay between a lost connection and the next attempt
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 5000;

/// Default number of rows buffered ahead of a stream consumer
pub const DEFAULT_HIGH_WATER_MARK: usize = 16;

const DEFAULT_HOST: &str = "localhost";

/// Connection and reconnect configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Host name or address
    pub host: String,
    /// Port (driver default when absent)
    pub port: Option<u16>,
    /// Default database
    pub db: Option<String>,
    /// Username
    pub user: String,
    /// Password (optional)
    pub password: Option<String>,
    /// Fixed delay between reconnect attempts, in milliseconds
    pub reconnect_interval_ms: u64,
    /// Per-attempt connect timeout, in milliseconds
    pub connect_timeout_ms: Option<u64>,
    /// Rows a stream may buffer before fetching pauses
    pub high_water_mark: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: None,
            db: None,
            user: whoami::username(),
            password: None,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            connect_timeout_ms: None,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

impl ClientConfig {
    /// Create a builder for the given host
    ///
    /// # Examples
    ///
    /// ```
    /// use durable_cursor::ClientConfig;
    /// use std::time::Duration;
    ///
    /// let config = ClientConfig::builder("db.internal")
    ///     .port(28015)
    ///     .db("app")
    ///     .reconnect_interval(Duration::from_secs(1))
    ///     .build();
    ///
    /// assert_eq!(config.reconnect_interval(), Duration::from_secs(1));
    /// ```
    pub fn builder(host: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: ClientConfig {
                host: host.into(),
                ..ClientConfig::default()
            },
        }
    }

    /// Parse a connection string
    pub fn parse(s: &str) -> Result<Self> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| Error::Config("connection string must start with <scheme>://".into()))?;
        if scheme.is_empty() {
            return Err(Error::Config("connection string scheme is empty".into()));
        }

        let mut config = ClientConfig::default();

        // Format: [user[:password]@]host[:port][/db][?options]
        let (auth, rest) = match rest.rsplit_once('@') {
            Some((auth, rest)) => (Some(auth), rest),
            None => (None, rest),
        };

        if let Some(auth) = auth {
            match auth.split_once(':') {
                Some((user, password)) => {
                    config.user = user.to_string();
                    config.password = Some(password.to_string());
                }
                None => config.user = auth.to_string(),
            }
        }

        let (rest, query_string) = rest.split_once('?').unwrap_or((rest, ""));

        let (host_port, db) = match rest.split_once('/') {
            Some((hp, db)) => (hp, (!db.is_empty()).then(|| db.to_string())),
            None => (rest, None),
        };
        config.db = db;

        match host_port.split_once(':') {
            Some((host, port)) => {
                config.host = host.to_string();
                config.port = Some(
                    port.parse()
                        .map_err(|_| Error::Config(format!("invalid port: {}", port)))?,
                );
            }
            None => config.host = host_port.to_string(),
        }
        if config.host.is_empty() {
            config.host = DEFAULT_HOST.to_string();
        }

        for pair in query_string.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| Error::Config(format!("malformed option: {}", pair)))?;
            match key {
                "reconnect_interval_ms" => config.reconnect_interval_ms = parse_number(key, value)?,
                "connect_timeout_ms" => config.connect_timeout_ms = Some(parse_number(key, value)?),
                "high_water_mark" => config.high_water_mark = parse_number(key, value)?,
                other => return Err(Error::Config(format!("unknown option: {}", other))),
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Check invariants that the rest of the crate relies on
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::Config("host must not be empty".into()));
        }
        if self.reconnect_interval_ms == 0 {
            return Err(Error::Config("reconnect_interval_ms must be > 0".into()));
        }
        if self.connect_timeout_ms == Some(0) {
            return Err(Error::Config("connect_timeout_ms must be > 0".into()));
        }
        if self.high_water_mark == 0 {
            return Err(Error::Config("high_water_mark must be > 0".into()));
        }
        Ok(())
    }

    /// Delay between reconnect attempts
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// Per-attempt connect timeout
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::Config(format!("invalid value for {}: {}", key, value)))
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    /// Set the default database
    pub fn db(mut self, db: impl Into<String>) -> Self {
        self.config.db = Some(db.into());
        self
    }

    /// Set the username
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.config.user = user.into();
        self
    }

    /// Set the password
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.config.password = Some(password.into());
        self
    }

    /// Set the reconnect interval
    ///
    /// Default: 5 seconds
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Set the per-attempt connect timeout
    ///
    /// Default: None (wait for the driver)
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Set how many rows a stream buffers ahead of its consumer
    ///
    /// Default: 16
    pub fn high_water_mark(mut self, rows: usize) -> Self {
        self.config.high_water_mark = rows;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}
