//! Connection settings for a Redis-compatible store.
//!
//! Settings are built once by the embedding application, either through
//! [`StoreConfig::builder`] or from a `redis://` URL, and handed to
//! [`RedisStore::connect`](crate::redis_store::RedisStore::connect).

use std::fmt;
use std::time::Duration;

use redis::{ConnectionAddr, ConnectionInfo, IntoConnectionInfo, RedisConnectionInfo};
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 6379;

/// Connection attempts made after the first one fails, both when connecting
/// and when replacing a dropped connection.
pub const DEFAULT_CONNECTION_RETRIES: usize = 3;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("store host is missing")]
    MissingHost,
    #[error("invalid store port '{0}'")]
    InvalidPort(String),
    #[error("invalid database index '{0}'")]
    InvalidDatabase(String),
    #[error("invalid store URL: {0}")]
    InvalidUrl(String),
    #[error("unsupported store address {0}, expected host and port")]
    UnsupportedAddress(String),
}

#[derive(Clone, PartialEq)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<u32>,
    pub connect_timeout: Option<Duration>,
    pub response_timeout: Option<Duration>,
    pub connection_retries: usize,
}

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// The `host:port` address to dial. IPv6 hosts are bracketed.
    pub fn address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Parses `redis://[[username]:password@]host[:port][/database]`.
    ///
    /// Userinfo without a colon is a username. Components are
    /// percent-decoded.
    pub fn from_url(url: &str) -> Result<Self, ConfigError> {
        let info = url
            .into_connection_info()
            .map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;

        let (host, port) = match info.addr {
            ConnectionAddr::Tcp(host, port) => (host, port),
            other => return Err(ConfigError::UnsupportedAddress(format!("{:?}", other))),
        };

        let mut builder = StoreConfig::builder().host(host).port(port);

        if let Some(username) = info.redis.username {
            builder = builder.username(username);
        }
        if let Some(password) = info.redis.password {
            builder = builder.password(password);
        }
        if info.redis.db != 0 {
            let index = u32::try_from(info.redis.db)
                .map_err(|_| ConfigError::InvalidDatabase(info.redis.db.to_string()))?;
            builder = builder.database(index);
        }

        builder.build()
    }

    /// Handshake details for the client: `AUTH` when a password is set and
    /// `SELECT` when a non-zero database is set.
    pub(crate) fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: i64::from(self.database.unwrap_or(0)),
                username: self.username.clone(),
                password: self.password.clone(),
                ..RedisConnectionInfo::default()
            },
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("connect_timeout", &self.connect_timeout)
            .field("response_timeout", &self.response_timeout)
            .field("connection_retries", &self.connection_retries)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfigBuilder {
    host: Option<String>,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    database: Option<u32>,
    connect_timeout: Option<Duration>,
    response_timeout: Option<Duration>,
    connection_retries: usize,
}

impl Default for StoreConfigBuilder {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            username: None,
            password: None,
            database: None,
            connect_timeout: None,
            response_timeout: None,
            connection_retries: DEFAULT_CONNECTION_RETRIES,
        }
    }
}

impl StoreConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Blank usernames are ignored.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = non_blank(username.into());
        self
    }

    /// Blank passwords are ignored, so no `AUTH` is sent for them.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = non_blank(password.into());
        self
    }

    pub fn database(mut self, database: u32) -> Self {
        self.database = Some(database);
        self
    }

    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = Some(connect_timeout);
        self
    }

    pub fn response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = Some(response_timeout);
        self
    }

    pub fn connection_retries(mut self, connection_retries: usize) -> Self {
        self.connection_retries = connection_retries;
        self
    }

    pub fn build(self) -> Result<StoreConfig, ConfigError> {
        let Some(host) = self.host.and_then(non_blank) else {
            return Err(ConfigError::MissingHost);
        };

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port.to_string()));
        }

        Ok(StoreConfig {
            host,
            port: self.port,
            username: self.username,
            password: self.password,
            database: self.database,
            connect_timeout: self.connect_timeout,
            response_timeout: self.response_timeout,
            connection_retries: self.connection_retries,
        })
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
