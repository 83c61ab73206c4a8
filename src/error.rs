//! Error types for store operations.
//!
//! "Not found" is never an error: lookups on missing keys or members return
//! `None`, an empty collection, or zero.

use redis::{ErrorKind, RedisError};
use thiserror::Error;

use crate::config::ConfigError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug, PartialEq)]
pub enum StoreError {
    /// The store could not be reached, or the connection failed mid-request.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store replied with something that does not fit the command sent.
    #[error("unexpected response from store: {0}")]
    UnexpectedResponse(String),

    /// The store answered the command with an error reply.
    #[error("store rejected command: {0}")]
    Rejected(String),

    /// A counter was read but the stored value is not a 64-bit integer.
    #[error("value stored at '{key}' is not an integer: {value:?}")]
    MalformedValue { key: String, value: String },

    /// The value or score was written but the expiry step failed or was
    /// skipped. Retrying only the expiry is safe.
    #[error("'{key}' was written but its expiry was not applied: {reason}")]
    PartialCompositeFailure { key: String, reason: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid store configuration: {0}")]
    Config(#[from] ConfigError),
}

impl StoreError {
    /// Whether the failure was in reaching or talking to the store, as
    /// opposed to the store refusing the command.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            StoreError::StoreUnavailable(_) | StoreError::UnexpectedResponse(_)
        )
    }
}

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error() {
            return StoreError::StoreUnavailable(err.to_string());
        }

        match err.kind() {
            ErrorKind::TypeError | ErrorKind::ParseError => {
                StoreError::UnexpectedResponse(err.to_string())
            }
            ErrorKind::AuthenticationFailed
            | ErrorKind::InvalidClientConfig
            | ErrorKind::ClientError
            | ErrorKind::BusyLoadingError
            | ErrorKind::MasterDown
            | ErrorKind::ClusterDown
            | ErrorKind::TryAgain => StoreError::StoreUnavailable(err.to_string()),
            _ => match (err.code(), err.detail()) {
                (Some(code), Some(detail)) => StoreError::Rejected(format!("{} {}", code, detail)),
                _ => StoreError::Rejected(err.to_string()),
            },
        }
    }
}
