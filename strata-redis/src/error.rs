//! Error types for the Redis backends.

use redis::RedisError;
use strata_core::BackendError;

/// Error type for Redis backend operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error from the underlying Redis client: connection failures,
    /// protocol errors, authentication failures, command errors.
    #[error("redis backend error: {0}")]
    Redis(#[from] RedisError),

    /// No connection URL was specified when building the connector.
    #[error("connection url not specified, call .url() before .build()")]
    MissingUrl,
}

impl From<Error> for BackendError {
    fn from(error: Error) -> Self {
        match error {
            Error::Redis(_) => Self::ConnectionError(Box::new(error)),
            Error::MissingUrl => Self::InternalError(Box::new(error)),
        }
    }
}
