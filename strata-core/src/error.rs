//! Error taxonomy for cache operations.

use thiserror::Error;

use crate::format::FormatError;

/// Boxed error type carried by loader failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for backend (remote tier / lock) operations.
///
/// Categorizes failures from backend implementations so the engine can
/// surface them uniformly regardless of the concrete backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Network interaction error while talking to the remote tier.
    #[error(transparent)]
    ConnectionError(Box<dyn std::error::Error + Send + Sync>),

    /// Internal backend error, state or computation error.
    #[error(transparent)]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

/// Error type returned by cache operations.
///
/// The read-through path distinguishes three failure modes: lock pressure
/// (user-actionable), a loader failure (wrapped, naming the key), and
/// backend/codec failures. The read path never converts an error into a
/// silent miss.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The distributed lock could not be acquired within the configured wait
    /// time and the cache is configured with
    /// [`FallbackStrategy::Throw`](crate::config::FallbackStrategy::Throw).
    #[error("too many concurrent requests, please try again later")]
    LockContended,

    /// The loader failed while computing the value for `key`.
    #[error("failed to load value for key `{key}`")]
    ValueRetrieval {
        /// The key the loader was invoked for.
        key: String,
        /// The loader's error.
        #[source]
        source: BoxError,
    },

    /// A typed read found bytes that do not decode into the requested type.
    #[error("cached value for key `{key}` is not of the requested type")]
    TypeMismatch {
        /// The key whose stored bytes failed to decode.
        key: String,
        /// The decode failure.
        #[source]
        source: FormatError,
    },

    /// A backend (remote tier or lock) operation failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Serializing a value for storage failed.
    #[error(transparent)]
    Format(#[from] FormatError),
}

impl CacheError {
    /// Wraps a loader failure, letting lock-contention errors propagate
    /// unchanged so callers can still tell pressure apart from loader bugs.
    pub fn value_retrieval(key: &str, source: BoxError) -> Self {
        match source.downcast::<CacheError>() {
            Ok(inner) if matches!(*inner, CacheError::LockContended) => CacheError::LockContended,
            Ok(inner) => CacheError::ValueRetrieval {
                key: key.to_string(),
                source: inner,
            },
            Err(source) => CacheError::ValueRetrieval {
                key: key.to_string(),
                source,
            },
        }
    }
}
