//! The remote (L2) tier seam.

use async_trait::async_trait;

use crate::error::BackendError;
use crate::value::Raw;

/// Result alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Outcome of a delete operation.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DeleteStatus {
    /// The number of deleted entries.
    Deleted(u32),
    /// Nothing was deleted.
    Missing,
}

/// Shared remote tier keyed by `(cache, key)`.
///
/// Implementations store each cache as one logical map whose entries carry
/// individual TTLs. Values are opaque raw tokens; the engine decides what
/// they mean (codec bytes or the null sentinel).
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads the raw token for `key`, if present.
    async fn get(&self, cache: &str, key: &str) -> BackendResult<Option<Raw>>;

    /// Writes `value` under `key` with a per-entry TTL, atomically.
    async fn put(&self, cache: &str, key: &str, value: Raw, ttl_ms: u64) -> BackendResult<()>;

    /// Writes `value` only if `key` is absent, atomically.
    ///
    /// Returns the existing raw token if one was already present, `None` if
    /// this call stored the value.
    async fn put_if_absent(
        &self,
        cache: &str,
        key: &str,
        value: Raw,
        ttl_ms: u64,
    ) -> BackendResult<Option<Raw>>;

    /// Removes a single entry.
    async fn evict(&self, cache: &str, key: &str) -> BackendResult<DeleteStatus>;

    /// Whether `key` is present.
    async fn exists(&self, cache: &str, key: &str) -> BackendResult<bool>;

    /// Removes the whole cache.
    async fn clear(&self, cache: &str) -> BackendResult<DeleteStatus>;
}
