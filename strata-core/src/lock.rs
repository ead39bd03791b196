//! The distributed lock seam.

use std::time::Duration;

use async_trait::async_trait;

use crate::remote::BackendResult;

/// A held distributed lock.
///
/// The lease is renewed by the provider while the guard lives, so holders
/// do not pick a lease length. Dropping the guard without calling
/// [`release`](LockGuard::release) stops renewal and lets the lease lapse
/// on its own.
#[async_trait]
pub trait LockGuard: Send {
    /// Releases the lock if it is still held by this owner.
    ///
    /// Release failures are logged by the implementation; the lease expiring
    /// naturally bounds the damage.
    async fn release(self: Box<Self>);
}

/// Provider of distributed locks keyed by string.
#[async_trait]
pub trait LockProvider: Send + Sync {
    /// Attempts to acquire the lock for `key`, waiting at most `wait`.
    ///
    /// Returns `Ok(None)` when the lock is still held elsewhere after the
    /// wait elapses.
    async fn try_lock(&self, key: &str, wait: Duration)
        -> BackendResult<Option<Box<dyn LockGuard>>>;
}
