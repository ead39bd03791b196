//! Invalidation propagation seams.
//!
//! [`InvalidationPublisher`] is the outbound side: fire-and-forget
//! publication of evict/clear messages. [`InvalidationSink`] is the inbound
//! side: the subscriber hands decoded messages to it for local-only
//! invalidation.

use async_trait::async_trait;

/// Fire-and-forget publication of invalidation messages.
///
/// Both methods return as soon as the message is handed to the transport;
/// transport failures are logged and swallowed. Peers that miss a message
/// observe staleness at most until their local TTL expires.
pub trait InvalidationPublisher: Send + Sync {
    /// Broadcasts that `(cache_name, key)` changed and peers should drop
    /// their local entry.
    fn publish_evict(&self, cache_name: &str, key: &str);

    /// Broadcasts that peers should drop all local entries of `cache_name`.
    fn publish_clear(&self, cache_name: &str);
}

/// Target for received invalidation messages.
///
/// Implementations invalidate only the local tier and never publish in
/// response; errors (including an unknown cache name) are handled and
/// logged internally so one bad message cannot stall delivery.
#[async_trait]
pub trait InvalidationSink: Send + Sync {
    /// Drops the local entry for `(cache_name, key)`.
    async fn evict_local(&self, cache_name: &str, key: &str);

    /// Drops all local entries of `cache_name`.
    async fn clear_local(&self, cache_name: &str);
}
