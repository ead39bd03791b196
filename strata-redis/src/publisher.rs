//! Fire-and-forget invalidation publication.

use std::sync::Arc;

use strata_core::{CACHE_TOPIC, CacheMessage, InvalidationPublisher};
use tracing::{debug, warn};

use crate::connector::RedisConnector;

/// Publishes [`CacheMessage`]s to the shared invalidation topic.
///
/// Publication is best-effort: both methods hand the message to a spawned
/// task and return immediately; transport failures are logged and swallowed.
/// The publishing process has already updated its own tiers, so a lost
/// message only delays peers until their local TTL expires.
#[derive(Clone)]
pub struct RedisPublisher {
    connector: Arc<RedisConnector>,
}

impl RedisPublisher {
    /// Creates a publisher over an existing connector.
    pub fn new(connector: Arc<RedisConnector>) -> Self {
        Self { connector }
    }

    fn publish(&self, message: CacheMessage) {
        let connector = Arc::clone(&self.connector);
        tokio::spawn(async move {
            let payload = match serde_json::to_string(&message) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, ?message, "failed to encode cache message");
                    return;
                }
            };
            let mut conn = match connector.manager().await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(error = %e, ?message, "failed to publish cache message");
                    return;
                }
            };
            let published: Result<i64, _> = redis::cmd("PUBLISH")
                .arg(CACHE_TOPIC)
                .arg(payload)
                .query_async(&mut conn)
                .await;
            match published {
                Ok(subscribers) => debug!(
                    cache = %message.cache_name,
                    key = message.key.as_deref().unwrap_or_default(),
                    subscribers,
                    "published cache message"
                ),
                Err(e) => warn!(error = %e, ?message, "failed to publish cache message"),
            }
        });
    }
}

impl InvalidationPublisher for RedisPublisher {
    fn publish_evict(&self, cache_name: &str, key: &str) {
        self.publish(CacheMessage::evict(cache_name, key));
    }

    fn publish_clear(&self, cache_name: &str) {
        self.publish(CacheMessage::clear(cache_name));
    }
}
