//! Invalidation topic consumer.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use strata_core::{CACHE_TOPIC, CacheMessage, InvalidationSink, MessageKind, instance_id};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::connector::RedisConnector;
use crate::error::Error;

/// Pause before re-subscribing after the pub/sub connection drops.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Consumes the invalidation topic and dispatches to the local-only
/// invalidation API of the addressed cache.
///
/// Self-originated messages are discarded; malformed payloads and unknown
/// cache names are logged and skipped so one bad message never stalls
/// delivery. The subscription is re-established with a short backoff when
/// the connection drops.
pub struct MessageSubscriber;

impl MessageSubscriber {
    /// Subscribes to the invalidation topic and runs the dispatch loop on a
    /// background task for the life of the process.
    pub fn spawn(
        connector: Arc<RedisConnector>,
        sink: Arc<dyn InvalidationSink>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if let Err(e) = Self::run(&connector, sink.as_ref()).await {
                    warn!(error = %e, "cache message subscription lost, re-subscribing");
                }
                tokio::time::sleep(RESUBSCRIBE_DELAY).await;
            }
        })
    }

    async fn run(connector: &RedisConnector, sink: &dyn InvalidationSink) -> Result<(), Error> {
        let mut pubsub = connector.client().get_async_pubsub().await?;
        pubsub.subscribe(CACHE_TOPIC).await?;
        info!(
            topic = CACHE_TOPIC,
            instance_id = instance_id(),
            "cache message subscriber started"
        );

        let mut messages = pubsub.on_message();
        while let Some(message) = messages.next().await {
            let payload: String = match message.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(error = %e, "unreadable cache message payload");
                    continue;
                }
            };
            let message: CacheMessage = match serde_json::from_str(&payload) {
                Ok(message) => message,
                Err(e) => {
                    warn!(error = %e, payload, "malformed cache message");
                    continue;
                }
            };
            if message.is_from_current_instance() {
                debug!(instance_id = %message.instance_id, "ignoring message from current instance");
                continue;
            }
            debug!(
                kind = ?message.kind,
                cache = %message.cache_name,
                key = message.key.as_deref().unwrap_or_default(),
                from = %message.instance_id,
                "received cache message"
            );
            match message.kind {
                MessageKind::Evict => {
                    sink.evict_local(
                        &message.cache_name,
                        message.key.as_deref().unwrap_or_default(),
                    )
                    .await;
                }
                MessageKind::Clear => {
                    sink.clear_local(&message.cache_name).await;
                }
            }
        }
        Ok(())
    }
}
