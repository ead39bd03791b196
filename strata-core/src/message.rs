//! Invalidation protocol: process identity and the wire message.
//!
//! Every process computes a stable [`instance_id`] once at startup and
//! stamps it into each [`CacheMessage`] it publishes; subscribers use it to
//! drop self-originated messages. The wire form is JSON with fixed field
//! names so processes built from different revisions interoperate.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Pub/sub topic carrying [`CacheMessage`]s.
pub const CACHE_TOPIC: &str = "cache:invalidate";

/// The identity of this process on the invalidation topic.
///
/// Computed once as `hostname:pid`; if the hostname cannot be resolved, an
/// 8-character random hex fallback is used instead. Immutable for the
/// process lifetime.
pub fn instance_id() -> &'static str {
    static INSTANCE_ID: OnceLock<String> = OnceLock::new();
    INSTANCE_ID.get_or_init(|| match resolve_hostname() {
        Some(host) => {
            let id = format!("{host}:{}", std::process::id());
            info!(instance_id = %id, "generated node id");
            id
        }
        None => {
            let id = format!("{:08x}", rand::random::<u32>());
            warn!(instance_id = %id, "could not resolve hostname, using fallback id");
            id
        }
    })
}

fn resolve_hostname() -> Option<String> {
    hostname::get().ok().and_then(|h| h.into_string().ok())
}

/// Kind of invalidation a message carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    /// Drop one local entry.
    Evict,
    /// Drop all local entries of the cache.
    Clear,
}

/// Cache synchronization message for local-tier invalidation across
/// processes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheMessage {
    /// Identity of the publishing process.
    pub instance_id: String,
    /// What to invalidate.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// The addressed cache.
    pub cache_name: String,
    /// The addressed key; absent for CLEAR.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl CacheMessage {
    /// An EVICT message for `(cache_name, key)`, stamped with this process's
    /// identity.
    pub fn evict(cache_name: &str, key: &str) -> Self {
        Self {
            instance_id: instance_id().to_string(),
            kind: MessageKind::Evict,
            cache_name: cache_name.to_string(),
            key: Some(key.to_string()),
        }
    }

    /// A CLEAR message for `cache_name`, stamped with this process's
    /// identity.
    pub fn clear(cache_name: &str) -> Self {
        Self {
            instance_id: instance_id().to_string(),
            kind: MessageKind::Clear,
            cache_name: cache_name.to_string(),
            key: None,
        }
    }

    /// Whether this message originated from the current process.
    pub fn is_from_current_instance(&self) -> bool {
        self.instance_id == instance_id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_id_is_stable() {
        assert_eq!(instance_id(), instance_id());
        assert!(!instance_id().is_empty());
    }

    #[test]
    fn evict_message_carries_key_and_self_identity() {
        let message = CacheMessage::evict("user_info", "user_7");
        assert_eq!(message.kind, MessageKind::Evict);
        assert_eq!(message.cache_name, "user_info");
        assert_eq!(message.key.as_deref(), Some("user_7"));
        assert!(message.is_from_current_instance());
    }

    #[test]
    fn clear_message_has_no_key() {
        let message = CacheMessage::clear("sys_config");
        assert_eq!(message.kind, MessageKind::Clear);
        assert_eq!(message.key, None);
    }

    #[test]
    fn foreign_instance_is_not_self() {
        let message = CacheMessage {
            instance_id: "other-host:1".to_string(),
            kind: MessageKind::Evict,
            cache_name: "user_info".to_string(),
            key: Some("user_7".to_string()),
        };
        assert!(!message.is_from_current_instance());
    }

    #[test]
    fn wire_form_is_stable() {
        let message = CacheMessage {
            instance_id: "host:42".to_string(),
            kind: MessageKind::Evict,
            cache_name: "user_info".to_string(),
            key: Some("user_7".to_string()),
        };
        let json = serde_json::to_string(&message).unwrap();
        assert_eq!(
            json,
            r#"{"instanceId":"host:42","type":"EVICT","cacheName":"user_info","key":"user_7"}"#
        );

        let clear = CacheMessage {
            instance_id: "host:42".to_string(),
            kind: MessageKind::Clear,
            cache_name: "sys_config".to_string(),
            key: None,
        };
        assert_eq!(
            serde_json::to_string(&clear).unwrap(),
            r#"{"instanceId":"host:42","type":"CLEAR","cacheName":"sys_config"}"#
        );

        let parsed: CacheMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, message);
    }
}
