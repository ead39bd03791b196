//! Remote (L2) tier on Redis hashes.

use std::sync::Arc;
use std::sync::LazyLock;

use async_trait::async_trait;
use bytes::Bytes;
use redis::Script;
use strata_core::{BackendError, BackendResult, DeleteStatus, Raw, RemoteStore};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::connector::RedisConnector;
use crate::error::Error;

/// Atomic write with a per-field TTL.
static PUT_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
        redis.call('HPEXPIRE', KEYS[1], ARGV[3], 'FIELDS', 1, ARGV[1])
        return 1
        "#,
    )
});

/// Atomic write-if-absent returning the existing value, if any.
static PUT_IF_ABSENT_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        local existing = redis.call('HGET', KEYS[1], ARGV[1])
        if existing then
            return existing
        end
        redis.call('HSET', KEYS[1], ARGV[1], ARGV[2])
        redis.call('HPEXPIRE', KEYS[1], ARGV[3], 'FIELDS', 1, ARGV[1])
        return false
        "#,
    )
});

/// Read-only probe used for `UNLINK` capability detection.
static SERVER_INFO_SCRIPT: LazyLock<Script> =
    LazyLock::new(|| Script::new("return redis.call('INFO', 'server')"));

/// Whether the connected server supports `UNLINK`, detected once per
/// process. Defaults to `false` when detection fails.
static SUPPORTS_UNLINK: OnceCell<bool> = OnceCell::const_new();

/// Remote tier backed by Redis: one hash per cache, hash fields are the
/// stringified keys, each field carries its own TTL.
///
/// Writes go through server-side scripts so the value write and its TTL are
/// applied atomically. Per-field TTLs use `HPEXPIRE` and therefore require
/// Redis 7.4 or newer.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use strata_redis::{RedisConnector, RedisStore};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let connector = Arc::new(RedisConnector::builder().url("redis://localhost:6379/").build()?);
/// let store = RedisStore::new(connector);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisStore {
    connector: Arc<RedisConnector>,
}

impl RedisStore {
    /// Creates a store over an existing connector.
    pub fn new(connector: Arc<RedisConnector>) -> Self {
        Self { connector }
    }

    /// Whether whole-hash deletes may use `UNLINK`.
    ///
    /// Probed once per process by reading `INFO server` through a read-only
    /// script and parsing the major version out of `redis_version:`;
    /// servers at 4.0 and above support `UNLINK`. Any failure leaves the
    /// flag at `false` so clears fall back to `DEL`.
    async fn supports_unlink(&self) -> bool {
        *SUPPORTS_UNLINK
            .get_or_init(|| async {
                match self.detect_unlink_support().await {
                    Ok(supported) => supported,
                    Err(e) => {
                        warn!(error = %e, "redis version detection failed, defaulting to DEL");
                        false
                    }
                }
            })
            .await
    }

    async fn detect_unlink_support(&self) -> Result<bool, Error> {
        let mut conn = self.connector.manager().await?;
        let server_info: String = SERVER_INFO_SCRIPT.invoke_async(&mut conn).await?;
        let major_version = parse_redis_major_version(&server_info);
        let supported = major_version >= 4;
        info!(major_version, supports_unlink = supported, "redis version detection done");
        Ok(supported)
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, cache: &str, key: &str) -> BackendResult<Option<Raw>> {
        let mut conn = self.connector.manager().await.map_err(BackendError::from)?;
        let data: Option<Vec<u8>> = redis::cmd("HGET")
            .arg(cache)
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(Error::from)?;
        Ok(data.map(Bytes::from))
    }

    async fn put(&self, cache: &str, key: &str, value: Raw, ttl_ms: u64) -> BackendResult<()> {
        let mut conn = self.connector.manager().await.map_err(BackendError::from)?;
        let _: i64 = PUT_SCRIPT
            .key(cache)
            .arg(key)
            .arg(value.as_ref())
            .arg(ttl_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(Error::from)?;
        Ok(())
    }

    async fn put_if_absent(
        &self,
        cache: &str,
        key: &str,
        value: Raw,
        ttl_ms: u64,
    ) -> BackendResult<Option<Raw>> {
        let mut conn = self.connector.manager().await.map_err(BackendError::from)?;
        let existing: Option<Vec<u8>> = PUT_IF_ABSENT_SCRIPT
            .key(cache)
            .arg(key)
            .arg(value.as_ref())
            .arg(ttl_ms)
            .invoke_async(&mut conn)
            .await
            .map_err(Error::from)?;
        Ok(existing.map(Bytes::from))
    }

    async fn evict(&self, cache: &str, key: &str) -> BackendResult<DeleteStatus> {
        let mut conn = self.connector.manager().await.map_err(BackendError::from)?;
        let deleted: u32 = redis::cmd("HDEL")
            .arg(cache)
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(Error::from)?;
        if deleted > 0 {
            Ok(DeleteStatus::Deleted(deleted))
        } else {
            Ok(DeleteStatus::Missing)
        }
    }

    async fn exists(&self, cache: &str, key: &str) -> BackendResult<bool> {
        let mut conn = self.connector.manager().await.map_err(BackendError::from)?;
        let present: bool = redis::cmd("HEXISTS")
            .arg(cache)
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(Error::from)?;
        Ok(present)
    }

    async fn clear(&self, cache: &str) -> BackendResult<DeleteStatus> {
        let mut conn = self.connector.manager().await.map_err(BackendError::from)?;
        let command = if self.supports_unlink().await {
            "UNLINK"
        } else {
            "DEL"
        };
        let deleted: u32 = redis::cmd(command)
            .arg(cache)
            .query_async(&mut conn)
            .await
            .map_err(Error::from)?;
        debug!(cache, command, deleted, "remote cache cleared");
        if deleted > 0 {
            Ok(DeleteStatus::Deleted(deleted))
        } else {
            Ok(DeleteStatus::Missing)
        }
    }
}

/// Parses the major version out of an `INFO server` reply.
///
/// Returns 0 for anything unparseable, which disables `UNLINK`.
fn parse_redis_major_version(server_info: &str) -> u32 {
    for line in server_info.lines() {
        let line = line.trim();
        if let Some(version) = line.strip_prefix("redis_version:") {
            let version = version.trim();
            let major = version.split('.').next().unwrap_or(version);
            return match major.parse() {
                Ok(major) => major,
                Err(_) => {
                    warn!(version, "failed to parse redis version");
                    0
                }
            };
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::parse_redis_major_version;

    #[test]
    fn parses_major_version() {
        let info = "# Server\r\nredis_version:7.4.1\r\nredis_mode:standalone\r\n";
        assert_eq!(parse_redis_major_version(info), 7);
    }

    #[test]
    fn parses_version_without_dot() {
        assert_eq!(parse_redis_major_version("redis_version:6"), 6);
    }

    #[test]
    fn old_server_detected() {
        assert_eq!(parse_redis_major_version("redis_version:3.2.12"), 3);
    }

    #[test]
    fn malformed_info_yields_zero() {
        assert_eq!(parse_redis_major_version(""), 0);
        assert_eq!(parse_redis_major_version("# Server\r\nuptime_in_seconds:1"), 0);
        assert_eq!(parse_redis_major_version("redis_version:banana"), 0);
    }
}
