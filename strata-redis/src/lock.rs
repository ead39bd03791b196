//! Distributed locks with watchdog lease renewal.

use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use redis::Script;
use redis::aio::ConnectionManager;
use strata_core::{BackendError, BackendResult, LockGuard, LockProvider};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::connector::RedisConnector;
use crate::error::Error;

/// Lease applied on acquisition and restored by each renewal.
const DEFAULT_LEASE: Duration = Duration::from_secs(30);

/// Pause between acquisition attempts while waiting for a held lock.
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Compare-owner-and-delete; only the holder's token releases the lock.
static UNLOCK_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        if redis.call('GET', KEYS[1]) == ARGV[1] then
            return redis.call('DEL', KEYS[1])
        end
        return 0
        "#,
    )
});

/// Compare-owner-and-extend; renewal stops once the lock changes hands.
static RENEW_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
        if redis.call('GET', KEYS[1]) == ARGV[1] then
            return redis.call('PEXPIRE', KEYS[1], ARGV[2])
        end
        return 0
        "#,
    )
});

/// Distributed locks on Redis string keys.
///
/// Acquisition is `SET NX PX` with a random owner token, retried until the
/// caller's wait elapses. While a guard lives, a watchdog task re-extends
/// the lease at a third of its length, so holders do not pick a lease to
/// match their loader's runtime. Release and renewal are guarded by the
/// owner token; a crashed holder's lock lapses within one lease.
#[derive(Clone)]
pub struct RedisLockProvider {
    connector: Arc<RedisConnector>,
    lease: Duration,
}

impl RedisLockProvider {
    /// Creates a provider over an existing connector.
    pub fn new(connector: Arc<RedisConnector>) -> Self {
        Self {
            connector,
            lease: DEFAULT_LEASE,
        }
    }

    /// Overrides the lease length.
    ///
    /// The watchdog renews at `lease / 3`; shorter leases recover faster
    /// from crashed holders at the cost of more renewal traffic.
    #[must_use]
    pub fn lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    async fn try_acquire_once(
        &self,
        conn: &mut ConnectionManager,
        key: &str,
        token: &str,
    ) -> Result<bool, Error> {
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(token)
            .arg("NX")
            .arg("PX")
            .arg(self.lease.as_millis() as u64)
            .query_async(conn)
            .await?;
        Ok(reply.is_some())
    }

    fn spawn_watchdog(
        &self,
        mut conn: ConnectionManager,
        key: String,
        token: String,
    ) -> JoinHandle<()> {
        let lease = self.lease;
        let lease_ms = lease.as_millis() as u64;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(lease / 3);
            // The first tick fires immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                let renewed: Result<i64, _> = RENEW_SCRIPT
                    .key(&key)
                    .arg(&token)
                    .arg(lease_ms)
                    .invoke_async(&mut conn)
                    .await;
                match renewed {
                    Ok(1) => debug!(lock_key = %key, "lock lease renewed"),
                    Ok(_) => {
                        warn!(lock_key = %key, "lock no longer held, stopping renewal");
                        break;
                    }
                    Err(e) => {
                        warn!(lock_key = %key, error = %e, "lock lease renewal failed");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl LockProvider for RedisLockProvider {
    async fn try_lock(
        &self,
        key: &str,
        wait: Duration,
    ) -> BackendResult<Option<Box<dyn LockGuard>>> {
        let mut conn = self.connector.manager().await.map_err(BackendError::from)?;
        let token = owner_token();
        let deadline = Instant::now() + wait;

        loop {
            let acquired = self
                .try_acquire_once(&mut conn, key, &token)
                .await
                .map_err(BackendError::from)?;
            if acquired {
                debug!(lock_key = %key, "lock acquired");
                let watchdog = self.spawn_watchdog(conn.clone(), key.to_string(), token.clone());
                return Ok(Some(Box::new(RedisLockGuard {
                    conn,
                    key: key.to_string(),
                    token,
                    watchdog,
                })));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(RETRY_INTERVAL.min(deadline - now)).await;
        }
    }
}

struct RedisLockGuard {
    conn: ConnectionManager,
    key: String,
    token: String,
    watchdog: JoinHandle<()>,
}

#[async_trait]
impl LockGuard for RedisLockGuard {
    async fn release(mut self: Box<Self>) {
        self.watchdog.abort();
        let released: Result<i64, _> = UNLOCK_SCRIPT
            .key(&self.key)
            .arg(&self.token)
            .invoke_async(&mut self.conn)
            .await;
        match released {
            Ok(1) => debug!(lock_key = %self.key, "lock released"),
            Ok(_) => debug!(lock_key = %self.key, "lock already expired or taken over"),
            Err(e) => warn!(lock_key = %self.key, error = %e, "lock release failed, lease will lapse"),
        }
    }
}

impl Drop for RedisLockGuard {
    fn drop(&mut self) {
        // A dropped-without-release guard must at least stop extending the
        // lease so the lock lapses for other workers.
        self.watchdog.abort();
    }
}

fn owner_token() -> String {
    format!("{:016x}", rand::thread_rng().gen::<u64>())
}
