//! The per-named-cache tier coordination engine.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache as LocalCache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use strata_core::{
    BoxError, CacheError, CacheStrategy, CachedValue, ClearMode, FallbackStrategy, Format,
    FormatExt, InvalidationPublisher, LockProvider, Raw, RemoteStore, is_null_token, null_token,
    randomize_ttl,
};

/// Collaborators and globals shared by every cache of one manager.
#[derive(Clone)]
pub(crate) struct EngineShared {
    pub(crate) remote: Arc<dyn RemoteStore>,
    pub(crate) locks: Arc<dyn LockProvider>,
    pub(crate) publisher: Option<Arc<dyn InvalidationPublisher>>,
    pub(crate) format: Arc<dyn Format>,
    pub(crate) cache_prefix: String,
    pub(crate) null_value_ttl: Duration,
    pub(crate) ttl_random_factor: f64,
    pub(crate) lock_wait: Duration,
}

/// Snapshot of local-tier counters for diagnostic consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalStats {
    /// Approximate number of live local entries.
    pub entry_count: u64,
    /// Reads served from the local tier.
    pub hit_count: u64,
    /// Reads that had to go past the local tier.
    pub miss_count: u64,
}

/// One named cache: a bounded in-process tier in front of a shared remote
/// tier, kept coherent through write-through ordering and best-effort
/// cross-process invalidation.
///
/// Both tiers store raw value tokens: codec bytes for real values, or the
/// null sentinel recording a confirmed absence. Reads fall through
/// L1 → L2 → loader; the loader runs under two layers of single-flight
/// (in-process coalescing on the local tier, a distributed lock across
/// processes).
pub struct TieredCache {
    name: String,
    strategy: CacheStrategy,
    local: LocalCache<String, Raw>,
    shared: EngineShared,
    local_hits: AtomicU64,
    local_misses: AtomicU64,
}

impl TieredCache {
    pub(crate) fn new(name: String, strategy: CacheStrategy, shared: EngineShared) -> Self {
        let local = LocalCache::builder()
            .max_capacity(strategy.local_max_size)
            .time_to_live(strategy.local_ttl)
            .build();
        info!(
            cache = %name,
            fallback = ?strategy.fallback_strategy,
            clear_mode = ?strategy.clear_mode,
            local_max_size = strategy.local_max_size,
            local_ttl = ?strategy.local_ttl,
            remote_ttl = ?strategy.remote_ttl,
            null_value_ttl = ?shared.null_value_ttl,
            "creating tiered cache"
        );
        Self {
            name,
            strategy,
            local,
            shared,
            local_hits: AtomicU64::new(0),
            local_misses: AtomicU64::new(0),
        }
    }

    /// The cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved strategy this cache runs with.
    pub fn strategy(&self) -> &CacheStrategy {
        &self.strategy
    }

    /// Local-tier counters.
    pub fn local_stats(&self) -> LocalStats {
        LocalStats {
            entry_count: self.local.entry_count(),
            hit_count: self.local_hits.load(Ordering::Relaxed),
            miss_count: self.local_misses.load(Ordering::Relaxed),
        }
    }

    /// Simple read: L1, then L2 with L1 back-fill.
    ///
    /// Returns `None` when neither tier holds the key. A hit on the null
    /// sentinel yields a wrapper whose inner value is `None` — callers can
    /// tell "cached absence" from "not cached".
    ///
    /// # Errors
    ///
    /// Remote-tier failures surface as [`CacheError::Backend`]; they are
    /// never silently turned into a miss. Stored bytes that do not decode
    /// into `T` surface as [`CacheError::TypeMismatch`].
    pub async fn get<T>(&self, key: &str) -> Result<Option<CachedValue<T>>, CacheError>
    where
        T: DeserializeOwned,
    {
        if let Some(raw) = self.local.get(key).await {
            self.local_hits.fetch_add(1, Ordering::Relaxed);
            debug!(cache = %self.name, key, "L1 hit");
            return Ok(Some(self.wrap(key, &raw)?));
        }
        self.local_misses.fetch_add(1, Ordering::Relaxed);
        if let Some(raw) = self.shared.remote.get(&self.name, key).await? {
            debug!(cache = %self.name, key, "L2 hit");
            self.local.insert(key.to_string(), raw.clone()).await;
            return Ok(Some(self.wrap(key, &raw)?));
        }
        debug!(cache = %self.name, key, "cache miss");
        Ok(None)
    }

    /// Read-through: L1, then L2, then the loader under a distributed lock.
    ///
    /// Concurrent calls for the same key on this process coalesce on the
    /// local tier's atomic compute; across processes at most one lock
    /// holder runs the loader. A loader returning `Ok(None)` stores the
    /// null sentinel (with the shorter null TTL), so repeated reads of a
    /// confirmed-absent key do not hit the loader again; the call itself
    /// returns `None` for both "sentinel" and a fresh `Ok(None)` load.
    ///
    /// # Errors
    ///
    /// On lock-wait timeout the configured
    /// [`FallbackStrategy`] decides between
    /// [`CacheError::LockContended`] and running the loader directly.
    /// Loader failures come back as [`CacheError::ValueRetrieval`] naming
    /// the key.
    pub async fn get_with<T, F, Fut>(&self, key: &str, loader: F) -> Result<Option<T>, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, BoxError>>,
    {
        let entered_init = AtomicBool::new(false);
        let init = async {
            entered_init.store(true, Ordering::Relaxed);
            if let Some(raw) = self.shared.remote.get(&self.name, key).await? {
                debug!(cache = %self.name, key, "L2 hit");
                return Ok(raw);
            }
            debug!(cache = %self.name, key, "L1/L2 miss, loading value");
            self.load_under_lock(key, loader).await
        };
        let raw = self
            .local
            .try_get_with_by_ref(key, init)
            .await
            .map_err(|e| shared_load_error(key, &e))?;
        if entered_init.load(Ordering::Relaxed) {
            self.local_misses.fetch_add(1, Ordering::Relaxed);
        } else {
            self.local_hits.fetch_add(1, Ordering::Relaxed);
        }
        self.unwrap_token(key, &raw)
    }

    /// Write-through: L2 first, then L1, then an EVICT broadcast.
    ///
    /// `None` stores the null sentinel. The remote write happens before the
    /// local one so a remote failure never leaves this process reading a
    /// value its peers cannot see. Peers receive EVICT rather than the new
    /// value and re-read from L2 on demand.
    pub async fn put<T>(&self, key: &str, value: Option<&T>) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let (raw, is_null) = self.encode(value)?;
        debug!(cache = %self.name, key, is_null, "writing to cache");
        self.shared
            .remote
            .put(&self.name, key, raw.clone(), self.remote_write_ttl(is_null))
            .await?;
        self.local.insert(key.to_string(), raw).await;
        self.publish_evict(key);
        Ok(())
    }

    /// Stores `value` only if the remote tier has no entry for `key`.
    ///
    /// Returns the wrapper of the existing value if one was present (also
    /// back-filling L1 with it), or `None` if this call stored. Atomicity
    /// holds at the remote tier; the local tier is last-writer-wins.
    pub async fn put_if_absent<T>(
        &self,
        key: &str,
        value: Option<&T>,
    ) -> Result<Option<CachedValue<T>>, CacheError>
    where
        T: Serialize + DeserializeOwned,
    {
        let (raw, is_null) = self.encode(value)?;
        let existing = self
            .shared
            .remote
            .put_if_absent(&self.name, key, raw.clone(), self.remote_write_ttl(is_null))
            .await?;
        if let Some(existing) = existing {
            debug!(cache = %self.name, key, "put_if_absent: L2 already present");
            self.local.insert(key.to_string(), existing.clone()).await;
            return Ok(Some(self.wrap(key, &existing)?));
        }
        debug!(cache = %self.name, key, is_null, "put_if_absent: written");
        self.local.insert(key.to_string(), raw).await;
        self.publish_evict(key);
        Ok(None)
    }

    /// Removes `key` from both tiers and broadcasts EVICT.
    pub async fn evict(&self, key: &str) -> Result<(), CacheError> {
        debug!(cache = %self.name, key, "evicting");
        // L2 first: a concurrent reader on this process must not repopulate
        // L1 from a remote entry that is about to disappear.
        self.shared.remote.evict(&self.name, key).await?;
        self.local.invalidate(key).await;
        self.publish_evict(key);
        Ok(())
    }

    /// Evicts `key` if either tier holds it; returns whether it existed.
    pub async fn evict_if_present(&self, key: &str) -> Result<bool, CacheError> {
        let existed =
            self.local.contains_key(key) || self.shared.remote.exists(&self.name, key).await?;
        if existed {
            self.evict(key).await?;
        }
        Ok(existed)
    }

    /// Clears this cache according to its [`ClearMode`].
    ///
    /// `Safe` drops only the local tier and broadcasts CLEAR, leaving the
    /// remote entries to their TTLs — safe under load because peers keep
    /// hitting L2 instead of stampeding the source. `Full` also deletes the
    /// whole remote hash.
    pub async fn clear(&self) -> Result<(), CacheError> {
        debug!(cache = %self.name, mode = ?self.strategy.clear_mode, "clearing cache");
        if self.strategy.clear_mode == ClearMode::Full {
            info!(cache = %self.name, "clearing remote cache");
            self.shared.remote.clear(&self.name).await?;
        }
        self.local.invalidate_all();
        self.publish_clear();
        Ok(())
    }

    /// [`clear`](Self::clear), reporting success as `true`.
    pub async fn invalidate(&self) -> Result<bool, CacheError> {
        self.clear().await?;
        Ok(true)
    }

    /// Drops `key` from the local tier only. Invoked by the message
    /// subscriber; does not publish.
    pub async fn evict_local(&self, key: &str) {
        debug!(cache = %self.name, key, "received evict notification for local tier");
        self.local.invalidate(key).await;
    }

    /// Drops all local entries. Invoked by the message subscriber; does not
    /// publish.
    pub fn clear_local(&self) {
        debug!(cache = %self.name, "received clear notification for local tier");
        self.local.invalidate_all();
    }

    async fn load_under_lock<T, F, Fut>(&self, key: &str, loader: F) -> Result<Raw, CacheError>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, BoxError>>,
    {
        let lock_key = format!("{}lock:{}:{}", self.shared.cache_prefix, self.name, key);
        match self
            .shared
            .locks
            .try_lock(&lock_key, self.shared.lock_wait)
            .await?
        {
            Some(guard) => {
                let result = self.load_locked(key, loader).await;
                guard.release().await;
                result
            }
            None => self.load_on_lock_timeout(key, loader).await,
        }
    }

    async fn load_locked<T, F, Fut>(&self, key: &str, loader: F) -> Result<Raw, CacheError>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, BoxError>>,
    {
        // Another worker may have filled L2 while we waited on the lock.
        if let Some(raw) = self.shared.remote.get(&self.name, key).await? {
            debug!(cache = %self.name, key, "L2 hit after lock acquired");
            return Ok(raw);
        }
        debug!(cache = %self.name, key, "loading value");
        self.load_and_store(key, loader).await
    }

    async fn load_on_lock_timeout<T, F, Fut>(&self, key: &str, loader: F) -> Result<Raw, CacheError>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, BoxError>>,
    {
        // One last chance: another worker may have finished while we waited.
        if let Some(raw) = self.shared.remote.get(&self.name, key).await? {
            return Ok(raw);
        }
        match self.strategy.fallback_strategy {
            FallbackStrategy::Throw => {
                warn!(cache = %self.name, key, "lock acquisition failed, throwing");
                Err(CacheError::LockContended)
            }
            FallbackStrategy::Fallback => {
                warn!(cache = %self.name, key, "lock acquisition failed, falling back to data source");
                // This write-back races with other fallback loaders; last
                // writer wins, which FALLBACK trades for availability.
                self.load_and_store(key, loader).await
            }
        }
    }

    async fn load_and_store<T, F, Fut>(&self, key: &str, loader: F) -> Result<Raw, CacheError>
    where
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>, BoxError>>,
    {
        let loaded = loader()
            .await
            .map_err(|e| CacheError::value_retrieval(key, e))?;
        let (raw, is_null) = self.encode(loaded.as_ref())?;
        let ttl_ms = self.remote_write_ttl(is_null);
        debug!(cache = %self.name, key, is_null, ttl_ms, "writing to L2");
        self.shared
            .remote
            .put(&self.name, key, raw.clone(), ttl_ms)
            .await?;
        Ok(raw)
    }

    fn encode<T: Serialize>(&self, value: Option<&T>) -> Result<(Raw, bool), CacheError> {
        match value {
            Some(value) => Ok((self.shared.format.encode(value)?, false)),
            None => Ok((null_token(), true)),
        }
    }

    fn remote_write_ttl(&self, is_null: bool) -> u64 {
        if is_null {
            self.shared.null_value_ttl.as_millis() as u64
        } else {
            randomize_ttl(
                self.strategy.remote_ttl.as_millis() as u64,
                self.shared.ttl_random_factor,
            )
        }
    }

    fn wrap<T: DeserializeOwned>(&self, key: &str, raw: &Raw) -> Result<CachedValue<T>, CacheError> {
        Ok(self.unwrap_token(key, raw)?.into())
    }

    fn unwrap_token<T: DeserializeOwned>(
        &self,
        key: &str,
        raw: &Raw,
    ) -> Result<Option<T>, CacheError> {
        if is_null_token(raw) {
            return Ok(None);
        }
        self.shared
            .format
            .decode::<T>(raw)
            .map(Some)
            .map_err(|source| CacheError::TypeMismatch {
                key: key.to_string(),
                source,
            })
    }

    fn publish_evict(&self, key: &str) {
        if let Some(publisher) = &self.shared.publisher {
            publisher.publish_evict(&self.name, key);
        }
    }

    fn publish_clear(&self) {
        if let Some(publisher) = &self.shared.publisher {
            publisher.publish_clear(&self.name);
        }
    }
}

impl fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TieredCache")
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

/// Maps the shared loader error moka hands every coalesced waiter back
/// into the caller-facing taxonomy. Lock contention stays distinguishable;
/// everything else wraps as a retrieval failure for this key.
fn shared_load_error(key: &str, error: &Arc<CacheError>) -> CacheError {
    match **error {
        CacheError::LockContended => CacheError::LockContended,
        _ => CacheError::ValueRetrieval {
            key: key.to_string(),
            source: Box::new(SharedLoadError(Arc::clone(error))),
        },
    }
}

/// A load failure observed by a waiter that coalesced onto another call's
/// in-flight load.
#[derive(Debug)]
struct SharedLoadError(Arc<CacheError>);

impl fmt::Display for SharedLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for SharedLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(self.0.as_ref())
    }
}
