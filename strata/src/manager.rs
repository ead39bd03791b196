//! Registry of tiered caches.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;
use tracing::{info, warn};

use strata_core::{
    Format, InvalidationPublisher, InvalidationSink, JsonFormat, LockProvider, RemoteStore,
    TieredCacheConfig,
};

use crate::cache::{EngineShared, TieredCache};

/// Error returned when a manager is built without its required seams.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No remote store was supplied.
    #[error("remote store not specified, call .remote_store() before .build()")]
    MissingRemoteStore,
    /// No lock provider was supplied.
    #[error("lock provider not specified, call .lock_provider() before .build()")]
    MissingLockProvider,
}

/// Manages [`TieredCache`] instances: predefined or created on first use.
///
/// With a non-empty `cache_names` list in the configuration the manager is
/// *static*: every listed cache is created eagerly and unknown names
/// resolve to `None`. With an empty list it is *dynamic*: caches are
/// created lazily on first [`get_cache`](Self::get_cache), and concurrent
/// first callers observe the same instance.
///
/// The manager is also the [`InvalidationSink`] the message subscriber
/// dispatches into.
pub struct TieredCacheManager {
    shared: EngineShared,
    config: TieredCacheConfig,
    caches: DashMap<String, Arc<TieredCache>>,
    predefined: Vec<String>,
    dynamic: bool,
}

impl TieredCacheManager {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> TieredCacheManagerBuilder {
        TieredCacheManagerBuilder::default()
    }

    /// Returns the cache named `name`.
    ///
    /// In static mode unknown names return `None`; in dynamic mode the
    /// cache is created on first use.
    pub fn get_cache(&self, name: &str) -> Option<Arc<TieredCache>> {
        if let Some(cache) = self.caches.get(name) {
            return Some(Arc::clone(&cache));
        }
        if !self.dynamic {
            warn!(cache = name, "cache does not exist and dynamic creation is disabled");
            return None;
        }
        Some(Arc::clone(
            self.caches
                .entry(name.to_string())
                .or_insert_with(|| self.create_cache(name))
                .value(),
        ))
    }

    /// The live cache names: the predefined list in static mode, the
    /// created set in dynamic mode.
    pub fn cache_names(&self) -> Vec<String> {
        if self.dynamic {
            self.caches.iter().map(|entry| entry.key().clone()).collect()
        } else {
            self.predefined.clone()
        }
    }

    /// Registry-only lookup; never creates. For diagnostic consumers and
    /// message dispatch.
    pub fn get_tiered_cache(&self, name: &str) -> Option<Arc<TieredCache>> {
        self.caches.get(name).map(|cache| Arc::clone(&cache))
    }

    /// All live caches.
    pub fn all_tiered_caches(&self) -> Vec<Arc<TieredCache>> {
        self.caches
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    fn create_cache(&self, name: &str) -> Arc<TieredCache> {
        let strategy = self.config.effective_strategy(name);
        Arc::new(TieredCache::new(
            name.to_string(),
            strategy,
            self.shared.clone(),
        ))
    }
}

#[async_trait]
impl InvalidationSink for TieredCacheManager {
    async fn evict_local(&self, cache_name: &str, key: &str) {
        match self.get_tiered_cache(cache_name) {
            Some(cache) => cache.evict_local(key).await,
            None => warn!(cache = cache_name, "cache does not exist"),
        }
    }

    async fn clear_local(&self, cache_name: &str) {
        match self.get_tiered_cache(cache_name) {
            Some(cache) => cache.clear_local(),
            None => warn!(cache = cache_name, "cache does not exist"),
        }
    }
}

/// Builder for [`TieredCacheManager`].
pub struct TieredCacheManagerBuilder {
    remote: Option<Arc<dyn RemoteStore>>,
    locks: Option<Arc<dyn LockProvider>>,
    publisher: Option<Arc<dyn InvalidationPublisher>>,
    format: Arc<dyn Format>,
    config: TieredCacheConfig,
}

impl Default for TieredCacheManagerBuilder {
    fn default() -> Self {
        Self {
            remote: None,
            locks: None,
            publisher: None,
            format: Arc::new(JsonFormat),
            config: TieredCacheConfig::default(),
        }
    }
}

impl TieredCacheManagerBuilder {
    /// Sets the remote (L2) tier. Required.
    pub fn remote_store(mut self, store: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(store);
        self
    }

    /// Sets the distributed lock provider. Required.
    pub fn lock_provider(mut self, locks: Arc<dyn LockProvider>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Sets the invalidation publisher.
    ///
    /// Without one, no messages are broadcast: both tiers of this process
    /// stay coherent, but peers only converge through their local TTLs.
    pub fn publisher(mut self, publisher: Arc<dyn InvalidationPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Sets the value serialization format.
    ///
    /// # Default
    ///
    /// [`JsonFormat`]
    pub fn format(mut self, format: Arc<dyn Format>) -> Self {
        self.format = format;
        self
    }

    /// Sets the configuration tree.
    pub fn config(mut self, config: TieredCacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the manager, eagerly creating every predefined cache.
    pub fn build(self) -> Result<TieredCacheManager, BuildError> {
        let remote = self.remote.ok_or(BuildError::MissingRemoteStore)?;
        let locks = self.locks.ok_or(BuildError::MissingLockProvider)?;
        let config = self.config;

        let shared = EngineShared {
            remote,
            locks,
            publisher: self.publisher,
            format: self.format,
            cache_prefix: config.cache_prefix.clone(),
            null_value_ttl: config.remote.null_value_ttl,
            ttl_random_factor: config.remote.ttl_random_factor,
            lock_wait: Duration::from_millis(config.remote.lock_wait_time_ms),
        };

        let predefined = config.cache_names.clone();
        let dynamic = predefined.is_empty();
        let manager = TieredCacheManager {
            shared,
            config,
            caches: DashMap::new(),
            predefined,
            dynamic,
        };

        if manager.dynamic {
            info!("tiered cache manager initialized, dynamic cache creation enabled");
        } else {
            for name in manager.predefined.clone() {
                let cache = manager.create_cache(&name);
                manager.caches.insert(name, cache);
            }
            info!(caches = ?manager.predefined, "tiered cache manager initialized with predefined caches");
        }

        Ok(manager)
    }
}
