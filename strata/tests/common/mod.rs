#![allow(dead_code)]
//! In-memory implementations of the backend seams for engine tests.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use strata::{
    BackendResult, DeleteStatus, InvalidationPublisher, LockGuard, LockProvider, Raw, RemoteStore,
    TieredCacheConfig, TieredCacheManager,
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
}

pub fn ada() -> User {
    User {
        id: "7".to_string(),
        name: "ada".to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct StoredEntry {
    pub value: Raw,
    pub ttl_ms: u64,
}

/// Remote tier stand-in: per-cache maps that record written TTLs and count
/// operations. TTLs are not enforced; tests assert on what was written.
#[derive(Default)]
pub struct MockRemoteStore {
    hashes: DashMap<String, DashMap<String, StoredEntry>>,
    pub get_count: AtomicUsize,
    pub put_count: AtomicUsize,
    pub evict_count: AtomicUsize,
    pub clear_count: AtomicUsize,
}

impl MockRemoteStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entry(&self, cache: &str, key: &str) -> Option<StoredEntry> {
        self.hashes.get(cache)?.get(key).map(|e| e.value().clone())
    }

    pub fn len(&self, cache: &str) -> usize {
        self.hashes.get(cache).map(|hash| hash.len()).unwrap_or(0)
    }

    pub fn has_hash(&self, cache: &str) -> bool {
        self.hashes.contains_key(cache)
    }

    pub fn insert_raw(&self, cache: &str, key: &str, value: Raw, ttl_ms: u64) {
        self.hashes
            .entry(cache.to_string())
            .or_default()
            .insert(key.to_string(), StoredEntry { value, ttl_ms });
    }
}

#[async_trait]
impl RemoteStore for MockRemoteStore {
    async fn get(&self, cache: &str, key: &str) -> BackendResult<Option<Raw>> {
        self.get_count.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .hashes
            .get(cache)
            .and_then(|hash| hash.get(key).map(|e| e.value.clone())))
    }

    async fn put(&self, cache: &str, key: &str, value: Raw, ttl_ms: u64) -> BackendResult<()> {
        self.put_count.fetch_add(1, Ordering::SeqCst);
        self.insert_raw(cache, key, value, ttl_ms);
        Ok(())
    }

    async fn put_if_absent(
        &self,
        cache: &str,
        key: &str,
        value: Raw,
        ttl_ms: u64,
    ) -> BackendResult<Option<Raw>> {
        self.put_count.fetch_add(1, Ordering::SeqCst);
        let hash = self.hashes.entry(cache.to_string()).or_default();
        let existing = hash.get(key).map(|e| e.value.clone());
        if existing.is_none() {
            hash.insert(key.to_string(), StoredEntry { value, ttl_ms });
        }
        Ok(existing)
    }

    async fn evict(&self, cache: &str, key: &str) -> BackendResult<DeleteStatus> {
        self.evict_count.fetch_add(1, Ordering::SeqCst);
        let removed = self
            .hashes
            .get(cache)
            .and_then(|hash| hash.remove(key))
            .is_some();
        Ok(if removed {
            DeleteStatus::Deleted(1)
        } else {
            DeleteStatus::Missing
        })
    }

    async fn exists(&self, cache: &str, key: &str) -> BackendResult<bool> {
        Ok(self
            .hashes
            .get(cache)
            .map(|hash| hash.contains_key(key))
            .unwrap_or(false))
    }

    async fn clear(&self, cache: &str) -> BackendResult<DeleteStatus> {
        self.clear_count.fetch_add(1, Ordering::SeqCst);
        Ok(if self.hashes.remove(cache).is_some() {
            DeleteStatus::Deleted(1)
        } else {
            DeleteStatus::Missing
        })
    }
}

/// Lock provider stand-in: either grants every request or times every
/// request out, counting both.
pub struct MockLockProvider {
    grant: bool,
    pub acquired: AtomicUsize,
    pub denied: AtomicUsize,
    pub released: Arc<AtomicUsize>,
}

impl MockLockProvider {
    pub fn granting() -> Arc<Self> {
        Arc::new(Self {
            grant: true,
            acquired: AtomicUsize::new(0),
            denied: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn denying() -> Arc<Self> {
        Arc::new(Self {
            grant: false,
            acquired: AtomicUsize::new(0),
            denied: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl LockProvider for MockLockProvider {
    async fn try_lock(
        &self,
        _key: &str,
        _wait: Duration,
    ) -> BackendResult<Option<Box<dyn LockGuard>>> {
        if self.grant {
            self.acquired.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Box::new(MockLockGuard {
                released: Arc::clone(&self.released),
            })))
        } else {
            self.denied.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }
}

struct MockLockGuard {
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl LockGuard for MockLockGuard {
    async fn release(self: Box<Self>) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Published {
    Evict { cache: String, key: String },
    Clear { cache: String },
}

/// Publisher stand-in recording every message synchronously.
#[derive(Default)]
pub struct MockPublisher {
    messages: Mutex<Vec<Published>>,
}

impl MockPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<Published> {
        self.messages.lock().unwrap().clone()
    }
}

impl InvalidationPublisher for MockPublisher {
    fn publish_evict(&self, cache_name: &str, key: &str) {
        self.messages.lock().unwrap().push(Published::Evict {
            cache: cache_name.to_string(),
            key: key.to_string(),
        });
    }

    fn publish_clear(&self, cache_name: &str) {
        self.messages.lock().unwrap().push(Published::Clear {
            cache: cache_name.to_string(),
        });
    }
}

pub struct Harness {
    pub store: Arc<MockRemoteStore>,
    pub locks: Arc<MockLockProvider>,
    pub publisher: Arc<MockPublisher>,
    pub manager: TieredCacheManager,
}

pub fn harness(config: TieredCacheConfig) -> Harness {
    harness_with_locks(config, MockLockProvider::granting())
}

pub fn harness_with_locks(config: TieredCacheConfig, locks: Arc<MockLockProvider>) -> Harness {
    let store = MockRemoteStore::new();
    let publisher = MockPublisher::new();
    let manager = TieredCacheManager::builder()
        .remote_store(store.clone())
        .lock_provider(locks.clone())
        .publisher(publisher.clone())
        .config(config)
        .build()
        .expect("manager builds");
    Harness {
        store,
        locks,
        publisher,
        manager,
    }
}
