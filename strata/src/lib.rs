#![warn(missing_docs)]
//! # strata
//!
//! A two-tier cache for server fleets: each process runs a bounded
//! in-memory first tier (L1, [`moka`]) in front of a Redis second tier (L2)
//! shared by all processes. Application code reads and writes named caches
//! through one interface; the engine keeps the tiers coherent.
//!
//! - **Read-through** — `get_with` composes L1 → L2 → loader with two
//!   layers of single-flight: in-process coalescing on L1's atomic compute,
//!   and a distributed lock across processes, so a cold key is loaded once
//!   per fleet rather than once per caller (stampede defense).
//! - **Null sentinel** — a loader that finds nothing stores a short-lived
//!   placeholder, so confirmed-absent keys stop hammering the source
//!   (penetration defense).
//! - **TTL jitter** — remote TTLs are randomized within a configured factor
//!   so entries written together don't expire together (avalanche defense).
//! - **Invalidation** — writes and evictions broadcast best-effort messages
//!   over a pub/sub topic; peer processes drop their L1 entries and re-read
//!   from L2 on demand.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde::{Deserialize, Serialize};
//! use strata::{TieredCacheConfig, TieredCacheManager};
//! use strata_redis::{
//!     MessageSubscriber, RedisConnector, RedisLockProvider, RedisPublisher, RedisStore,
//! };
//!
//! #[derive(Serialize, Deserialize)]
//! struct User {
//!     id: String,
//!     name: String,
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = Arc::new(
//!     RedisConnector::builder().url("redis://localhost:6379/").build()?,
//! );
//! let manager = Arc::new(
//!     TieredCacheManager::builder()
//!         .remote_store(Arc::new(RedisStore::new(connector.clone())))
//!         .lock_provider(Arc::new(RedisLockProvider::new(connector.clone())))
//!         .publisher(Arc::new(RedisPublisher::new(connector.clone())))
//!         .config(TieredCacheConfig::default())
//!         .build()?,
//! );
//! MessageSubscriber::spawn(connector, manager.clone());
//!
//! let users = manager.get_cache("user_info").expect("dynamic mode");
//! let user = users
//!     .get_with("user_7", || async {
//!         // hit the database here
//!         Ok(Some(User { id: "7".into(), name: "ada".into() }))
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod manager;

pub use cache::{LocalStats, TieredCache};
pub use manager::{BuildError, TieredCacheManager, TieredCacheManagerBuilder};

pub use strata_core::{
    BackendError, BackendResult, BoxError, CacheError, CacheMessage, CacheStrategy, CachedValue,
    ClearMode, DeleteStatus, FallbackStrategy, Format, FormatError, InvalidationPublisher,
    InvalidationSink, JsonFormat, LocalConfig, LockGuard, LockProvider, MessageKind, NULL_VALUE,
    Raw, RemoteConfig, RemoteStore, StrategyOverrides, TieredCacheConfig, instance_id,
    is_null_token, null_token,
};
