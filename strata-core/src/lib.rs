#![warn(missing_docs)]
//! # strata-core
//!
//! Core traits and types for the strata two-tier cache.
//!
//! This crate defines everything the tier-coordination engine and its
//! backends agree on, without any I/O of its own:
//!
//! - **Policy** ([`TieredCacheConfig`], [`CacheStrategy`]) — per-cache
//!   effective strategies resolved from global defaults plus per-name
//!   overrides
//! - **Values** ([`CachedValue`], the null-sentinel token) — the stored
//!   value domain shared by both tiers
//! - **Seams** ([`RemoteStore`], [`LockProvider`], [`InvalidationPublisher`],
//!   [`InvalidationSink`]) — the traits backend crates implement
//! - **Wire** ([`CacheMessage`], [`instance_id`]) — the invalidation
//!   protocol spoken between processes
//! - **Errors** ([`CacheError`], [`BackendError`]) — the failure taxonomy

pub mod config;
pub mod error;
pub mod format;
pub mod lock;
pub mod message;
pub mod publish;
pub mod remote;
pub mod ttl;
pub mod value;

pub use config::{
    CacheStrategy, ClearMode, FallbackStrategy, LocalConfig, RemoteConfig, StrategyOverrides,
    TieredCacheConfig,
};
pub use error::{BackendError, BoxError, CacheError};
pub use format::{Format, FormatError, FormatExt, JsonFormat};
pub use lock::{LockGuard, LockProvider};
pub use message::{CacheMessage, MessageKind, CACHE_TOPIC, instance_id};
pub use publish::{InvalidationPublisher, InvalidationSink};
pub use remote::{BackendResult, DeleteStatus, RemoteStore};
pub use ttl::randomize_ttl;
pub use value::{CachedValue, NULL_VALUE, Raw, is_null_token, null_token};
