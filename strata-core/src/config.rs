//! Configuration tree and the policy resolver.
//!
//! [`TieredCacheConfig`] mirrors the `cache.tiered` configuration keys of
//! the embedding application. Per-cache behavior is resolved through
//! [`TieredCacheConfig::effective_strategy`], which overlays the per-name
//! [`StrategyOverrides`] on the global defaults and returns a fully
//! populated [`CacheStrategy`].

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Behavior when the distributed lock cannot be acquired within the
/// configured wait time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum FallbackStrategy {
    /// Surface the contention to the caller as
    /// [`CacheError::LockContended`](crate::CacheError::LockContended).
    #[default]
    Throw,
    /// Call the loader directly and write the result back to the remote
    /// tier. Concurrent fallback loaders may overwrite each other's write;
    /// this trades consistency for availability.
    Fallback,
}

/// How [`clear`](crate::remote::RemoteStore::clear)-ing a cache treats the
/// remote tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClearMode {
    /// Invalidate only the local tier and broadcast CLEAR; remote entries
    /// expire through their TTLs. Safe to call under load.
    #[default]
    Safe,
    /// Delete the whole remote hash as well.
    Full,
}

/// Local (L1) tier defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalConfig {
    /// Maximum number of entries per cache.
    #[serde(default = "default_local_maximum_size")]
    pub maximum_size: u64,
    /// Write TTL for local entries (e.g. "5m", "30s").
    #[serde(default = "default_local_expire_after_write", with = "humantime_serde")]
    pub expire_after_write: Duration,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            maximum_size: default_local_maximum_size(),
            expire_after_write: default_local_expire_after_write(),
        }
    }
}

/// Remote (L2) tier defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteConfig {
    /// Default TTL for real values (e.g. "1h").
    #[serde(default = "default_remote_ttl", with = "humantime_serde")]
    pub default_ttl: Duration,
    /// TTL for null-sentinel entries. Applied exactly, never randomized.
    #[serde(default = "default_null_value_ttl", with = "humantime_serde")]
    pub null_value_ttl: Duration,
    /// Jitter factor in `[0, 1]` applied to real-value TTLs to spread
    /// expirations.
    #[serde(default = "default_ttl_random_factor")]
    pub ttl_random_factor: f64,
    /// How long a loader waits for the distributed lock before falling back.
    #[serde(default = "default_lock_wait_time_ms")]
    pub lock_wait_time_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            default_ttl: default_remote_ttl(),
            null_value_ttl: default_null_value_ttl(),
            ttl_random_factor: default_ttl_random_factor(),
            lock_wait_time_ms: default_lock_wait_time_ms(),
        }
    }
}

/// Per-cache overrides. Any field left unset inherits the global default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StrategyOverrides {
    /// Overrides [`RemoteConfig::default_ttl`].
    #[serde(default, with = "humantime_serde")]
    pub remote_ttl: Option<Duration>,
    /// Overrides [`LocalConfig::expire_after_write`].
    #[serde(default, with = "humantime_serde")]
    pub local_ttl: Option<Duration>,
    /// Overrides [`LocalConfig::maximum_size`].
    #[serde(default)]
    pub local_max_size: Option<u64>,
    /// Overrides [`TieredCacheConfig::default_fallback_strategy`].
    #[serde(default)]
    pub fallback_strategy: Option<FallbackStrategy>,
    /// Overrides [`TieredCacheConfig::default_clear_mode`].
    #[serde(default)]
    pub clear_mode: Option<ClearMode>,
}

/// Fully resolved strategy for one cache. All fields are populated.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStrategy {
    /// TTL for real values in the remote tier (before randomization).
    pub remote_ttl: Duration,
    /// Write TTL for local entries.
    pub local_ttl: Duration,
    /// Maximum number of local entries.
    pub local_max_size: u64,
    /// Behavior on lock-acquisition timeout.
    pub fallback_strategy: FallbackStrategy,
    /// Behavior of `clear()` towards the remote tier.
    pub clear_mode: ClearMode,
}

/// Configuration for the tiered cache manager (`cache.tiered` keys).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TieredCacheConfig {
    /// Whether the embedding application should wire the tiered cache up at
    /// all. The library itself does not gate on this flag.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Prefix prepended to distributed-lock keys.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,
    /// Predefined cache names. Non-empty pins the manager to static mode;
    /// empty enables dynamic creation on first use.
    #[serde(default)]
    pub cache_names: Vec<String>,
    /// Local tier defaults.
    #[serde(default)]
    pub local: LocalConfig,
    /// Remote tier defaults.
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Global default fallback strategy.
    #[serde(default)]
    pub default_fallback_strategy: FallbackStrategy,
    /// Global default clear mode.
    #[serde(default)]
    pub default_clear_mode: ClearMode,
    /// Per-cache strategy overrides, keyed by cache name.
    #[serde(default)]
    pub caches: HashMap<String, StrategyOverrides>,
}

impl Default for TieredCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            cache_prefix: default_cache_prefix(),
            cache_names: Vec::new(),
            local: LocalConfig::default(),
            remote: RemoteConfig::default(),
            default_fallback_strategy: FallbackStrategy::default(),
            default_clear_mode: ClearMode::default(),
            caches: HashMap::new(),
        }
    }
}

impl TieredCacheConfig {
    /// Resolves the effective strategy for `name`.
    ///
    /// Fields set in `caches.<name>` win; anything unset inherits the global
    /// default. Pure and safe to call repeatedly.
    pub fn effective_strategy(&self, name: &str) -> CacheStrategy {
        let overrides = self.caches.get(name);
        CacheStrategy {
            remote_ttl: overrides
                .and_then(|o| o.remote_ttl)
                .unwrap_or(self.remote.default_ttl),
            local_ttl: overrides
                .and_then(|o| o.local_ttl)
                .unwrap_or(self.local.expire_after_write),
            local_max_size: overrides
                .and_then(|o| o.local_max_size)
                .unwrap_or(self.local.maximum_size),
            fallback_strategy: overrides
                .and_then(|o| o.fallback_strategy)
                .unwrap_or(self.default_fallback_strategy),
            clear_mode: overrides
                .and_then(|o| o.clear_mode)
                .unwrap_or(self.default_clear_mode),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_cache_prefix() -> String {
    "cache:".to_string()
}

fn default_local_maximum_size() -> u64 {
    1000
}

fn default_local_expire_after_write() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_remote_ttl() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_null_value_ttl() -> Duration {
    Duration::from_secs(60)
}

fn default_ttl_random_factor() -> f64 {
    0.1
}

fn default_lock_wait_time_ms() -> u64 {
    500
}
