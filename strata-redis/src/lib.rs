#![warn(missing_docs)]
//! # strata-redis
//!
//! Redis implementations of the strata backend seams:
//!
//! - [`RedisStore`] — the remote (L2) tier: one hash per cache with
//!   per-field TTLs, atomic put / put-if-absent, whole-hash clear via
//!   `UNLINK` where the server supports it
//! - [`RedisLockProvider`] — distributed single-flight locks with
//!   watchdog lease renewal
//! - [`RedisPublisher`] — fire-and-forget invalidation publication
//! - [`MessageSubscriber`] — the invalidation topic consumer
//!
//! All of them share one lazily established connection through a
//! [`RedisConnector`]:
//!
//! ```no_run
//! use strata_redis::RedisConnector;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = RedisConnector::builder()
//!     .url("redis://localhost:6379/")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

pub mod connector;
pub mod error;
pub mod lock;
pub mod publisher;
pub mod store;
pub mod subscriber;

pub use connector::{RedisConnector, RedisConnectorBuilder};
pub use error::Error;
pub use lock::RedisLockProvider;
pub use publisher::RedisPublisher;
pub use store::RedisStore;
pub use subscriber::MessageSubscriber;
