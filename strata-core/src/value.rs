//! The stored value domain shared by both tiers.
//!
//! Entries in either tier hold a raw byte token: the codec-serialized value,
//! or the fixed null-sentinel string recording a confirmed absence in the
//! source of truth. The sentinel keeps permanently missing keys from hitting
//! the loader on every read (cache-penetration defense).

use bytes::Bytes;

/// Raw byte token stored in both tiers.
///
/// `Bytes` gives cheap reference-counted cloning between the tiers.
pub type Raw = Bytes;

/// Sentinel token stored in place of a real value to record a confirmed
/// absence.
pub const NULL_VALUE: &str = "@@TIERED_CACHE_NULL_VALUE@@";

/// Returns the sentinel as a raw token.
pub fn null_token() -> Raw {
    Bytes::from_static(NULL_VALUE.as_bytes())
}

/// Whether a raw token is the null sentinel.
///
/// Unambiguous against codec output: a JSON-serialized string of the same
/// characters would carry surrounding quotes.
pub fn is_null_token(raw: &[u8]) -> bool {
    raw == NULL_VALUE.as_bytes()
}

/// Wrapper distinguishing "cached null" from "not cached".
///
/// A `CachedValue` is only produced on a cache hit; its inner value is
/// `None` when the hit was the null sentinel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedValue<T>(Option<T>);

impl<T> CachedValue<T> {
    /// Wraps a real value.
    pub fn new(value: T) -> Self {
        CachedValue(Some(value))
    }

    /// The wrapper for a null-sentinel hit.
    pub fn empty() -> Self {
        CachedValue(None)
    }

    /// Borrows the inner value, if any.
    pub fn value(&self) -> Option<&T> {
        self.0.as_ref()
    }

    /// Consumes the wrapper, returning the inner value.
    pub fn into_inner(self) -> Option<T> {
        self.0
    }
}

impl<T> From<Option<T>> for CachedValue<T> {
    fn from(value: Option<T>) -> Self {
        CachedValue(value)
    }
}
