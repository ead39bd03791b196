//! TTL randomization.

use rand::Rng;

/// Applies a random offset to the base TTL so that entries written together
/// do not all expire together (avalanche defense).
///
/// `random_factor` is interpreted as a fraction of `base_ttl_ms`; the result
/// is uniform in `[base - base·f, base + base·f]`, clamped to at least 1 ms
/// so the write stays valid. A zero base or non-positive factor passes the
/// base through unchanged.
pub fn randomize_ttl(base_ttl_ms: u64, random_factor: f64) -> u64 {
    if base_ttl_ms == 0 || random_factor <= 0.0 {
        return base_ttl_ms;
    }
    let offset = (base_ttl_ms as f64 * random_factor) as i64;
    if offset == 0 {
        return base_ttl_ms;
    }
    let jitter = rand::thread_rng().gen_range(-offset..=offset);
    (base_ttl_ms as i64).saturating_add(jitter).max(1) as u64
}
