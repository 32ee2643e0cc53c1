//! Deterministic short identifiers for flights and pricing entries.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/18/2026 - Initial implementation (Claude)

use lru::LruCache;
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Hex characters kept from the digest. Short enough to be cheap as a map
/// key, long enough that collisions within one request are not a concern.
const UUID_LEN: usize = 16;

/// Bound on the digest memo; identity tuples repeat heavily across requests.
const UUID_CACHE_CAP: usize = 50_000;

static UUID_CACHE: Lazy<Mutex<LruCache<String, String>>> = Lazy::new(|| {
    Mutex::new(LruCache::new(
        NonZeroUsize::new(UUID_CACHE_CAP).expect("cache capacity is non-zero"),
    ))
});

/// Compute the stable identity digest for a flight.
///
/// Identity covers only the immutable tuple (flight number, departure,
/// arrival); seat counts and fares never feed the digest, so the same
/// physical flight hashes identically across requests.
pub fn flight_uuid(flight_number: &str, departs_at: &str, arrives_at: &str) -> String {
    let key = format!("{}|{}|{}", flight_number, departs_at, arrives_at);

    {
        let mut cache = UUID_CACHE.lock().unwrap();
        if let Some(uuid) = cache.get(&key) {
            return uuid.clone();
        }
    }

    let uuid = short_digest(&key);

    let mut cache = UUID_CACHE.lock().unwrap();
    if cache.len() >= UUID_CACHE_CAP {
        // Shed the oldest tenth in one pass rather than churning per insert.
        for _ in 0..UUID_CACHE_CAP / 10 {
            cache.pop_lru();
        }
    }
    cache.put(key, uuid.clone());
    uuid
}

/// Digest for a pricing entry key (flight number, origin, destination, source).
pub fn pricing_id(flight_number: &str, origin: &str, destination: &str, source: &str) -> String {
    short_digest(&format!(
        "{}|{}|{}|{}",
        flight_number, origin, destination, source
    ))
}

/// Full sha256 hex digest, used for cache-key hashing.
pub fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn short_digest(content: &str) -> String {
    let mut digest = sha256_hex(content);
    digest.truncate(UUID_LEN);
    digest
}
