//! KV store seam for caches and rate-limit counters.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/18/2026 - Initial implementation (Claude)

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Interface to the external KV collaborator.
///
/// The production deployment backs this with a networked store that supports
/// atomic increment-with-expiry; callers never read-modify-write counters.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Atomically increment a counter, setting `ttl` when the key is created.
    /// Returns the post-increment value.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64>;
}

struct Entry {
    bytes: Vec<u8>,
    counter: i64,
    expires_at: Instant,
}

/// In-memory `KvStore` for tests and single-node deployments.
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.bytes.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                bytes: value,
                counter: 0,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64> {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > now => {
                entry.counter += 1;
                Ok(entry.counter)
            }
            _ => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        bytes: Vec::new(),
                        counter: 1,
                        expires_at: now + ttl,
                    },
                );
                Ok(1)
            }
        }
    }
}

/// A `KvStore` that fails every call; used to exercise degraded paths.
#[cfg(test)]
pub struct FailingKv;

#[cfg(test)]
#[async_trait]
impl KvStore for FailingKv {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        anyhow::bail!("kv unavailable")
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
        anyhow::bail!("kv unavailable")
    }

    async fn incr(&self, _key: &str, _ttl: Duration) -> Result<i64> {
        anyhow::bail!("kv unavailable")
    }
}
