//! Provider credential rotation (pro_key table).
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/22/2026 - Initial implementation (Claude)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// One row of the pro_key table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProKey {
    pub pro_key: String,
    pub remaining: i64,
    pub last_updated: DateTime<Utc>,
}

/// Credential-store collaborator. `acquire` returns the key with the most
/// remaining quota; `compare_and_update` only writes when `remaining` still
/// matches the value read at acquisition, so concurrent requests never clobber
/// each other's accounting.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn acquire(&self) -> Result<Option<ProKey>>;

    async fn compare_and_update(
        &self,
        pro_key: &str,
        expected_remaining: i64,
        new_remaining: i64,
    ) -> Result<bool>;
}

/// In-memory store for tests and single-node deployments.
pub struct MemoryCredentialStore {
    keys: Mutex<HashMap<String, ProKey>>,
}

impl MemoryCredentialStore {
    pub fn new(keys: Vec<ProKey>) -> Self {
        Self {
            keys: Mutex::new(keys.into_iter().map(|k| (k.pro_key.clone(), k)).collect()),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn acquire(&self) -> Result<Option<ProKey>> {
        let keys = self.keys.lock().unwrap();
        Ok(keys
            .values()
            .filter(|k| k.remaining > 0)
            .max_by_key(|k| k.remaining)
            .cloned())
    }

    async fn compare_and_update(
        &self,
        pro_key: &str,
        expected_remaining: i64,
        new_remaining: i64,
    ) -> Result<bool> {
        let mut keys = self.keys.lock().unwrap();
        match keys.get_mut(pro_key) {
            Some(row) if row.remaining == expected_remaining => {
                row.remaining = new_remaining;
                row.last_updated = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str, remaining: i64) -> ProKey {
        ProKey {
            pro_key: name.into(),
            remaining,
            last_updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_acquire_picks_max_remaining() {
        let store = MemoryCredentialStore::new(vec![key("a", 10), key("b", 500), key("c", 99)]);
        let picked = store.acquire().await.unwrap().unwrap();
        assert_eq!(picked.pro_key, "b");
    }

    #[tokio::test]
    async fn test_acquire_none_when_exhausted() {
        let store = MemoryCredentialStore::new(vec![key("a", 0)]);
        assert!(store.acquire().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cas_rejects_stale_writer() {
        let store = MemoryCredentialStore::new(vec![key("a", 100)]);

        // First writer wins.
        assert!(store.compare_and_update("a", 100, 90).await.unwrap());
        // Second writer read the same 100; its update must lose.
        assert!(!store.compare_and_update("a", 100, 95).await.unwrap());

        let current = store.acquire().await.unwrap().unwrap();
        assert_eq!(current.remaining, 90);
    }
}
