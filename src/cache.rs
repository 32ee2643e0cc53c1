//! Compressed cache facade over the KV collaborator.
//!
//! # CHANGELOG (recent first, max 5 entries)
//! 07/19/2026 - Availability subquery key family (Claude)
//! 07/18/2026 - Initial implementation (Claude)

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use crate::ids;
use crate::kv::KvStore;

/// Best-effort compressed JSON cache. Reads fall through on any failure;
/// writes log and continue. Correctness never depends on a cache hit.
pub struct CacheFacade {
    kv: Arc<dyn KvStore>,
    ttl: Duration,
}

impl CacheFacade {
    pub fn new(kv: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// Key for the raw (pre-filter) search record.
    pub fn raw_key(origin: &str, destination: &str, core_params_hash: &str) -> String {
        format!("build-itins:{}:{}:{}", origin, destination, core_params_hash)
    }

    /// Key for a filtered/paginated response derived from `raw_key`.
    pub fn filtered_key(raw_key: &str, filter_hash: &str) -> String {
        format!("{}:{}", raw_key, filter_hash)
    }

    /// Key for one availability subquery.
    pub fn availability_key(params_canonical: &str) -> String {
        format!("availability:{}", ids::sha256_hex(params_canonical))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = match self.kv.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!("Cache MISS: {}", key);
                return None;
            }
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };

        match decompress_json(&bytes) {
            Ok(value) => {
                tracing::debug!("Cache HIT: {}", key);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("Cache record corrupt for {}: {}", key, e);
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        let bytes = match compress_json(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Cache encode failed for {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.kv.set(key, bytes, self.ttl).await {
            tracing::warn!("Cache write failed for {}: {}", key, e);
        }
    }
}

fn compress_json<T: Serialize>(value: &T) -> anyhow::Result<Vec<u8>> {
    let json = serde_json::to_vec(value)?;
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

fn decompress_json<T: DeserializeOwned>(bytes: &[u8]) -> anyhow::Result<T> {
    let mut decoder = ZlibDecoder::new(bytes);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{FailingKv, MemoryKv};
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Record {
        name: String,
        values: Vec<u32>,
    }

    fn record() -> Record {
        Record {
            name: "itineraries".into(),
            values: (0..200).collect(),
        }
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let cache = CacheFacade::new(Arc::new(MemoryKv::new()), Duration::from_secs(60));
        cache.set_json("k", &record()).await;
        let back: Record = cache.get_json("k").await.unwrap();
        assert_eq!(back, record());
    }

    #[tokio::test]
    async fn test_values_are_compressed() {
        let kv = Arc::new(MemoryKv::new());
        let cache = CacheFacade::new(kv.clone(), Duration::from_secs(60));
        cache.set_json("k", &record()).await;

        let stored = kv.get("k").await.unwrap().unwrap();
        let plain = serde_json::to_vec(&record()).unwrap();
        assert!(stored.len() < plain.len());
    }

    #[tokio::test]
    async fn test_kv_failure_is_best_effort() {
        let cache = CacheFacade::new(Arc::new(FailingKv), Duration::from_secs(60));
        cache.set_json("k", &record()).await;
        let got: Option<Record> = cache.get_json("k").await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_record_is_a_miss() {
        let kv = Arc::new(MemoryKv::new());
        kv.set("k", b"not zlib".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        let cache = CacheFacade::new(kv, Duration::from_secs(60));
        let got: Option<Record> = cache.get_json("k").await;
        assert!(got.is_none());
    }

    #[test]
    fn test_key_families() {
        let raw = CacheFacade::raw_key("SGN", "HAN", "abc123");
        assert_eq!(raw, "build-itins:SGN:HAN:abc123");
        assert_eq!(CacheFacade::filtered_key(&raw, "def"), "build-itins:SGN:HAN:abc123:def");
        assert!(CacheFacade::availability_key("{}").starts_with("availability:"));
    }
}
