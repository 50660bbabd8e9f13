//! In-process cache backend on `moka`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use super::{CacheBackend, CacheError};

const MAX_ENTRIES: u64 = 10_000;

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Expire each entry after its own TTL.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Process-local backend; used for single-instance deployments and tests.
#[derive(Clone)]
pub struct MemoryBackend {
    cache: Cache<String, Entry>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_ENTRIES)
            .expire_after(PerEntryTtl)
            .build();
        Self { cache }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.cache.get(key).await.map(|entry| entry.value))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.cache
            .insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError> {
        let keys: Vec<String> = self
            .cache
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| (*key).clone())
            .collect();

        for key in &keys {
            self.cache.invalidate(key).await;
        }
        Ok(keys.len() as u64)
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let backend = MemoryBackend::new();
        backend
            .set_ex("woo:short", "1", Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(backend.get("woo:short").await.unwrap().as_deref(), Some("1"));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(backend.get("woo:short").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_prefix_counts_removed_keys() {
        let backend = MemoryBackend::new();
        backend.set_ex("woo:a:1", "1", Duration::from_secs(60)).await.unwrap();
        backend.set_ex("woo:a:2", "2", Duration::from_secs(60)).await.unwrap();
        backend.set_ex("woo:b", "3", Duration::from_secs(60)).await.unwrap();

        assert_eq!(backend.delete_prefix("woo:a").await.unwrap(), 2);
        assert!(backend.get("woo:b").await.unwrap().is_some());
    }
}
