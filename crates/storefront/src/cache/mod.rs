//! Best-effort read-through cache for catalog reads.
//!
//! The only way to touch the cache is [`ReadThroughCache::get_or_set`]:
//! look the key up, and on a miss run the producer and store its result.
//! Caching never becomes a point of failure. With no backend configured, or
//! when the backend errors, the producer's result is returned directly.
//!
//! Entries are not invalidated when orders are placed; staleness is bounded
//! by the TTL. The content webhook is the only caller of
//! [`ReadThroughCache::invalidate`].

mod catalog;
mod memory;
mod redis_store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{CacheBackendKind, CacheConfig};

pub use catalog::CachedCatalog;
pub use memory::MemoryBackend;
pub use redis_store::RedisBackend;

/// Prefix applied to every key written by the storefront.
pub const KEY_PREFIX: &str = "woo:";

/// Entry lifetime when none is configured.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Errors raised by cache backends.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("Cache backend unavailable: {0}")]
    Unavailable(String),
}

/// A remote or local key-value store with per-entry expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a value.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value that expires after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Delete one key.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every key starting with `prefix`, returning how many went.
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, CacheError>;

    /// Check the backend is reachable.
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Read-through cache wrapper.
#[derive(Clone)]
pub struct ReadThroughCache {
    backend: Option<Arc<dyn CacheBackend>>,
    default_ttl: Duration,
    prefix: String,
}

impl std::fmt::Debug for ReadThroughCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("enabled", &self.backend.is_some())
            .field("default_ttl", &self.default_ttl)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl ReadThroughCache {
    /// Wrap a backend (or none).
    #[must_use]
    pub fn new(backend: Option<Arc<dyn CacheBackend>>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
            prefix: KEY_PREFIX.to_string(),
        }
    }

    /// A cache that always calls the producer.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None, DEFAULT_TTL)
    }

    /// Build the cache described by configuration.
    ///
    /// A Redis backend that cannot be reached at startup is logged and the
    /// cache runs disabled.
    pub async fn from_config(config: &CacheConfig) -> Self {
        let backend: Option<Arc<dyn CacheBackend>> = match config.backend {
            CacheBackendKind::None => None,
            CacheBackendKind::Memory => Some(Arc::new(MemoryBackend::new()) as Arc<dyn CacheBackend>),
            CacheBackendKind::Redis => {
                let Some(url) = config.redis_url.as_ref() else {
                    warn!("Redis cache selected without REDIS_URL, caching disabled");
                    return Self::new(None, config.ttl);
                };
                match RedisBackend::connect(url.expose_secret()).await {
                    Ok(backend) => Some(Arc::new(backend) as Arc<dyn CacheBackend>),
                    Err(e) => {
                        warn!(error = %e, "Failed to connect to Redis, caching disabled");
                        None
                    }
                }
            }
        };

        info!(
            backend = ?config.backend,
            enabled = backend.is_some(),
            ttl_secs = config.ttl.as_secs(),
            "Read-through cache configured"
        );
        Self::new(backend, config.ttl)
    }

    /// Whether a backend is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    /// Return the cached value for `key`, or run `producer` and cache its
    /// `Ok` result for `ttl` (default TTL when `None`).
    ///
    /// # Errors
    ///
    /// Only the producer's own error is ever returned.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        producer: F,
        ttl: Option<Duration>,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(backend) = &self.backend else {
            return producer().await;
        };
        let full_key = self.full_key(key);

        match backend.get(&full_key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    debug!(key = %full_key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => warn!(key = %full_key, error = %e, "Discarding undecodable cache entry"),
            },
            Ok(None) => debug!(key = %full_key, "Cache miss"),
            Err(e) => {
                warn!(key = %full_key, error = %e, "Cache read failed, fetching directly");
                return producer().await;
            }
        }

        let value = producer().await?;

        match serde_json::to_string(&value) {
            Ok(serialized) => {
                let ttl = ttl.unwrap_or(self.default_ttl);
                if let Err(e) = backend.set_ex(&full_key, &serialized, ttl).await {
                    warn!(key = %full_key, error = %e, "Cache write failed");
                }
            }
            Err(e) => warn!(key = %full_key, error = %e, "Failed to serialize value for cache"),
        }

        Ok(value)
    }

    /// Delete entries whose key (after the storefront prefix) starts with
    /// `pattern`. Failures are logged.
    pub async fn invalidate(&self, pattern: &str) {
        let Some(backend) = &self.backend else {
            return;
        };
        let prefix = self.full_key(pattern);
        match backend.delete_prefix(&prefix).await {
            Ok(removed) => info!(prefix = %prefix, removed, "Cache invalidated"),
            Err(e) => warn!(prefix = %prefix, error = %e, "Cache invalidation failed"),
        }
    }

    /// Delete the single entry stored under `key`. Failures are logged.
    pub async fn remove(&self, key: &str) {
        let Some(backend) = &self.backend else {
            return;
        };
        let full_key = self.full_key(key);
        match backend.delete(&full_key).await {
            Ok(()) => debug!(key = %full_key, "Cache entry removed"),
            Err(e) => warn!(key = %full_key, error = %e, "Cache entry removal failed"),
        }
    }

    /// Delete every storefront entry.
    pub async fn clear_all(&self) {
        self.invalidate("").await;
    }

    /// Backend health: `None` when caching is disabled.
    pub async fn ping(&self) -> Option<bool> {
        let backend = self.backend.as_ref()?;
        Some(backend.ping().await.is_ok())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingBackend {
        fail_reads: bool,
    }

    #[async_trait]
    impl CacheBackend for FailingBackend {
        async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
            if self.fail_reads {
                Err(CacheError::Unavailable("connection refused".to_string()))
            } else {
                Ok(None)
            }
        }

        async fn set_ex(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("read only".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn delete_prefix(&self, _prefix: &str) -> Result<u64, CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }

        async fn ping(&self) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".to_string()))
        }
    }

    fn memory_cache() -> (ReadThroughCache, Arc<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let dyn_backend: Arc<dyn CacheBackend> = backend.clone();
        let cache = ReadThroughCache::new(Some(dyn_backend), DEFAULT_TTL);
        (cache, backend)
    }

    #[tokio::test]
    async fn test_disabled_cache_calls_producer_every_time() {
        let cache = ReadThroughCache::disabled();
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        for _ in 0..2 {
            let value: Result<u32, ()> = cache
                .get_or_set(
                    "k",
                    move || async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(7)
                    },
                    None,
                )
                .await;
            assert_eq!(value, Ok(7));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.ping().await, None);
    }

    #[tokio::test]
    async fn test_hit_skips_producer() {
        let (cache, backend) = memory_cache();
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        for _ in 0..3 {
            let value: Result<Vec<String>, ()> = cache
                .get_or_set(
                    "categories",
                    move || async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Ok(vec!["Men".to_string()])
                    },
                    None,
                )
                .await;
            assert_eq!(value.unwrap(), vec!["Men".to_string()]);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(backend.get("woo:categories").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let (cache, backend) = memory_cache();

        let first: Result<u32, &str> = cache.get_or_set("p", || async { Err("upstream down") }, None).await;
        assert_eq!(first, Err("upstream down"));
        assert!(backend.get("woo:p").await.unwrap().is_none());

        let second: Result<u32, &str> = cache.get_or_set("p", || async { Ok(3) }, None).await;
        assert_eq!(second, Ok(3));
    }

    #[tokio::test]
    async fn test_backend_read_failure_falls_back_to_producer() {
        let cache = ReadThroughCache::new(
            Some(Arc::new(FailingBackend { fail_reads: true }) as Arc<dyn CacheBackend>),
            DEFAULT_TTL,
        );
        let value: Result<String, ()> = cache
            .get_or_set("k", || async { Ok("fresh".to_string()) }, None)
            .await;
        assert_eq!(value.as_deref(), Ok("fresh"));
        assert_eq!(cache.ping().await, Some(false));
    }

    #[tokio::test]
    async fn test_backend_write_failure_still_returns_value() {
        let cache = ReadThroughCache::new(
            Some(Arc::new(FailingBackend { fail_reads: false }) as Arc<dyn CacheBackend>),
            DEFAULT_TTL,
        );
        let value: Result<u64, ()> = cache.get_or_set("k", || async { Ok(42) }, None).await;
        assert_eq!(value, Ok(42));
        // Invalidation failures are swallowed.
        cache.remove("k").await;
        cache.clear_all().await;
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_treated_as_miss() {
        let (cache, backend) = memory_cache();
        backend.set_ex("woo:n", "not json", DEFAULT_TTL).await.unwrap();

        let value: Result<u32, ()> = cache.get_or_set("n", || async { Ok(9) }, None).await;
        assert_eq!(value, Ok(9));
        assert_eq!(backend.get("woo:n").await.unwrap().as_deref(), Some("9"));
    }

    #[tokio::test]
    async fn test_invalidate_by_prefix() {
        let (cache, backend) = memory_cache();
        for key in ["products:1:12", "products:2:12", "categories"] {
            let _: Result<u8, ()> = cache.get_or_set(key, || async { Ok(1) }, None).await;
        }

        cache.invalidate("products").await;
        assert!(backend.get("woo:products:1:12").await.unwrap().is_none());
        assert!(backend.get("woo:categories").await.unwrap().is_some());

        cache.clear_all().await;
        assert!(backend.get("woo:categories").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_deletes_exact_key_only() {
        let (cache, backend) = memory_cache();
        for key in ["product:1", "product:10", "product:123"] {
            let _: Result<u8, ()> = cache.get_or_set(key, || async { Ok(1) }, None).await;
        }

        cache.remove("product:1").await;
        assert!(backend.get("woo:product:1").await.unwrap().is_none());
        assert!(backend.get("woo:product:10").await.unwrap().is_some());
        assert!(backend.get("woo:product:123").await.unwrap().is_some());
    }
}
