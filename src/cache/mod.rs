/// Read cache for toolhub
///
/// Holds serialized read responses (tool lists, tool details, comment
/// thread pages) and short-lived pending sign-up entries. Two backends:
/// - Redis, shared between processes
/// - In-process map, used when Redis is disabled and in tests
///
/// Reads and invalidations through [`Cache`] are best-effort: a backend
/// failure is logged and counted, and the caller falls through to the store.

pub mod invalidation;
pub mod keys;
mod memory;
mod redis_cache;

pub use invalidation::InvalidationCoordinator;
pub use memory::MemoryCache;
pub use redis_cache::RedisCache;

use crate::config::CacheSettings;
use crate::error::{MarketError, MarketResult};
use crate::metrics;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key-value storage behind the read cache
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a raw value
    async fn get(&self, key: &str) -> MarketResult<Option<String>>;

    /// Store a raw value with a TTL in seconds
    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> MarketResult<()>;

    /// Delete one key, returning how many entries were removed
    async fn delete(&self, key: &str) -> MarketResult<u64>;

    /// Delete every key starting with `prefix`, returning the count removed
    async fn delete_prefix(&self, prefix: &str) -> MarketResult<u64>;

    /// Check the backend is reachable
    async fn ping(&self) -> MarketResult<()>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// Cache facade shared by readers and writers
#[derive(Clone)]
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
    settings: CacheSettings,
}

impl Cache {
    /// Connect the configured backend
    pub async fn connect(settings: &CacheSettings) -> MarketResult<Self> {
        let backend: Arc<dyn CacheBackend> = if settings.redis_enabled {
            Arc::new(RedisCache::connect(&settings.redis_url).await?)
        } else {
            info!("Redis cache disabled, using in-process cache");
            Arc::new(MemoryCache::new())
        };

        Ok(Self::with_backend(backend, settings.clone()))
    }

    /// Build a cache over an explicit backend
    pub fn with_backend(backend: Arc<dyn CacheBackend>, settings: CacheSettings) -> Self {
        Self { backend, settings }
    }

    /// In-process cache with the given settings
    pub fn in_memory(settings: CacheSettings) -> Self {
        Self::with_backend(Arc::new(MemoryCache::new()), settings)
    }

    pub fn tool_ttl(&self) -> u64 {
        self.settings.tool_ttl
    }

    pub fn comment_ttl(&self) -> u64 {
        self.settings.comment_ttl
    }

    pub fn pending_signup_ttl(&self) -> u64 {
        self.settings.pending_signup_ttl
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn build_key(&self, key: &str) -> String {
        format!("{}{}", self.settings.key_prefix, key)
    }

    /// Read a cached response; misses, corrupt entries and backend errors all yield `None`
    pub async fn get_json<T: DeserializeOwned>(&self, kind: &str, key: &str) -> Option<T> {
        let cache_key = self.build_key(key);

        let raw = match self.backend.get(&cache_key).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Cache read failed for {}: {}", cache_key, e);
                metrics::record_cache_error("get");
                return None;
            }
        };

        match raw {
            Some(json) => match serde_json::from_str(&json) {
                Ok(value) => {
                    debug!("Cache HIT: {}", cache_key);
                    metrics::record_cache_access(kind, true);
                    Some(value)
                }
                Err(e) => {
                    warn!("Discarding corrupt cache entry {}: {}", cache_key, e);
                    let _ = self.backend.delete(&cache_key).await;
                    metrics::record_cache_access(kind, false);
                    None
                }
            },
            None => {
                debug!("Cache MISS: {}", cache_key);
                metrics::record_cache_access(kind, false);
                None
            }
        }
    }

    /// Populate a cache entry; failures are logged and ignored
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        if let Err(e) = self.try_put_json(key, value, ttl_secs).await {
            warn!("Cache write failed for {}: {}", key, e);
            metrics::record_cache_error("set");
        }
    }

    /// Store a value and surface failures to the caller
    pub async fn try_put_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: u64,
    ) -> MarketResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| MarketError::Internal(format!("Cache serialization failed: {}", e)))?;

        self.backend.set(&self.build_key(key), &json, ttl_secs).await
    }

    /// Read and delete an entry, surfacing backend failures
    pub async fn take_json<T: DeserializeOwned>(&self, key: &str) -> MarketResult<Option<T>> {
        let cache_key = self.build_key(key);
        let raw = self.backend.get(&cache_key).await?;

        let Some(json) = raw else {
            return Ok(None);
        };

        self.backend.delete(&cache_key).await?;

        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| MarketError::Internal(format!("Corrupt cache entry: {}", e)))
    }

    /// Delete keys; failures are logged and counted as zero removals
    pub async fn invalidate(&self, keys: &[String]) -> u64 {
        let mut removed = 0;
        for key in keys {
            let cache_key = self.build_key(key);
            match self.backend.delete(&cache_key).await {
                Ok(n) => removed += n,
                Err(e) => {
                    warn!("Cache invalidation failed for {}: {}", cache_key, e);
                    metrics::record_cache_error("delete");
                }
            }
        }
        removed
    }

    /// Delete every key under a namespace prefix
    pub async fn invalidate_prefix(&self, prefix: &str) -> u64 {
        let cache_prefix = self.build_key(prefix);
        match self.backend.delete_prefix(&cache_prefix).await {
            Ok(n) => n,
            Err(e) => {
                warn!("Cache prefix invalidation failed for {}: {}", cache_prefix, e);
                metrics::record_cache_error("delete_prefix");
                0
            }
        }
    }

    pub async fn ping(&self) -> MarketResult<()> {
        self.backend.ping().await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use std::path::PathBuf;

    /// Backend that fails every operation
    pub(crate) struct FailingCache;

    #[async_trait]
    impl CacheBackend for FailingCache {
        async fn get(&self, _key: &str) -> MarketResult<Option<String>> {
            Err(MarketError::UpstreamUnavailable("cache down".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str, _ttl_secs: u64) -> MarketResult<()> {
            Err(MarketError::UpstreamUnavailable("cache down".to_string()))
        }

        async fn delete(&self, _key: &str) -> MarketResult<u64> {
            Err(MarketError::UpstreamUnavailable("cache down".to_string()))
        }

        async fn delete_prefix(&self, _prefix: &str) -> MarketResult<u64> {
            Err(MarketError::UpstreamUnavailable("cache down".to_string()))
        }

        async fn ping(&self) -> MarketResult<()> {
            Err(MarketError::UpstreamUnavailable("cache down".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    pub(crate) fn settings() -> CacheSettings {
        ServerConfig::for_tests(PathBuf::from("./data")).cache
    }

    #[tokio::test]
    async fn test_json_round_trip_and_prefix_delete() {
        let cache = Cache::in_memory(settings());

        cache.put_json("comments:t1:1:10:newest:anonymous", &vec![1, 2], 60).await;
        cache.put_json("comments:t1:2:10:newest:anonymous", &vec![3], 60).await;
        cache.put_json("comments:t2:1:10:newest:anonymous", &vec![4], 60).await;

        let page: Option<Vec<i32>> = cache
            .get_json("comments", "comments:t1:1:10:newest:anonymous")
            .await;
        assert_eq!(page, Some(vec![1, 2]));

        assert_eq!(cache.invalidate_prefix("comments:t1:").await, 2);

        let gone: Option<Vec<i32>> = cache
            .get_json("comments", "comments:t1:2:10:newest:anonymous")
            .await;
        assert!(gone.is_none());

        let kept: Option<Vec<i32>> = cache
            .get_json("comments", "comments:t2:1:10:newest:anonymous")
            .await;
        assert_eq!(kept, Some(vec![4]));
    }

    #[tokio::test]
    async fn test_failing_backend_is_swallowed() {
        let cache = Cache::with_backend(Arc::new(FailingCache), settings());

        cache.put_json("allTools", &vec!["a"], 60).await;
        let value: Option<Vec<String>> = cache.get_json("tool_list", "allTools").await;
        assert!(value.is_none());
        assert_eq!(cache.invalidate(&["allTools".to_string()]).await, 0);
        assert_eq!(cache.invalidate_prefix("comments:").await, 0);
    }

    #[tokio::test]
    async fn test_take_removes_entry() {
        let cache = Cache::in_memory(settings());
        cache
            .try_put_json("pendingSignup:abc", &"payload", 60)
            .await
            .unwrap();

        let first: Option<String> = cache.take_json("pendingSignup:abc").await.unwrap();
        assert_eq!(first.as_deref(), Some("payload"));

        let second: Option<String> = cache.take_json("pendingSignup:abc").await.unwrap();
        assert!(second.is_none());
    }
}
