/// Redis cache backend
use super::CacheBackend;
use crate::error::{MarketError, MarketResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::{debug, error, info, warn};

/// Redis cache client
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis
    pub async fn connect(redis_url: &str) -> MarketResult<Self> {
        info!("Connecting to Redis at {}", redis_url);

        let client = Client::open(redis_url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            MarketError::UpstreamUnavailable(format!("Redis client creation failed: {}", e))
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            MarketError::UpstreamUnavailable(format!("Redis connection failed: {}", e))
        })?;

        info!("✓ Redis connection established");

        Ok(Self { connection })
    }
}

fn unavailable(op: &str, e: redis::RedisError) -> MarketError {
    MarketError::UpstreamUnavailable(format!("Cache {} failed: {}", op, e))
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn get(&self, key: &str) -> MarketResult<Option<String>> {
        debug!("Cache GET: {}", key);

        let mut conn = self.connection.clone();
        conn.get(key).await.map_err(|e| {
            warn!("Redis GET failed for {}: {}", key, e);
            unavailable("get", e)
        })
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> MarketResult<()> {
        debug!("Cache SET: {} (TTL: {}s)", key, ttl_secs);

        let mut conn = self.connection.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|e| {
                warn!("Redis SET failed for {}: {}", key, e);
                unavailable("set", e)
            })
    }

    async fn delete(&self, key: &str) -> MarketResult<u64> {
        debug!("Cache DELETE: {}", key);

        let mut conn = self.connection.clone();
        conn.del(key).await.map_err(|e| {
            warn!("Redis DELETE failed for {}: {}", key, e);
            unavailable("delete", e)
        })
    }

    async fn delete_prefix(&self, prefix: &str) -> MarketResult<u64> {
        let pattern = format!("{}*", prefix);
        let mut conn = self.connection.clone();

        let keys: Vec<String> = conn.keys(&pattern).await.map_err(|e| {
            error!("Redis KEYS failed: {}", e);
            unavailable("keys lookup", e)
        })?;

        if keys.is_empty() {
            return Ok(0);
        }

        let deleted: u64 = conn.del(&keys).await.map_err(|e| {
            error!("Redis DELETE multiple keys failed: {}", e);
            unavailable("prefix delete", e)
        })?;

        debug!("Cache flushed {} keys matching {}", deleted, pattern);
        Ok(deleted)
    }

    async fn ping(&self) -> MarketResult<()> {
        let mut conn = self.connection.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("ping", e))?;

        if pong != "PONG" {
            return Err(MarketError::UpstreamUnavailable(
                "Unexpected Redis PING response".to_string(),
            ));
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
