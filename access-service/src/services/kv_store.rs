use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use super::error::ServiceError;

/// Single-key operations against the TTL-backed cache. Every call is atomic
/// for its key; nothing spans keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), ServiceError>;
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError>;
    /// Returns whether a key was removed.
    async fn delete(&self, key: &str) -> Result<bool, ServiceError>;
    /// Increment a counter, arming `ttl_seconds` whenever the key has no expiry.
    /// An expiry that is already running is left alone.
    async fn incr_with_ttl(&self, key: &str, ttl_seconds: u64) -> Result<i64, ServiceError>;
    async fn health_check(&self) -> Result<(), ServiceError>;
}

#[derive(Clone)]
pub struct RedisService {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisService {
    pub async fn new(config: &crate::config::RedisConfig) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis");
        let client = Client::open(config.url.clone())?;

        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }
}

#[async_trait]
impl KeyValueStore for RedisService {
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), ServiceError> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<bool, ServiceError> {
        let mut conn = self.manager.clone();
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }

    async fn incr_with_ttl(&self, key: &str, ttl_seconds: u64) -> Result<i64, ServiceError> {
        let mut conn = self.manager.clone();
        // MULTI/EXEC so a counter never outlives a failed EXPIRE. NX keeps
        // the window fixed and re-arms a key left without a TTL.
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .cmd("INCR")
            .arg(key)
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl_seconds)
            .arg("NX")
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(count)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        let mut conn = self.manager.clone();
        redis::cmd("PING").query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }
}

type MockEntry = (String, Option<Instant>);

/// In-memory store with real TTL semantics, for tests.
#[derive(Default)]
pub struct MockKeyValueStore {
    entries: Mutex<HashMap<String, MockEntry>>,
}

impl MockKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire a key immediately, as if its TTL had elapsed.
    pub fn expire_now(&self, key: &str) -> Result<(), ServiceError> {
        self.lock()?.remove(key);
        Ok(())
    }

    /// Store a value with no expiry, like a plain `SET`.
    pub fn set_persistent(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        self.lock()?.insert(key.to_string(), (value.to_string(), None));
        Ok(())
    }

    pub fn contains(&self, key: &str) -> Result<bool, ServiceError> {
        let entries = self.lock()?;
        Ok(entries
            .get(key)
            .is_some_and(|(_, expires_at)| !Self::is_expired(*expires_at)))
    }

    fn is_expired(expires_at: Option<Instant>) -> bool {
        expires_at.is_some_and(|at| at <= Instant::now())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, MockEntry>>, ServiceError> {
        self.entries
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Mock store mutex poisoned: {}", e)))
    }

    fn live<'a>(entries: &'a mut HashMap<String, MockEntry>, key: &str) -> Option<&'a mut MockEntry> {
        let expired = entries
            .get(key)
            .is_some_and(|(_, expires_at)| Self::is_expired(*expires_at));
        if expired {
            entries.remove(key);
        }
        entries.get_mut(key)
    }
}

#[async_trait]
impl KeyValueStore for MockKeyValueStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), ServiceError> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds);
        self.lock()?
            .insert(key.to_string(), (value.to_string(), Some(expires_at)));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let mut entries = self.lock()?;
        Ok(Self::live(&mut entries, key).map(|(value, _)| value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool, ServiceError> {
        let mut entries = self.lock()?;
        let existed = Self::live(&mut entries, key).is_some();
        entries.remove(key);
        Ok(existed)
    }

    async fn incr_with_ttl(&self, key: &str, ttl_seconds: u64) -> Result<i64, ServiceError> {
        let mut entries = self.lock()?;
        let armed = Instant::now() + Duration::from_secs(ttl_seconds);
        if let Some((value, expires_at)) = Self::live(&mut entries, key) {
            let count = value
                .parse::<i64>()
                .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Counter is not an integer: {}", e)))?
                + 1;
            *value = count.to_string();
            expires_at.get_or_insert(armed);
            return Ok(count);
        }

        entries.insert(key.to_string(), ("1".to_string(), Some(armed)));
        Ok(1)
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}
