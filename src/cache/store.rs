//! Key-value store backends for the result cache.

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use thiserror::Error;

/// Errors from the underlying key-value service.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Backend(e.to_string())
    }
}

/// Byte-oriented key-value store.
///
/// Implementations pool their own connections; calls may arrive concurrently
/// from many request handlers.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Unconditionally overwrite any prior entry for `key`.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError>;
}

/// Redis-backed store.
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Open a pooled connection to the given redis URL.
    pub async fn open(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!(url, "connected to redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let value: Option<Vec<u8>> = self.conn.clone().get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let _: () = self.conn.clone().set(key, value).await?;
        Ok(())
    }
}

/// In-process store used when no redis address is configured, and in tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.inner.get(key).map(|entry| entry.value().clone()))
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        self.inner.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert!(store.get("q").await.unwrap().is_none());

        store.set("q", b"result-bytes").await.unwrap();
        assert_eq!(store.get("q").await.unwrap().unwrap(), b"result-bytes");

        // set overwrites unconditionally
        store.set("q", b"newer").await.unwrap();
        assert_eq!(store.get("q").await.unwrap().unwrap(), b"newer");
        assert_eq!(store.len(), 1);
    }
}
