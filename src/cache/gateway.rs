//! Cache-aside gateway keyed by extracted query text.

use std::sync::Arc;

use thiserror::Error;

use crate::cache::store::CacheStore;
use crate::observability::metrics;
use crate::upstream::Envelope;

/// Failure to pull the query text out of a query-execution payload.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("payload is not a valid envelope: {0}")]
    Envelope(String),

    #[error("payload has no query text field")]
    MissingQuery,
}

/// Pull the literal query text out of a query-execution envelope.
///
/// The query is argument field "2" of `sql_execute`. The key is the trimmed
/// query text; everything else about the text (case, inner whitespace) is
/// significant.
pub fn extract_query_text(payload: &[u8]) -> Result<String, ExtractError> {
    let envelope =
        Envelope::parse(payload).map_err(|e| ExtractError::Envelope(e.to_string()))?;
    envelope
        .field_str("2")
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or(ExtractError::MissingQuery)
}

/// Best-effort cache-aside wrapper around a [`CacheStore`].
///
/// Every store failure is logged and treated as a miss; the forwarding path
/// must never fail because the cache service is down.
#[derive(Clone)]
pub struct CacheGateway {
    store: Arc<dyn CacheStore>,
}

impl CacheGateway {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Cached response bytes for `key`, or `None` on miss or store failure.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self.store.get(key).await {
            Ok(Some(bytes)) => {
                metrics::record_cache("hit");
                Some(bytes)
            }
            Ok(None) => {
                metrics::record_cache("miss");
                None
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "cache get failed, treating as miss");
                metrics::record_cache("error");
                None
            }
        }
    }

    /// Store response bytes for `key`, overwriting any prior entry.
    pub async fn set(&self, key: &str, value: &[u8]) {
        if let Err(e) = self.store.set(key, value).await {
            tracing::warn!(key, error = %e, "cache set failed");
            metrics::record_cache("store_error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::{CacheError, MemoryStore};
    use async_trait::async_trait;

    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn get(&self, _: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }

        async fn set(&self, _: &str, _: &[u8]) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".into()))
        }
    }

    #[test]
    fn test_extract_query_text() {
        let payload = br#"[1,"sql_execute",1,0,{"1":{"str":"tok"},"2":{"str":" SELECT COUNT(*) FROM flights "}}]"#;
        assert_eq!(
            extract_query_text(payload).unwrap(),
            "SELECT COUNT(*) FROM flights"
        );
    }

    #[test]
    fn test_extract_rejects_shapeless_payloads() {
        assert!(matches!(
            extract_query_text(b"GET /favicon.ico"),
            Err(ExtractError::Envelope(_))
        ));
        assert!(matches!(
            extract_query_text(br#"[1,"sql_execute",1,0,{"1":{"str":"tok"}}]"#),
            Err(ExtractError::MissingQuery)
        ));
    }

    #[tokio::test]
    async fn test_round_trip_through_gateway() {
        let gateway = CacheGateway::new(Arc::new(MemoryStore::new()));
        assert!(gateway.get("SELECT 1").await.is_none());

        gateway.set("SELECT 1", b"reply").await;
        assert_eq!(gateway.get("SELECT 1").await.unwrap(), b"reply");
    }

    #[tokio::test]
    async fn test_broken_store_degrades_to_miss() {
        let gateway = CacheGateway::new(Arc::new(BrokenStore));
        assert!(gateway.get("SELECT 1").await.is_none());
        // set must not panic or propagate
        gateway.set("SELECT 1", b"reply").await;
    }
}
