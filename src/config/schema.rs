//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the session proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream database server and credentials.
    pub upstream: UpstreamConfig,

    /// Startup connect retry settings.
    pub retry: RetryConfig,

    /// Query result cache settings.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:4000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
        }
    }
}

/// Upstream database server configuration and login credentials.
///
/// Immutable for the process lifetime; the session obtained with these
/// credentials is shared by every client of the proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream Thrift-JSON endpoint.
    pub url: String,

    /// Login user.
    pub user: String,

    /// Login password.
    pub password: String,

    /// Database name.
    pub database: String,

    /// HTTP read buffer size in bytes (minimum 8192).
    pub buffer_size: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:6278".to_string(),
            user: "mapd".to_string(),
            password: "HyperInteractive".to_string(),
            database: "mapd".to_string(),
            buffer_size: 8192,
        }
    }
}

/// Startup connect retry configuration.
///
/// Applies only to the initial login; there are no request-time retries.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of connect attempts before giving up.
    pub attempts: u32,

    /// Fixed delay between attempts in milliseconds.
    pub delay_ms: u64,
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay_ms: 5_000,
        }
    }
}

/// Query result cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Redis address, e.g. "redis://127.0.0.1:6379".
    /// When absent the proxy falls back to an in-process store.
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { redis_url: None }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus metrics exporter.
    pub metrics_enabled: bool,

    /// Bind address for the metrics endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:4000");
        assert_eq!(config.upstream.buffer_size, 8192);
        assert_eq!(config.retry.attempts, 5);
        assert!(config.cache.redis_url.is_none());
    }

    #[test]
    fn test_minimal_toml() {
        let config: ProxyConfig = toml::from_str(
            r#"
            [upstream]
            url = "http://db.internal:6278"
            "#,
        )
        .unwrap();
        assert_eq!(config.upstream.url, "http://db.internal:6278");
        // untouched sections keep their defaults
        assert_eq!(config.upstream.user, "mapd");
        assert_eq!(config.retry.delay(), std::time::Duration::from_secs(5));
    }
}
