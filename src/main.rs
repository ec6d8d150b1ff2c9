//! Session-injecting reverse proxy for a MapD-style analytical database.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌────────────────────────────────────────────────────┐
//!                      │                   SESSION PROXY                     │
//!                      │                                                     │
//!   Client Request     │  ┌─────────┐   ┌──────────┐   ┌────────────────┐   │
//!   ───────────────────┼─▶│  http   │──▶│ classify │──▶│ cache gateway  │   │
//!                      │  │ server  │   │          │   │ (query text)   │   │
//!                      │  └─────────┘   └──────────┘   └───────┬────────┘   │
//!                      │                                  miss │            │
//!                      │                                       ▼            │
//!                      │                               ┌────────────────┐   │
//!                      │                               │   rewriter     │   │
//!                      │                               │ session+nonce  │   │
//!                      │                               └───────┬────────┘   │
//!                      │                                       │            │
//!   Client Response    │  ┌──────────┐   ┌───────────┐  ┌──────▼────────┐   │     Upstream
//!   ◀──────────────────┼──│ buffered │◀──│ cache set │◀─│  forwarding   │◀──┼───▶ Database
//!                      │  │  replay  │   │ (on miss) │  │  transport    │   │     Server
//!                      │  └──────────┘   └───────────┘  └───────────────┘   │
//!                      │                                                     │
//!                      │  ┌───────────────────────────────────────────────┐ │
//!                      │  │            Cross-Cutting Concerns              │ │
//!                      │  │  ┌─────────┐ ┌─────────┐ ┌──────────────────┐ │ │
//!                      │  │  │ config  │ │ session │ │ health reporter  │ │ │
//!                      │  │  │         │ │ manager │ │  (/healthcheck)  │ │ │
//!                      │  │  └─────────┘ └─────────┘ └──────────────────┘ │ │
//!                      │  └───────────────────────────────────────────────┘ │
//!                      └────────────────────────────────────────────────────┘
//! ```
//!
//! Startup connects to the upstream with retry; serving never begins without
//! a valid session. Shutdown on SIGINT/SIGTERM disconnects the session and
//! exits without draining in-flight requests.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mapd_proxy::cache::{CacheStore, MemoryStore, RedisStore};
use mapd_proxy::config::{load_config, validation::validate_config, ProxyConfig};
use mapd_proxy::http::HttpServer;
use mapd_proxy::lifecycle::{shutdown_signal, Shutdown};
use mapd_proxy::session::{RetryPolicy, SessionManager};
use mapd_proxy::upstream::HttpThriftClient;

#[derive(Parser)]
#[command(name = "mapd-proxy")]
#[command(about = "Session-injecting reverse proxy with a query result cache", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the upstream database URL.
    #[arg(long)]
    upstream_url: Option<String>,

    /// Override the listen address.
    #[arg(long)]
    bind: Option<String>,

    /// Override the redis address.
    #[arg(long)]
    redis_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mapd_proxy=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("mapd-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(url) = cli.upstream_url {
        config.upstream.url = url;
    }
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(redis_url) = cli.redis_url {
        config.cache.redis_url = Some(redis_url);
    }
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            tracing::error!(%error, "invalid configuration");
        }
        std::process::exit(1);
    }

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream_url = %config.upstream.url,
        retry_attempts = config.retry.attempts,
        "configuration loaded"
    );

    // Session first: the proxy must not serve traffic without one.
    let client = Arc::new(HttpThriftClient::new(config.upstream.url.parse()?));
    let policy = RetryPolicy {
        attempts: config.retry.attempts,
        delay: config.retry.delay(),
    };
    let manager = match SessionManager::connect_with_retry(client, &config.upstream, policy).await
    {
        Ok(manager) => Arc::new(manager),
        Err(e) => {
            tracing::error!(error = %e, "could not establish upstream session, giving up");
            std::process::exit(1);
        }
    };

    let store: Arc<dyn CacheStore> = match &config.cache.redis_url {
        Some(url) => match RedisStore::open(url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!(error = %e, "redis unavailable, using in-process cache");
                Arc::new(MemoryStore::new())
            }
        },
        None => {
            tracing::info!("no redis configured, using in-process cache");
            Arc::new(MemoryStore::new())
        }
    };

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => mapd_proxy::observability::metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(&config, manager.clone(), store)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    // abrupt shutdown: no draining, just release the upstream session
    manager.disconnect().await;
    tracing::info!("shutdown complete");
    Ok(())
}
