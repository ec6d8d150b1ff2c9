//! Session-injecting reverse proxy for a MapD-style analytical database.
//!
//! Clients talk plain Thrift-JSON over HTTP without ever logging in; the proxy
//! owns the single upstream session, substitutes its token into every forwarded
//! call, and caches read-only query results in Redis.

pub mod cache;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rewrite;
pub mod session;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use session::SessionManager;
