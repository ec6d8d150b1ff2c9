//! Query result cache subsystem.
//!
//! # Data Flow
//! ```text
//! query-execution payload
//!     → gateway.rs extract_query_text (envelope field, stable path)
//!     → gateway.rs get (hit: serve cached bytes directly)
//!     → [miss: rewrite + forward upstream]
//!     → gateway.rs set (store buffered response bytes)
//! ```
//!
//! # Design Decisions
//! - Cache-aside keyed by exact query text; no TTL, no invalidation
//! - Soundness rests on the workload being read-only queries; not enforced
//! - Store failures downgrade to a miss; the cache is never a hard dependency

pub mod gateway;
pub mod store;

pub use gateway::{extract_query_text, CacheGateway, ExtractError};
pub use store::{CacheError, CacheStore, MemoryStore, RedisStore};
