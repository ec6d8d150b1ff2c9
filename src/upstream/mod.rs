//! Upstream database client subsystem.
//!
//! # Data Flow
//! ```text
//! RPC call (connect, get_tables, sql_execute, ...)
//!     → wire.rs (build Thrift-JSON call envelope)
//!     → client.rs (HTTP POST to upstream base URL)
//!     → wire.rs (parse reply envelope, unwrap success field)
//!     → types.rs (ServerStatus, ResultSet, ...)
//! ```
//!
//! # Design Decisions
//! - `DbClient` is a trait so session and health logic can be tested with stubs
//! - One envelope codec shared with the request rewriter and query extractor
//! - No request-time retries; every failure surfaces to the caller

pub mod client;
pub mod types;
pub mod wire;

pub use client::{DbClient, HttpThriftClient};
pub use types::{Column, ResultSet, ServerStatus, UpstreamError, UpstreamResult};
pub use wire::Envelope;
