//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → server.rs (Axum setup, body buffering)
//!     → classify.rs (marker scan → CallKind)
//!     → [query] cache lookup → hit: serve cached bytes
//!                            → miss: rewrite session+nonce → forward → store
//!     → [metadata] rewrite session → forward
//!     → [pass-through] forward untouched
//! ```

pub mod classify;
pub mod forward;
pub mod server;

pub use classify::{classify, CallKind};
pub use forward::{ForwardedResponse, ForwardingTransport};
pub use server::HttpServer;
