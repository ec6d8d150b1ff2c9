//! Upstream session lifecycle subsystem.
//!
//! # State Machine
//! ```text
//! Disconnected → Connecting → Connected → Disconnected
//! ```
//!
//! # Design Decisions
//! - The session token is obtained once, before the listener binds, and is
//!   immutable afterwards; handlers only read it
//! - No automatic reconnection: a session the upstream rejects mid-run is an
//!   ordinary per-request failure
//! - Multi-call sequences sharing the one client handle (the health probe)
//!   must hold the manager's sequence lock

pub mod manager;

pub use manager::{RetryPolicy, Session, SessionManager, SessionState};
