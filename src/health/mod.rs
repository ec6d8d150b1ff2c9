//! Upstream health probing subsystem.
//!
//! # Data Flow
//! ```text
//! GET|POST /healthcheck
//!     → reporter.rs (take session sequence lock)
//!     → get_server_status → get_tables → COUNT(*) per table
//!     → HealthSnapshot serialized as JSON
//! ```
//!
//! # Design Decisions
//! - The whole multi-call sequence holds the session manager's sequence lock
//! - Any upstream failure aborts the sequence; partial results are discarded
//! - An unhealthy upstream never affects process liveness

pub mod reporter;

pub use reporter::{HealthReporter, HealthSnapshot, TableCount};
