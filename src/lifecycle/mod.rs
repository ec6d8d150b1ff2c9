//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → connect with retry (fatal on exhaustion) → open cache
//!     → bind listener → serve
//!
//! Shutdown (signals.rs + shutdown.rs):
//!     SIGTERM/SIGINT → broadcast shutdown → stop serving immediately
//!     → disconnect session → exit
//! ```
//!
//! # Design Decisions
//! - The proxy never serves traffic without a valid session
//! - Shutdown is abrupt: in-flight requests are not drained
//! - Disconnect errors are logged only; the process is exiting regardless

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
