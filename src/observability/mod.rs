//! Observability subsystem: structured logging lives in main's tracing setup,
//! counters are defined here.

pub mod metrics;
