//! Configuration validation.
//!
//! Semantic checks on top of what serde already guarantees syntactically.

use std::fmt;
use std::net::SocketAddr;

use axum::http::Uri;

use crate::config::schema::ProxyConfig;

/// A single semantic validation failure.
#[derive(Debug)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, returning all failures rather than the first.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError {
            field: "listener.bind_address",
            message: format!("not a socket address: {:?}", config.listener.bind_address),
        });
    }

    match config.upstream.url.parse::<Uri>() {
        Ok(uri) if uri.authority().is_some() => {}
        _ => errors.push(ValidationError {
            field: "upstream.url",
            message: format!("not an absolute URL: {:?}", config.upstream.url),
        }),
    }

    if config.upstream.buffer_size < 8192 {
        errors.push(ValidationError {
            field: "upstream.buffer_size",
            message: "must be at least 8192".to_string(),
        });
    }

    if config.retry.attempts == 0 {
        errors.push(ValidationError {
            field: "retry.attempts",
            message: "must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
