//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and formats.
//! Every problem is reported, not just the first.

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("max_simultaneous_connections must be greater than zero")]
    NoAdmissionPermits,

    #[error("bind_address `{0}` is not a socket address")]
    BindAddress(String),

    #[error("host_address `{0}` must start with http:// or https:// and have no trailing slash")]
    HostAddress(String),

    #[error("max_body_bytes must be greater than zero")]
    EmptyBodyLimit,

    #[error("metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.max_simultaneous_connections == 0 {
        errors.push(ValidationError::NoAdmissionPermits);
    }

    if config.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.bind_address.clone()));
    }

    if let Some(host) = &config.host_address {
        let scheme_ok = host.starts_with("http://") || host.starts_with("https://");
        if !scheme_ok || host.ends_with('/') {
            errors.push(ValidationError::HostAddress(host.clone()));
        }
    }

    if config.max_body_bytes == 0 {
        errors.push(ValidationError::EmptyBodyLimit);
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
