//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check addresses are usable before any socket is opened
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be greater than zero",
        ));
    }

    if !is_host_port(&config.backend.address) {
        errors.push(ValidationError::new(
            "backend.address",
            format!("'{}' is not in host:port form", config.backend.address),
        ));
    }
    if config.backend.spawn && config.backend.command.trim().is_empty() {
        errors.push(ValidationError::new(
            "backend.command",
            "required when backend.spawn is enabled",
        ));
    }

    let path = &config.http.health_path;
    if !path.starts_with('/') || path.contains(char::is_whitespace) {
        errors.push(ValidationError::new(
            "http.health_path",
            format!("'{path}' must be an absolute path without whitespace"),
        ));
    } else if !is_literal_route(path) {
        errors.push(ValidationError::new(
            "http.health_path",
            format!("'{path}' must not contain route captures or wildcards"),
        ));
    }

    for (field, value) in [
        ("timeouts.classify_ms", config.timeouts.classify_ms),
        ("timeouts.connect_ms", config.timeouts.connect_ms),
        ("timeouts.probe_ms", config.timeouts.probe_ms),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host:port` with a non-empty host and a numeric port. Hostnames are
/// resolved at connect time, not here.
fn is_host_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

/// Route syntax the router would interpret rather than match literally.
fn is_literal_route(path: &str) -> bool {
    !path.contains(['{', '}'])
        && path
            .split('/')
            .all(|segment| !segment.starts_with([':', '*']))
}
