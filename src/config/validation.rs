//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and address
//! formats. All problems are collected so one run reports every mistake.

use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
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

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a socket address: {:?}", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }

    // The buffer must at least fit "SOURCE / ICE/1.0\n".
    if config.compat.max_request_line < 32 {
        errors.push(ValidationError::new("compat.max_request_line", "must be >= 32"));
    }
    if config.compat.sniff_timeout_ms == 0 {
        errors.push(ValidationError::new("compat.sniff_timeout_ms", "must be > 0"));
    }

    if config.tracker.pending_ttl_secs == 0 {
        errors.push(ValidationError::new("tracker.pending_ttl_secs", "must be > 0"));
    }
    if config.tracker.pending_capacity == 0 {
        errors.push(ValidationError::new("tracker.pending_capacity", "must be > 0"));
    }
    if config.tracker.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("tracker.sweep_interval_secs", "must be > 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    if config.listen_log.enabled {
        if config.listen_log.interval_secs == 0 {
            errors.push(ValidationError::new("listen_log.interval_secs", "must be > 0"));
        }
        if config.listen_log.storage.trim().is_empty() {
            errors.push(ValidationError::new("listen_log.storage", "provider name is empty"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("not a socket address: {:?}", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
