//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Legacy source-client protocol handling.
    pub compat: CompatConfig,

    /// Listener presence tracking.
    pub tracker: TrackerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Periodic listener count logging.
    pub listen_log: ListenLogConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9000").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9000".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Settings for the `ICE/1.0` request line rewrite.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompatConfig {
    /// Inspect and rewrite legacy request lines.
    pub enabled: bool,

    /// Bytes buffered while looking for the end of the request line.
    /// Past this the stream is forwarded untouched.
    pub max_request_line: usize,

    /// How long to wait for a complete request line, in milliseconds.
    pub sniff_timeout_ms: u64,
}

impl CompatConfig {
    pub fn sniff_timeout(&self) -> Duration {
        Duration::from_millis(self.sniff_timeout_ms)
    }
}

impl Default for CompatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_request_line: 4096,
            sniff_timeout_ms: 5_000,
        }
    }
}

/// Listener presence tracking configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Seconds an early leave is remembered while waiting for its join.
    pub pending_ttl_secs: u64,

    /// Upper bound on remembered early leaves; oldest are dropped first.
    pub pending_capacity: usize,

    /// Interval of the background sweep for expired early leaves.
    pub sweep_interval_secs: u64,
}

impl TrackerConfig {
    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            pending_ttl_secs: 300,
            pending_capacity: 10_000,
            sweep_interval_secs: 30,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Listen log job configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenLogConfig {
    /// Enable the periodic listen log.
    pub enabled: bool,

    /// Seconds between two recorded listener counts.
    pub interval_secs: u64,

    /// Storage provider name, resolved through the storage registry.
    pub storage: String,

    /// Entries kept by the in-memory provider.
    pub memory_capacity: usize,
}

impl Default for ListenLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60,
            storage: "memory".to_string(),
            memory_capacity: 1_440,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level filter, used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "radio_gateway=info,tower_http=info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
