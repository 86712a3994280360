//! TOML configuration schema.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) describes the standard deployment: port 3000 in front of a store on
//! `localhost:6379`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the dual-protocol proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Backend store endpoint and optional child process.
    pub backend: BackendConfig,

    /// HTTP health surface.
    pub http: HttpConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Shutdown behaviour.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Backend store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend address as `host:port` (e.g., "localhost:6379").
    pub address: String,

    /// Launch the backend as a child process on startup.
    pub spawn: bool,

    /// Program to launch when `spawn` is set.
    pub command: String,

    /// Arguments passed to `command`.
    pub args: Vec<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            address: "localhost:6379".to_string(),
            spawn: false,
            command: "redis-server".to_string(),
            args: vec!["--port".to_string(), "6379".to_string()],
        }
    }
}

/// HTTP health surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Deployment-specific health path probed by the hosting platform.
    /// Served alongside `/` and `/health`.
    pub health_path: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            health_path: "/qsynthesis/container/redis-084qf-health".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Maximum time a fresh connection may stay unclassified, in milliseconds.
    pub classify_ms: u64,

    /// Backend connection establishment timeout in milliseconds.
    pub connect_ms: u64,

    /// Liveness probe round-trip timeout in milliseconds.
    pub probe_ms: u64,

    /// HTTP request timeout in seconds.
    pub request_secs: u64,
}

impl TimeoutConfig {
    pub fn classify(&self) -> Duration {
        Duration::from_millis(self.classify_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            classify_ms: 10_000,
            connect_ms: 3_000,
            probe_ms: 2_000,
            request_secs: 30,
        }
    }
}

/// Shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long in-flight connections may keep running after the
    /// listener closes, in seconds.
    pub grace_secs: u64,
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 5 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, for development.
    #[default]
    Pretty,
    /// One JSON object per line, for log aggregation.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address. Kept off the shared port so the
    /// health surface stays fixed.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
