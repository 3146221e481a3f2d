//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every field has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the dispatch server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Public base address prepended to redirect targets
    /// (e.g., "http://example.com"). Derived per request when unset.
    pub host_address: Option<String>,

    /// Maximum number of accept-waits pending at once.
    pub max_simultaneous_connections: usize,

    /// Idle time after which a session counts as expired.
    pub session_expiration_seconds: u64,

    /// Root directory handed to handlers. Not interpreted by the dispatcher.
    pub website_root_path: PathBuf,

    /// Largest request body read before routing, in bytes.
    pub max_body_bytes: usize,

    /// How long shutdown waits for in-flight requests.
    pub shutdown_grace_secs: u64,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl ServerConfig {
    /// Session expiration threshold.
    pub fn session_expiration(&self) -> Duration {
        Duration::from_secs(self.session_expiration_seconds)
    }

    /// Drain deadline applied on shutdown.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            host_address: None,
            max_simultaneous_connections: 20,
            session_expiration_seconds: 60,
            website_root_path: PathBuf::from("./www"),
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            shutdown_grace_secs: 10,
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
