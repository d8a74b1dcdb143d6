//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::bridge::BridgeLimits;

/// Root configuration for the command gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Load watermarks for admission of heavy commands.
    pub load: LoadConfig,

    /// Byte watermarks of the stream bridge.
    pub bridge: BridgeLimits,

    /// Which engine error classes abort a response.
    pub failure_policy: FailurePolicy,

    /// Supervisor protocol settings.
    pub lifecycle: LifecycleConfig,

    /// Neighbour gateways reported by `/hosts` and polled by `/versions`.
    pub discovery: DiscoveryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub security: SecurityConfig,

    pub ui: UiConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed for utility endpoints, in seconds. Command requests
    /// always run to completion.
    pub request_secs: u64,

    /// Deadline for outbound requests to neighbours, in milliseconds.
    pub outbound_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 60,
            outbound_ms: 15_000,
        }
    }
}

/// Load watermarks, counted in in-flight engine executions.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoadConfig {
    /// Choking stops once the load drops below this value.
    pub low_watermark: usize,

    /// Choking starts once the load exceeds this value.
    pub high_watermark: usize,

    /// How often the load monitor samples, in milliseconds.
    pub sample_interval_ms: u64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            low_watermark: 100,
            high_watermark: 200,
            sample_interval_ms: 100,
        }
    }
}

/// Engine error classes that abort the response.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct FailurePolicy {
    pub fail_on_4xx: bool,
    pub fail_on_5xx: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            fail_on_4xx: false,
            fail_on_5xx: true,
        }
    }
}

impl FailurePolicy {
    /// Whether an engine failure with this status aborts the response.
    pub fn is_fatal(&self, status: u16) -> bool {
        match status {
            400..=499 => self.fail_on_4xx,
            500..=599 => self.fail_on_5xx,
            _ => true,
        }
    }
}

/// Supervisor protocol settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Exchange heartbeats with a supervisor over stdin/stdout.
    pub supervised: bool,

    pub heartbeat_interval_ms: u64,

    /// Liveness deadline before the first supervisor heartbeat.
    pub initial_deadline_ms: u64,

    /// Liveness deadline after each supervisor heartbeat.
    pub liveness_deadline_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            supervised: false,
            heartbeat_interval_ms: 2_000,
            initial_deadline_ms: 30_000,
            liveness_deadline_ms: 15_000,
        }
    }
}

/// Neighbour gateways and availability reporting.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub neighbours: Vec<NeighbourConfig>,

    /// File whose contents `/_check_availability_time` serves.
    pub availability_file: PathBuf,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            neighbours: Vec::new(),
            availability_file: PathBuf::from("/var/lock/yt_check_availability_time"),
        }
    }
}

/// A neighbour gateway.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct NeighbourConfig {
    /// Name used as the key in `/versions`.
    pub name: String,

    pub host: String,

    #[serde(default = "default_neighbour_port")]
    pub port: u16,
}

fn default_neighbour_port() -> u16 {
    80
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus scrape endpoint.
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

/// Request hardening.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum size of a POST parameter body in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Web UI redirects.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UiConfig {
    /// Where `/`, `/ui` and `/ui/` redirect to.
    pub location: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            location: "/ui-new/".to_string(),
        }
    }
}
