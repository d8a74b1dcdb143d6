//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (watermarks ordered, intervals > 0, addresses parse)
//! - Detect duplicate neighbour names
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be positive"));
    }
    if config.timeouts.outbound_ms == 0 {
        errors.push(ValidationError::new("timeouts.outbound_ms", "must be positive"));
    }

    let load = &config.load;
    if load.high_watermark == 0 {
        errors.push(ValidationError::new("load.high_watermark", "must be positive"));
    }
    if load.low_watermark > load.high_watermark {
        errors.push(ValidationError::new(
            "load.low_watermark",
            "must not exceed load.high_watermark",
        ));
    }
    if load.sample_interval_ms == 0 {
        errors.push(ValidationError::new("load.sample_interval_ms", "must be positive"));
    }

    let bridge = &config.bridge;
    if bridge.input_high_watermark == 0 {
        errors.push(ValidationError::new("bridge.input_high_watermark", "must be positive"));
    }
    if bridge.output_high_watermark == 0 {
        errors.push(ValidationError::new("bridge.output_high_watermark", "must be positive"));
    }
    if bridge.output_low_watermark >= bridge.output_high_watermark {
        errors.push(ValidationError::new(
            "bridge.output_low_watermark",
            "must be below bridge.output_high_watermark",
        ));
    }

    let lifecycle = &config.lifecycle;
    if lifecycle.heartbeat_interval_ms == 0 {
        errors.push(ValidationError::new("lifecycle.heartbeat_interval_ms", "must be positive"));
    }
    for (field, deadline) in [
        ("lifecycle.initial_deadline_ms", lifecycle.initial_deadline_ms),
        ("lifecycle.liveness_deadline_ms", lifecycle.liveness_deadline_ms),
    ] {
        if deadline <= lifecycle.heartbeat_interval_ms {
            errors.push(ValidationError::new(
                field,
                "must be longer than lifecycle.heartbeat_interval_ms",
            ));
        }
    }

    let mut names = HashSet::new();
    for (i, neighbour) in config.discovery.neighbours.iter().enumerate() {
        if !names.insert(neighbour.name.as_str()) {
            errors.push(ValidationError::new(
                format!("discovery.neighbours[{i}].name"),
                format!("duplicate neighbour '{}'", neighbour.name),
            ));
        }
        if neighbour.host.is_empty() {
            errors.push(ValidationError::new(
                format!("discovery.neighbours[{i}].host"),
                "must not be empty",
            ));
        }
        if neighbour.port == 0 {
            errors.push(ValidationError::new(
                format!("discovery.neighbours[{i}].port"),
                "must be positive",
            ));
        }
    }

    let observability = &config.observability;
    if !LOG_LEVELS.contains(&observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", observability.log_level),
        ));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be positive"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
