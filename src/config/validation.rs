//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use super::schema::ServerConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("addr `{0}` is not a socket address")]
    Addr(String),

    #[error("ping_uri `{0}` must not contain whitespace")]
    PingUri(String),

    #[error("observability.metrics_address `{0}` is not a socket address")]
    MetricsAddress(String),

    #[error("observability.sample_interval_secs must be greater than 0")]
    SampleInterval,
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.addr.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::Addr(config.addr.clone()));
    }

    if let Some(ping) = &config.ping_uri {
        if ping.trim().chars().any(char::is_whitespace) {
            errors.push(ValidationError::PingUri(ping.clone()));
        }
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(observability.metrics_address.clone()));
    }

    if observability.sample_interval_secs == 0 {
        errors.push(ValidationError::SampleInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
