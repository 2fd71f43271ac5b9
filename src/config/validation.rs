//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the upstream base address is an absolute URL without trailing slash
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::RelayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstream.base_address is required")]
    MissingUpstream,

    #[error("upstream.base_address ({0}) is not an absolute URL")]
    InvalidUpstream(String),

    #[error("upstream.base_address ({0}) must not end with '/'")]
    TrailingSlash(String),

    #[error("listener.bind_address ({0}) is not a socket address")]
    InvalidBindAddress(String),

    #[error("observability.metrics_address ({0}) is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("request.route_param must not be empty")]
    EmptyRouteParam,
}

/// Check every semantic rule and collect all violations.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = validate_upstream(&config.upstream.base_address) {
        errors.push(e);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }

    if config.request.route_param.is_empty() {
        errors.push(ValidationError::EmptyRouteParam);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Rules for the upstream base address alone.
///
/// Used at startup and again when a relay is built from a config that
/// never went through the loader.
pub fn validate_upstream(base_address: &str) -> Result<(), ValidationError> {
    if base_address.trim().is_empty() {
        return Err(ValidationError::MissingUpstream);
    }
    if base_address.ends_with('/') {
        return Err(ValidationError::TrailingSlash(base_address.to_string()));
    }
    match Url::parse(base_address) {
        Ok(url) if url.has_host() => Ok(()),
        _ => Err(ValidationError::InvalidUpstream(base_address.to_string())),
    }
}
