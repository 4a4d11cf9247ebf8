//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports set and distinct, limits > 0)
//! - Check header names and path prefixes are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use axum::http::HeaderName;
use thiserror::Error;
use tracing_subscriber::filter::LevelFilter;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.host must not be empty")]
    EmptyHost,

    #[error("listener.{0} must be non-zero")]
    ZeroPort(&'static str),

    #[error("listener.grpc_port and listener.http_port are both {0}")]
    PortConflict(u16),

    #[error("listener.max_connections must be greater than zero")]
    NoConnections,

    #[error("gateway.trace_header_name {0:?} is not a valid header name")]
    InvalidTraceHeader(String),

    #[error("gateway.swagger_url {0:?} must start with '/'")]
    InvalidSwaggerUrl(String),

    #[error("observability.log_level {0:?} is not a known level")]
    InvalidLogLevel(String),

    #[error("rpc.max_connection_age_grace_secs requires rpc.max_connection_age_secs")]
    GraceWithoutAge,
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.host.trim().is_empty() {
        errors.push(ValidationError::EmptyHost);
    }
    if config.listener.grpc_port == 0 {
        errors.push(ValidationError::ZeroPort("grpc_port"));
    }
    if config.listener.http_port == 0 {
        errors.push(ValidationError::ZeroPort("http_port"));
    }
    if config.listener.grpc_port != 0 && config.listener.grpc_port == config.listener.http_port {
        errors.push(ValidationError::PortConflict(config.listener.grpc_port));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::NoConnections);
    }

    let trace_header = &config.gateway.trace_header_name;
    if HeaderName::from_bytes(trace_header.as_bytes()).is_err() {
        errors.push(ValidationError::InvalidTraceHeader(trace_header.clone()));
    }
    if !config.gateway.disable_swagger && !config.gateway.swagger_url.starts_with('/') {
        errors.push(ValidationError::InvalidSwaggerUrl(
            config.gateway.swagger_url.clone(),
        ));
    }

    if config.observability.log_level.parse::<LevelFilter>().is_err() {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if config.rpc.max_connection_age_grace_secs > 0 && config.rpc.max_connection_age_secs == 0 {
        errors.push(ValidationError::GraceWithoutAge);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&ServerConfig::default()), Ok(()));
    }

    #[test]
    fn reports_every_problem() {
        let mut config = ServerConfig::default();
        config.listener.host = " ".into();
        config.listener.http_port = config.listener.grpc_port;
        config.gateway.trace_header_name = "bad header".into();
        config.observability.log_level = "loud".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyHost,
                ValidationError::PortConflict(9090),
                ValidationError::InvalidTraceHeader("bad header".into()),
                ValidationError::InvalidLogLevel("loud".into()),
            ]
        );
    }

    #[test]
    fn swagger_url_ignored_when_disabled() {
        let mut config = ServerConfig::default();
        config.gateway.swagger_url = "docs".into();
        assert!(validate_config(&config).is_err());

        config.gateway.disable_swagger = true;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn age_grace_needs_age() {
        let mut config = ServerConfig::default();
        config.rpc.max_connection_age_grace_secs = 5;
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::GraceWithoutAge])
        );
    }
}
