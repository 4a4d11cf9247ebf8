//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable {name}={value:?} is not valid")]
    Env { name: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load a TOML file, apply process environment overrides and validate.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let mut config: ServerConfig = toml::from_str(&content)?;

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build a configuration from defaults and process environment only.
pub fn from_env() -> Result<ServerConfig, ConfigError> {
    let mut config = ServerConfig::default();
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Override fields from environment variables.
///
/// `lookup` resolves a variable name; unset variables leave the field alone.
pub fn apply_env_overrides<F>(config: &mut ServerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env { lookup };

    env.string("LISTEN_HOST", &mut config.listener.host);
    env.parse("GRPC_PORT", &mut config.listener.grpc_port)?;
    env.parse("HTTP_PORT", &mut config.listener.http_port)?;
    env.parse("MAX_CONNECTIONS", &mut config.listener.max_connections)?;

    env.parse("SHUTDOWN_DURATION_IN_SECONDS", &mut config.shutdown.grace_secs)?;
    env.parse(
        "GRPC_GRACEFUL_DURATION_IN_SECONDS",
        &mut config.shutdown.healthcheck_wait_secs,
    )?;
    env.flag("DISABLE_SIGNAL_HANDLER", &mut config.shutdown.disable_signal_handler)?;

    env.parse(
        "GRPC_SERVER_MAX_CONNECTION_AGE_IN_SECONDS",
        &mut config.rpc.max_connection_age_secs,
    )?;
    env.parse(
        "GRPC_SERVER_MAX_CONNECTION_AGE_GRACE_IN_SECONDS",
        &mut config.rpc.max_connection_age_grace_secs,
    )?;
    env.parse(
        "GRPC_SERVER_MAX_CONNECTION_IDLE_IN_SECONDS",
        &mut config.rpc.max_connection_idle_secs,
    )?;
    env.flag("DISABLE_GRPC_REFLECTION", &mut config.rpc.disable_reflection)?;

    env.flag("DISABLE_SWAGGER", &mut config.gateway.disable_swagger)?;
    env.string("SWAGGER_URL", &mut config.gateway.swagger_url);
    env.flag("DISABLE_PROMETHEUS", &mut config.gateway.disable_prometheus)?;
    env.string("TRACE_HEADER_NAME", &mut config.gateway.trace_header_name);
    if let Some(list) = env.get("HTTP_HEADER_PREFIXES") {
        config.gateway.header_prefixes = list
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
    }
    // Legacy single prefix only applies when no list was given.
    if config.gateway.header_prefixes.is_empty() {
        if let Some(prefix) = env.get("HTTP_HEADER_PREFIX").filter(|p| !p.is_empty()) {
            config.gateway.header_prefixes = vec![prefix];
        }
    }
    let mut disable_compression = !config.gateway.compression;
    env.flag("DISABLE_COMPRESSION", &mut disable_compression)?;
    config.gateway.compression = !disable_compression;

    env.string("APP_NAME", &mut config.observability.app_name);
    env.string("ENVIRONMENT", &mut config.observability.environment);
    env.string("RELEASE_NAME", &mut config.observability.release_name);
    env.string("LOG_LEVEL", &mut config.observability.log_level);
    env.flag("JSON_LOGS", &mut config.observability.json_logs)?;

    Ok(())
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
    }

    fn string(&self, name: &str, field: &mut String) {
        if let Some(value) = self.get(name) {
            *field = value;
        }
    }

    fn parse<T: FromStr>(&self, name: &'static str, field: &mut T) -> Result<(), ConfigError> {
        if let Some(value) = self.get(name) {
            *field = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Env { name, value })?;
        }
        Ok(())
    }

    fn flag(&self, name: &'static str, field: &mut bool) -> Result<(), ConfigError> {
        if let Some(value) = self.get(name) {
            *field = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => return Err(ConfigError::Env { name, value }),
            };
        }
        Ok(())
    }
}
