//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment variable overrides)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → handed to Supervisor::new
//! ```
//!
//! # Design Decisions
//! - Config is immutable once handed to the supervisor
//! - All fields have defaults so an empty file (or no file) is a valid config
//! - Environment variables win over the file, matching container deployments
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{apply_env_overrides, from_env, load_config, ConfigError};
pub use schema::{
    GatewayConfig, ListenerConfig, ObservabilityConfig, RpcConfig, ServerConfig, ShutdownConfig,
};
pub use validation::{validate_config, ValidationError};
