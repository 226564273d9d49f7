//! Layered configuration for the Courier runtime.
//!
//! Sources are merged with figment: built-in defaults, profile and main
//! config files, `COURIER_*` environment variables, then programmatic
//! overrides.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    CourierConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, RelayConfig,
    RobotConfig, ServerConfig, SpanEventConfig,
};
pub use validation::validate_config;
