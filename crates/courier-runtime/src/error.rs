//! Runtime error types.

use courier_core::{AdapterError, RegistryError};
use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that can occur while building or running the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An adapter table does not match the adapter's config type.
    #[error("Failed to deserialize adapter config: {0}")]
    AdapterConfigDeserialize(String),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// The HTTP surface could not be bound.
    #[error("Failed to start HTTP server: {0}")]
    Server(#[from] std::io::Error),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
