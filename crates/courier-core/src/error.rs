//! Error types shared across the Courier crates.
//!
//! Kernel-level errors (dispatch, fan-out) live in `courier-framework`.

use thiserror::Error;

/// Boxed error returned by script and command handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by script and command handlers.
pub type HandlerResult<T> = Result<T, BoxError>;

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors raised when registering or updating scripts and slash commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A required field is missing or empty.
    #[error("invalid {kind} '{name}': {reason}")]
    Invalid {
        kind: &'static str,
        name: String,
        reason: String,
    },

    /// An entry with the same uniqueness key already exists.
    #[error("{kind} '{name}' already registered")]
    AlreadyRegistered { kind: &'static str, name: String },

    /// The matcher does not compile.
    #[error("{kind} '{name}' has an invalid matcher: {reason}")]
    InvalidPattern {
        kind: &'static str,
        name: String,
        reason: String,
    },
}

impl RegistryError {
    /// Creates a missing-field validation error.
    pub fn missing(kind: &'static str, name: impl Into<String>, field: &str) -> Self {
        Self::Invalid {
            kind,
            name: name.into(),
            reason: format!("{field} must not be empty"),
        }
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

// =============================================================================
// Adapter Errors
// =============================================================================

/// Errors raised by adapters.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    /// Delivering a message failed.
    #[error("failed to deliver message: {0}")]
    Send(String),

    /// The adapter does not provide the requested capability.
    #[error("adapter '{adapter}' does not support {capability}")]
    Unsupported {
        adapter: String,
        capability: &'static str,
    },

    /// Formatting a command result failed.
    #[error("failed to format command result: {0}")]
    Format(String),

    /// Configuration could not be applied.
    #[error("invalid adapter configuration: {0}")]
    Config(String),

    /// Internal adapter error.
    #[error("adapter error: {0}")]
    Internal(String),
}

impl AdapterError {
    /// Creates a delivery error.
    pub fn send(msg: impl Into<String>) -> Self {
        Self::Send(msg.into())
    }

    /// Creates an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;
