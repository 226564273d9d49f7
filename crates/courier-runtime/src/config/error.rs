//! Errors raised while loading or validating a [`CourierConfig`](super::CourierConfig).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// `--config` or [`ConfigLoader::file`](super::ConfigLoader::file) named a missing file.
    #[error("config file {0} does not exist")]
    FileNotFound(PathBuf),

    /// figment failed to read, parse or extract a layer.
    #[error("cannot load configuration: {0}")]
    ParseError(String),

    #[error("invalid configuration: {message}")]
    ValidationError { message: String },

    #[error("`{field}` must not be empty")]
    MissingField { field: String },

    /// `server.addr` is not a socket address.
    #[error("cannot listen on '{addr}': {reason}")]
    InvalidAddress { addr: String, reason: String },
}

impl ConfigError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        Self::ParseError(error.to_string())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
