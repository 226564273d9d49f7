//! Error types for the dispatch kernel.

use std::io;
use std::path::PathBuf;

use courier_core::{AdapterError, BoxError};
use thiserror::Error;

/// Errors raised while resolving or running a slash command.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No adapter with the slash-command capability has the token's name.
    #[error("no adapter found for command {command}")]
    AdapterNotFound { command: String },

    /// No registered command has the token's trigger.
    #[error("no function found for command {command}")]
    CommandNotFound { command: String },

    /// The command handler failed.
    #[error("command {command} failed: {source}")]
    Handler { command: String, source: BoxError },

    /// The adapter could not format the result.
    #[error(transparent)]
    Format(#[from] AdapterError),
}

/// Result type for slash-command dispatch.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Errors raised by the outbound fan-out before any adapter is reached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FanOutError {
    #[error("you must provide a user name in the envelope")]
    MissingUserName,
}

/// Errors raised by the program-script bridge.
#[derive(Debug, Error)]
pub enum ProgramError {
    /// The program could not be started.
    #[error("failed to start {path}: {source}")]
    Spawn { path: PathBuf, source: io::Error },

    /// Writing the request or reading the response failed.
    #[error("i/o error talking to {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    /// The program exited unsuccessfully.
    #[error("{path} exited with {status}: {stderr}")]
    Exit {
        path: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },

    /// The program's output is not the expected JSON document.
    #[error("malformed output from {path}: {source}")]
    Output {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A definition returned by the program is not usable.
    #[error("invalid definition '{name}' from {path}: {reason}")]
    Definition {
        path: PathBuf,
        name: String,
        reason: String,
    },
}

/// Result type for program-script operations.
pub type ProgramResult<T> = Result<T, ProgramError>;
