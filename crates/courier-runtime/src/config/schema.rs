//! Configuration schema definitions.
//!
//! ```toml
//! [robot]
//! name = "badger"
//! host = "https://bot.example.com"
//! tokens = ["s3cret"]
//!
//! [server]
//! addr = "0.0.0.0:8080"
//!
//! [relay]
//! max_attempts = 3
//! ack_timeout_ms = 3000
//! on_sequence_mismatch = "retry"
//!
//! [logging]
//! level = "debug"
//! filters = { courier_transport = "trace" }
//!
//! [[program_scripts]]
//! path = "./scripts/weather.py"
//!
//! [adapters.shell]
//! user_name = "ann"
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use courier_framework::{AuthorizeConfig, ProgramScript};
use courier_transport::{MismatchPolicy, RelaySettings};
use figment::value::Value;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CourierConfig {
    #[serde(default)]
    pub robot: RobotConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// External programs providing scripts.
    #[serde(default)]
    pub program_scripts: Vec<ProgramScript>,

    /// Access control applied by the authorization middleware.
    #[serde(default)]
    pub authorize: AuthorizeConfig,

    /// Free-form adapter tables, keyed by adapter name.
    #[serde(default)]
    pub adapters: HashMap<String, Value>,
}

// =============================================================================
// Robot / Server
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RobotConfig {
    /// Display name, used in help output.
    #[serde(default = "default_robot_name")]
    pub name: String,

    /// Public base URL, used to build the default icon URL.
    #[serde(default)]
    pub host: String,

    /// Tokens accepted by the HTTP surface and the relay. One is generated
    /// at boot when empty.
    #[serde(default)]
    pub tokens: Vec<String>,

    /// Skip TLS certificate checks when calling remote scripts.
    #[serde(default)]
    pub skip_insecure: bool,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            name: default_robot_name(),
            host: String::new(),
            tokens: Vec::new(),
            skip_insecure: false,
        }
    }
}

fn default_robot_name() -> String {
    "courier".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address of the HTTP surface.
    #[serde(default = "default_addr")]
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
        }
    }
}

fn default_addr() -> String {
    "0.0.0.0:8080".to_string()
}

// =============================================================================
// Relay
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Writes allowed per event before the connection is dropped.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Deadline for each acknowledgment, in milliseconds.
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    /// Deadline for the handshake frame, in milliseconds. Unbounded when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handshake_timeout_ms: Option<u64>,

    #[serde(default)]
    pub on_sequence_mismatch: MismatchPolicy,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            ack_timeout_ms: default_ack_timeout_ms(),
            handshake_timeout_ms: None,
            on_sequence_mismatch: MismatchPolicy::default(),
        }
    }
}

impl RelayConfig {
    pub fn to_settings(&self) -> RelaySettings {
        RelaySettings {
            max_attempts: self.max_attempts,
            ack_timeout: Duration::from_millis(self.ack_timeout_ms),
            handshake_timeout: self.handshake_timeout_ms.map(Duration::from_millis),
            mismatch: self.on_sequence_mismatch,
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_ack_timeout_ms() -> u64 {
    3000
}

// =============================================================================
// Logging
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle transitions are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Target file when `output = "file"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file names and line numbers.
    #[serde(default)]
    pub file_location: bool,

    /// Per-module levels, e.g. `courier_transport = "trace"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_settings_conversion() {
        let relay = RelayConfig {
            handshake_timeout_ms: Some(500),
            on_sequence_mismatch: MismatchPolicy::Abort,
            ..Default::default()
        };
        let settings = relay.to_settings();
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.ack_timeout, Duration::from_secs(3));
        assert_eq!(settings.handshake_timeout, Some(Duration::from_millis(500)));
        assert_eq!(settings.mismatch, MismatchPolicy::Abort);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: CourierConfig = serde_json::from_str(
            r#"{"robot":{"tokens":["t"]},"logging":{"level":"debug"}}"#,
        )
        .unwrap();
        assert_eq!(config.robot.name, "courier");
        assert_eq!(config.robot.tokens, vec!["t".to_string()]);
        assert_eq!(config.server.addr, "0.0.0.0:8080");
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.relay.on_sequence_mismatch, MismatchPolicy::Retry);
    }
}
