//! Courier Runtime - orchestration layer for the Courier chat-bot kernel.
//!
//! This crate provides:
//! - Layered configuration (`CourierConfig`, `ConfigLoader`)
//! - Logging initialisation (`LoggingBuilder`)
//! - Adapter registration from configuration tables
//! - The boot sequence, HTTP serving and signal-driven shutdown
//!   (`CourierRuntime`)
//!
//! ```ignore
//! use courier_runtime::CourierRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = CourierRuntime::new()?;
//!     runtime.register_adapter::<ShellAdapter>()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    ConfigError, ConfigLoader, ConfigResult, CourierConfig, LoggingConfig, Profile, RelayConfig,
    RobotConfig, ServerConfig,
};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{CourierRuntime, RuntimeBuilder};

// Re-export tracing for use by bots
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for bot code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
