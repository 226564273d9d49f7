//! # Courier
//!
//! A chat-bot dispatch kernel. Scripts react to messages matching a regular
//! expression; slash commands react to a trigger keyword. Adapters connect
//! the kernel to chat platforms, and an HTTP/WebSocket surface lets other
//! processes feed messages in and observe lifecycle events.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  receive  ┌──────────────────────────────┐  send/reply  ┌──────────┐
//! │ Adapters │──────────▶│ Robot                        │─────────────▶│ Adapters │
//! └──────────┘           │  sanitize → match → mention  │              └──────────┘
//!       ▲                │  middleware chain → handler  │
//!       │ HTTP           │  random pick → fan-out       │──▶ EventBus ──▶ relay clients
//! ┌──────────┐           └──────────────────────────────┘
//! │ Runtime  │  config, logging, boot sequence, HTTP server
//! └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = CourierRuntime::new()?;
//!     runtime.robot().register_script(
//!         Script::new("badger", "(?i)badger", ScriptKind::Send)
//!             .handler(|_, _| async { Ok(vec!["BADGERS!".to_string()]) }),
//!     )?;
//!     runtime.register_adapter::<ShellAdapter>()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `shell`: bundle the terminal adapter (default)
//! - `toml-config` / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output
//! - `ws-client`: [`transport::RelayClient`] for out-of-process observers

pub use courier_core as core;
pub use courier_framework as framework;
pub use courier_runtime as runtime;
pub use courier_transport as transport;

#[cfg(feature = "shell")]
pub use courier_adapter_shell as shell;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use courier::prelude::*;
/// ```
pub mod prelude {
    pub use courier_framework::prelude::*;

    pub use courier_core::{ConfigurableAdapter, SubMatches};
    pub use courier_framework::{ProgramScript, choose_random_message};
    pub use courier_runtime::{CourierConfig, CourierRuntime, RuntimeError, RuntimeResult};

    #[cfg(feature = "shell")]
    pub use courier_adapter_shell::ShellAdapter;
}
