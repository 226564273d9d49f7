//! # Courier Transport
//!
//! Network surface of the Courier chat-bot kernel.
//!
//! ## Features
//!
//! - `ws-client` (default): [`relay::RelayClient`] for out-of-process observers
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │  HTTP surface (axum)     │  intake, slash commands, outbound API,
//! │                          │  remote scripts, /api/websocket
//! ├──────────────────────────┤
//! │  Relay session           │  seq/ack state machine over a FrameTransport
//! ├──────────────────────────┤
//! │  courier-framework       │  Robot, registries, event bus
//! └──────────────────────────┘
//! ```
//!
//! ## Routes
//!
//! | Route | Auth | Purpose |
//! |-------|------|---------|
//! | `GET /` | no | List registered scripts |
//! | `POST /` | yes | Feed a message into the receive pipeline |
//! | `GET\|POST /slash-command` | command token | Run a slash command |
//! | `POST /api/send`, `/api/respond` | yes | Outbound fan-out |
//! | `GET /api/websocket` | handshake | Relay protocol |
//! | `/api/remote/scripts` | yes | Manage HTTP-backed scripts |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier_transport::{AppState, HttpServer, RelaySettings, build_client};
//!
//! let state = AppState::new(robot, RelaySettings::default(), build_client(false)?);
//! let handle = HttpServer::new(state).bind("0.0.0.0:8080").await?;
//! ```

pub mod http;
pub mod relay;
pub mod state;

pub use http::{HttpError, HttpServer, RemoteScript, RemoteScripts, ServerHandle, build_client};
#[cfg(feature = "ws-client")]
pub use relay::RelayClient;
pub use relay::{
    FrameStatus, MismatchPolicy, RelayError, RelayFrame, RelaySession, RelaySettings, SessionEnd,
};
pub use state::AppState;
