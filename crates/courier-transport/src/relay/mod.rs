//! Relay protocol: the event bus streamed to external clients.

pub mod frame;
pub mod server;
pub mod session;

#[cfg(feature = "ws-client")]
pub mod client;

#[cfg(feature = "ws-client")]
pub use client::RelayClient;
pub use frame::{FrameStatus, RelayFrame};
pub use server::{WsFrameTransport, websocket_handler};
pub use session::{
    FrameTransport, MismatchPolicy, RelayError, RelayResult, RelaySession, RelaySettings,
    SessionEnd, SessionSummary,
};
