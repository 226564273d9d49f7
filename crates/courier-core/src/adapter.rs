//! Adapter traits.
//!
//! Adapters translate between a chat platform and the kernel's
//! [`Envelope`]/[`LifecycleEvent`] vocabulary. Every adapter implements the
//! base [`Adapter`] trait; optional capabilities are exposed through
//! `as_*` accessors so the kernel can test for them at delivery time:
//!
//! ```text
//! Adapter ──┬── send / reply          (always)
//!           ├── as_direct()           → DirectSend          (optional)
//!           └── as_slash_commands()   → SlashCommandSupport (optional)
//! ```
//!
//! The kernel hands each adapter an [`AdapterContext`] on start; adapters
//! call back into it for every inbound message.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::command::{SlashCommand, SlashCommandToken};
use crate::envelope::Envelope;
use crate::error::{AdapterResult, BoxError};
use crate::event::LifecycleEvent;

// =============================================================================
// Adapter Traits
// =============================================================================

/// The base adapter interface.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Returns the adapter name, used to resolve slash-command tokens.
    fn name(&self) -> &str;

    /// Posts `message` to the envelope's channel.
    async fn send(&self, envelope: &Envelope, message: &str) -> AdapterResult<()>;

    /// Replies to the envelope's user.
    async fn reply(&self, envelope: &Envelope, message: &str) -> AdapterResult<()>;

    /// Starts the adapter's own connect/listen loop.
    ///
    /// Called once at boot. Long-running loops must be spawned; this method
    /// should return once the adapter is ready.
    async fn on_start(&self, ctx: Arc<dyn AdapterContext>) -> AdapterResult<()>;

    /// Called when the runtime is shutting down.
    async fn on_shutdown(&self) -> AdapterResult<()> {
        Ok(())
    }

    /// Returns the direct-send capability, if supported.
    fn as_direct(&self) -> Option<&dyn DirectSend> {
        None
    }

    /// Returns the slash-command capability, if supported.
    fn as_slash_commands(&self) -> Option<&dyn SlashCommandSupport> {
        None
    }
}

/// Private delivery to a single user.
#[async_trait]
pub trait DirectSend: Send + Sync {
    async fn send_direct(&self, envelope: &Envelope, message: &str) -> AdapterResult<()>;
}

/// Slash-command integration.
#[async_trait]
pub trait SlashCommandSupport: Send + Sync {
    /// Converts a command's textual result into the platform's reply payload.
    fn format(&self, message: &str) -> AdapterResult<Value>;

    /// Registers a command with the platform and returns the tokens the
    /// platform will present when the command is invoked.
    async fn register_command(
        &self,
        command: &SlashCommand,
    ) -> AdapterResult<Vec<SlashCommandToken>>;
}

/// A shared adapter trait object.
pub type BoxedAdapter = Arc<dyn Adapter>;

/// Adapters that can be built from their configuration table.
///
/// Separates compile-time concerns (`Config` type, `from_config()`)
/// from the object-safe [`Adapter`] trait.
pub trait ConfigurableAdapter: Adapter {
    /// The configuration type, deserialized from `adapters.<name>`.
    type Config: serde::de::DeserializeOwned + Default;

    /// Returns the key of the adapter's table under `adapters`.
    fn config_key() -> &'static str
    where
        Self: Sized;

    /// Creates an adapter instance from its deserialized configuration.
    fn from_config(config: Self::Config) -> AdapterResult<Self>
    where
        Self: Sized;
}

// =============================================================================
// Adapter Context
// =============================================================================

/// The kernel as seen by an adapter.
#[async_trait]
pub trait AdapterContext: Send + Sync {
    /// Returns the robot's display name.
    fn robot_name(&self) -> &str;

    /// Feeds an inbound message through dispatch and fan-out.
    async fn receive(&self, envelope: Envelope);

    /// Publishes a lifecycle event, e.g. `channel_enter`.
    async fn emit(&self, event: LifecycleEvent);

    /// Resolves a slash-command token id.
    fn find_command_token(&self, id: &str) -> Option<SlashCommandToken>;

    /// Runs the command a token resolves to. `Ok(None)` means "no reply".
    async fn dispatch_command(
        &self,
        token: &SlashCommandToken,
        envelope: Envelope,
    ) -> Result<Option<Value>, BoxError>;
}
