//! Explicitly triggered slash commands.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::{HandlerResult, RegistryError, RegistryResult};

/// Type-erased slash command handler. An empty result means "no reply".
pub type CommandHandler =
    Arc<dyn Fn(Envelope) -> BoxFuture<'static, HandlerResult<String>> + Send + Sync>;

/// Wraps an async closure into a [`CommandHandler`].
pub fn command_handler<F, Fut>(f: F) -> CommandHandler
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<String>> + Send + 'static,
{
    Arc::new(move |envelope| f(envelope).boxed())
}

/// A handler invoked by trigger keyword rather than by pattern.
#[derive(Clone)]
pub struct SlashCommand {
    pub title: String,
    pub trigger: String,
    pub description: String,
    handler: Option<CommandHandler>,
}

impl SlashCommand {
    pub fn new(title: impl Into<String>, trigger: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            trigger: trigger.into(),
            description: String::new(),
            handler: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn handler<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Envelope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<String>> + Send + 'static,
    {
        self.with_handler(command_handler(f))
    }

    pub fn with_handler(mut self, handler: CommandHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn get_handler(&self) -> Option<&CommandHandler> {
        self.handler.as_ref()
    }

    /// Validates required fields.
    pub fn prepare(&mut self) -> RegistryResult<()> {
        const KIND: &str = "slash command";
        if self.title.is_empty() {
            return Err(RegistryError::missing(KIND, &self.trigger, "title"));
        }
        if self.trigger.is_empty() {
            return Err(RegistryError::missing(KIND, &self.title, "trigger"));
        }
        if self.handler.is_none() {
            return Err(RegistryError::missing(KIND, &self.title, "handler"));
        }
        Ok(())
    }
}

impl fmt::Debug for SlashCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlashCommand")
            .field("title", &self.title)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

/// Resolves an opaque token handed out by an adapter to the adapter and
/// command it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashCommandToken {
    pub id: String,
    #[serde(default)]
    pub adapter_name: String,
    pub command_name: String,
}

impl SlashCommandToken {
    pub fn new(
        id: impl Into<String>,
        adapter_name: impl Into<String>,
        command_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            adapter_name: adapter_name.into(),
            command_name: command_name.into(),
        }
    }
}
