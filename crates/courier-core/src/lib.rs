//! # Courier Core
//!
//! Foundation vocabulary shared by every Courier crate:
//!
//! - [`Envelope`] and [`UserIdentity`]: message context
//! - [`LifecycleEvent`] and [`EventName`]: bus notifications
//! - [`Script`] and [`SlashCommand`]: the two kinds of registry entries
//! - [`Sanitizer`] and [`Pattern`]: the matching pipeline
//! - [`Adapter`] and its optional capabilities
//!
//! The dispatch kernel itself lives in `courier-framework`.

pub mod adapter;
pub mod command;
pub mod envelope;
pub mod error;
pub mod event;
pub mod pattern;
pub mod sanitize;
pub mod script;

pub use adapter::{
    Adapter, AdapterContext, BoxedAdapter, ConfigurableAdapter, DirectSend, SlashCommandSupport,
};
pub use command::{CommandHandler, SlashCommand, SlashCommandToken, command_handler};
pub use envelope::{Envelope, Properties, UserIdentity};
pub use error::{
    AdapterError, AdapterResult, BoxError, HandlerResult, RegistryError, RegistryResult,
};
pub use event::{EventName, LifecycleEvent};
pub use pattern::{Pattern, SubMatches};
pub use sanitize::Sanitizer;
pub use script::{Script, ScriptHandler, ScriptKind, script_handler};
