//! # Courier Framework
//!
//! The dispatch kernel. A [`Robot`] owns:
//!
//! - the script and slash-command [`Registry`]s
//! - the two [`MiddlewareChain`]s wrapping every handler call
//! - the [`EventBus`] publishing lifecycle events
//! - the registered adapters and the slash-command token table
//!
//! and implements the receive → dispatch → fan-out pipeline adapters feed
//! through [`courier_core::AdapterContext`].
//!
//! ```rust,ignore
//! use courier_framework::prelude::*;
//!
//! let robot = Arc::new(Robot::new("courier"));
//! robot.register_script(
//!     Script::new("badger", "(?i)badger", ScriptKind::Send)
//!         .handler(|_, _| async { Ok(vec!["BADGERS!".to_string()]) }),
//! )?;
//! robot.receive(Envelope::new("I love badgers")).await;
//! ```

pub mod authorize;
pub mod bus;
mod dispatch;
pub mod error;
pub mod fanout;
mod help;
pub mod middleware;
pub mod program;
pub mod registry;
pub mod robot;
pub mod users;

#[cfg(test)]
pub(crate) mod testing;

pub use authorize::{AccessControl, AuthorizeConfig, AuthorizeMiddleware, Group};
pub use bus::{Delivery, EventBus, Subscription};
pub use error::{DispatchError, DispatchResult, FanOutError, ProgramError, ProgramResult};
pub use fanout::choose_random_message;
pub use middleware::{
    CommandChain, CommandMiddleware, FnMiddleware, Middleware, MiddlewareChain, ScriptChain,
    ScriptMiddleware, middleware_fn,
};
pub use program::{ProgramBridge, ProgramDefinition, ProgramScript};
pub use registry::{Registry, RegistryEntry};
pub use robot::{ICON_ROUTE, Robot};
pub use users::UserDirectory;

/// Convenient re-exports for writing bots.
pub mod prelude {
    pub use std::sync::Arc;

    pub use courier_core::{
        Adapter, AdapterContext, AdapterError, AdapterResult, BoxError, DirectSend, Envelope,
        EventName, HandlerResult, LifecycleEvent, Sanitizer, Script, ScriptKind, SlashCommand,
        SlashCommandSupport, SlashCommandToken, UserIdentity,
    };

    pub use crate::{AuthorizeMiddleware, Middleware, Robot, middleware_fn};
}
