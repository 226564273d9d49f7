//! Middleware chains wrapping script and command handlers.
//!
//! A middleware receives the entry being invoked and the next handler, and
//! returns a replacement handler of the same shape. Chains apply their layers
//! in reverse registration order, so the first-registered middleware is the
//! outermost one:
//!
//! ```text
//! use(A); use(B);   ──▶   A( B( base ) )
//! ```
//!
//! The same [`MiddlewareChain`] type serves scripts ([`ScriptChain`]) and
//! slash commands ([`CommandChain`]).

use std::fmt;
use std::sync::Arc;

use courier_core::{CommandHandler, Script, ScriptHandler, SlashCommand};
use parking_lot::RwLock;

/// Decorates a handler of shape `H` invoked for entry `E`.
pub trait Middleware<E, H>: Send + Sync {
    fn wrap(&self, entry: &E, next: H) -> H;
}

/// Middleware for script handlers.
pub type ScriptMiddleware = dyn Middleware<Script, ScriptHandler>;

/// Middleware for slash command handlers.
pub type CommandMiddleware = dyn Middleware<SlashCommand, CommandHandler>;

/// A middleware built from a closure.
///
/// ```rust,ignore
/// robot.use_script_middleware(middleware_fn(|script: &Script, next: ScriptHandler| {
///     let name = script.name.clone();
///     script_handler(move |envelope, subs| {
///         let next = next.clone();
///         let name = name.clone();
///         async move {
///             tracing::info!(script = %name, "invoking");
///             next(envelope, subs).await
///         }
///     })
/// }));
/// ```
pub struct FnMiddleware<F> {
    f: F,
}

/// Creates a [`FnMiddleware`].
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F> {
    FnMiddleware { f }
}

impl<E, H, F> Middleware<E, H> for FnMiddleware<F>
where
    F: Fn(&E, H) -> H + Send + Sync,
{
    fn wrap(&self, entry: &E, next: H) -> H {
        (self.f)(entry, next)
    }
}

/// An ordered set of middlewares.
pub struct MiddlewareChain<E: 'static, H: 'static> {
    layers: RwLock<Vec<Arc<dyn Middleware<E, H>>>>,
}

/// Chain applied to every script invocation.
pub type ScriptChain = MiddlewareChain<Script, ScriptHandler>;

/// Chain applied to every slash command invocation.
pub type CommandChain = MiddlewareChain<SlashCommand, CommandHandler>;

impl<E: 'static, H: 'static> MiddlewareChain<E, H> {
    pub fn new() -> Self {
        Self {
            layers: RwLock::new(Vec::new()),
        }
    }

    /// Appends a middleware. It wraps every middleware appended after it.
    pub fn push(&self, middleware: Arc<dyn Middleware<E, H>>) {
        self.layers.write().push(middleware);
    }

    /// Wraps `base` with every layer, first-registered outermost.
    pub fn apply(&self, entry: &E, base: H) -> H {
        let layers = self.layers.read().clone();
        layers
            .iter()
            .rev()
            .fold(base, |next, layer| layer.wrap(entry, next))
    }

    pub fn len(&self) -> usize {
        self.layers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.read().is_empty()
    }
}

impl<E: 'static, H: 'static> Default for MiddlewareChain<E, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static, H: 'static> fmt::Debug for MiddlewareChain<E, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("layers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::{Envelope, ScriptKind, command_handler, script_handler};
    use parking_lot::Mutex;

    fn recording(tag: &'static str, log: Arc<Mutex<Vec<String>>>) -> Arc<ScriptMiddleware> {
        Arc::new(middleware_fn(move |_: &Script, next: ScriptHandler| {
            let log = log.clone();
            script_handler(move |envelope, subs| {
                let next = next.clone();
                let log = log.clone();
                async move {
                    log.lock().push(format!("{tag}:before"));
                    let out = next(envelope, subs).await;
                    log.lock().push(format!("{tag}:after"));
                    out
                }
            })
        }))
    }

    #[tokio::test]
    async fn test_first_registered_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = ScriptChain::new();
        chain.push(recording("A", log.clone()));
        chain.push(recording("B", log.clone()));

        let base_log = log.clone();
        let base = script_handler(move |_, _| {
            let base_log = base_log.clone();
            async move {
                base_log.lock().push("base".to_string());
                Ok(vec!["done".to_string()])
            }
        });

        let script = Script::new("s", "s", ScriptKind::Send);
        let handler = chain.apply(&script, base);
        let out = handler(Envelope::default(), Vec::new()).await.unwrap();

        assert_eq!(out, ["done"]);
        assert_eq!(
            *log.lock(),
            ["A:before", "B:before", "base", "B:after", "A:after"]
        );
    }

    #[tokio::test]
    async fn test_middleware_can_short_circuit() {
        let chain = CommandChain::new();
        chain.push(Arc::new(middleware_fn(
            |_: &SlashCommand, _next: CommandHandler| -> CommandHandler {
                command_handler(|_| async { Ok("blocked".to_string()) })
            },
        )));

        let command = SlashCommand::new("ping", "ping");
        let base = command_handler(|_| async { Ok("pong".to_string()) });
        let out = chain.apply(&command, base)(Envelope::default()).await.unwrap();
        assert_eq!(out, "blocked");
    }

    #[tokio::test]
    async fn test_empty_chain_returns_base() {
        let chain = CommandChain::new();
        assert!(chain.is_empty());
        let base = command_handler(|_| async { Ok("pong".to_string()) });
        let out = chain
            .apply(&SlashCommand::new("p", "p"), base)(Envelope::default())
            .await
            .unwrap();
        assert_eq!(out, "pong");
    }
}
