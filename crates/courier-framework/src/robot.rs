//! The robot: the kernel context object.
//!
//! A single [`Robot`] is built at startup and shared as `Arc<Robot>` with every
//! component that needs the registries, the event bus or the adapters.
//!
//! ```rust,ignore
//! let robot = Arc::new(Robot::new("courier").with_tokens(["s3cret"]));
//! robot.register_script(
//!     Script::new("badger", "(?i)badger", ScriptKind::Send)
//!         .handler(|_, _| async { Ok(vec!["BADGERS!".to_string()]) }),
//! )?;
//! robot.register_adapter(Arc::new(MyAdapter::new()));
//! robot.start_adapters().await;
//! ```
//!
//! Dispatch lives in `dispatch.rs`, outbound delivery in `fanout.rs`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{
    AdapterContext, BoxError, BoxedAdapter, CommandHandler, Envelope, EventName, LifecycleEvent,
    RegistryResult, Script, ScriptHandler, SlashCommand, SlashCommandToken,
};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::bus::{EventBus, Subscription};
use crate::middleware::{CommandChain, Middleware, ScriptChain};
use crate::registry::{Registry, RegistryEntry};
use crate::users::UserDirectory;

/// Route under which the robot's icon is served.
pub const ICON_ROUTE: &str = "/static/courier_icon.png";

/// The dispatch kernel.
pub struct Robot {
    name: String,
    host: Option<String>,
    tokens: RwLock<Vec<String>>,
    pub(crate) bus: EventBus,
    pub(crate) scripts: Registry<Script>,
    pub(crate) commands: Registry<SlashCommand>,
    pub(crate) script_chain: ScriptChain,
    pub(crate) command_chain: CommandChain,
    pub(crate) adapters: RwLock<Vec<BoxedAdapter>>,
    command_tokens: RwLock<HashMap<String, SlashCommandToken>>,
    pub(crate) users: UserDirectory,
}

impl Robot {
    /// Creates a robot named `name` with no host and no tokens.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
            tokens: RwLock::new(Vec::new()),
            bus: EventBus::new(),
            scripts: Registry::new(),
            commands: Registry::new(),
            script_chain: ScriptChain::new(),
            command_chain: CommandChain::new(),
            adapters: RwLock::new(Vec::new()),
            command_tokens: RwLock::new(HashMap::new()),
            users: UserDirectory::new(),
        }
    }

    /// Sets the public base URL the robot is reachable at.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        let host = host.into();
        self.host = (!host.is_empty()).then_some(host);
        self
    }

    /// Sets the tokens accepted by the HTTP surface and the relay protocol.
    pub fn with_tokens<I, S>(self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.tokens.write() = tokens
            .into_iter()
            .map(Into::into)
            .filter(|t: &String| !t.is_empty())
            .collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn scripts(&self) -> &Registry<Script> {
        &self.scripts
    }

    pub fn commands(&self) -> &Registry<SlashCommand> {
        &self.commands
    }

    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    // =========================================================================
    // Tokens
    // =========================================================================

    /// Returns whether `token` is in the allow-list. Empty tokens never are.
    pub fn is_valid_token(&self, token: &str) -> bool {
        !token.is_empty() && self.tokens.read().iter().any(|t| t == token)
    }

    /// Adds a token to the allow-list.
    pub fn add_token(&self, token: impl Into<String>) {
        let token = token.into();
        if !token.is_empty() {
            self.tokens.write().push(token);
        }
    }

    pub fn has_tokens(&self) -> bool {
        !self.tokens.read().is_empty()
    }

    // =========================================================================
    // Registries
    // =========================================================================

    pub fn register_script(&self, script: Script) -> RegistryResult<()> {
        self.scripts.register(script)
    }

    pub fn register_scripts(&self, scripts: impl IntoIterator<Item = Script>) -> RegistryResult<()> {
        self.scripts.register_all(scripts)
    }

    /// Removes the script sharing `script`'s name, matcher and type.
    pub fn unregister_script(&self, script: &Script) -> bool {
        self.scripts.unregister(&script.key())
    }

    pub fn update_script(&self, script: Script) -> RegistryResult<bool> {
        self.scripts.update(script)
    }

    pub fn register_command(&self, command: SlashCommand) -> RegistryResult<()> {
        self.commands.register(command)
    }

    pub fn register_commands(
        &self,
        commands: impl IntoIterator<Item = SlashCommand>,
    ) -> RegistryResult<()> {
        self.commands.register_all(commands)
    }

    /// Removes the command sharing `command`'s title and trigger.
    pub fn unregister_command(&self, command: &SlashCommand) -> bool {
        self.commands.unregister(&command.key())
    }

    pub fn update_command(&self, command: SlashCommand) -> RegistryResult<bool> {
        self.commands.update(command)
    }

    // =========================================================================
    // Middleware
    // =========================================================================

    /// Installs a middleware on both the script and the command chain.
    pub fn use_middleware<M>(&self, middleware: M)
    where
        M: Middleware<Script, ScriptHandler> + Middleware<SlashCommand, CommandHandler> + 'static,
    {
        let middleware = Arc::new(middleware);
        self.script_chain.push(middleware.clone());
        self.command_chain.push(middleware);
    }

    pub fn use_script_middleware<M>(&self, middleware: M)
    where
        M: Middleware<Script, ScriptHandler> + 'static,
    {
        self.script_chain.push(Arc::new(middleware));
    }

    pub fn use_command_middleware<M>(&self, middleware: M)
    where
        M: Middleware<SlashCommand, CommandHandler> + 'static,
    {
        self.command_chain.push(Arc::new(middleware));
    }

    // =========================================================================
    // Adapters
    // =========================================================================

    pub fn register_adapter(&self, adapter: BoxedAdapter) {
        info!(adapter = %adapter.name(), "Registered adapter");
        self.adapters.write().push(adapter);
    }

    /// Returns every adapter in registration order.
    pub fn adapters(&self) -> Vec<BoxedAdapter> {
        self.adapters.read().clone()
    }

    pub fn find_adapter(&self, name: &str) -> Option<BoxedAdapter> {
        self.adapters.read().iter().find(|a| a.name() == name).cloned()
    }

    /// Starts every adapter with this robot as its context. Failures are
    /// logged and the adapter is left registered.
    pub async fn start_adapters(self: &Arc<Self>) {
        let ctx: Arc<dyn AdapterContext> = self.clone();
        for adapter in self.adapters() {
            match adapter.on_start(ctx.clone()).await {
                Ok(()) => info!(adapter = %adapter.name(), "Adapter started"),
                Err(e) => error!(adapter = %adapter.name(), error = %e, "Failed to start adapter"),
            }
        }
    }

    /// Shuts every adapter down.
    pub async fn stop_adapters(&self) {
        for adapter in self.adapters() {
            if let Err(e) = adapter.on_shutdown().await {
                error!(adapter = %adapter.name(), error = %e, "Error during adapter shutdown");
            }
        }
    }

    // =========================================================================
    // Slash Command Tokens
    // =========================================================================

    /// Registers every slash command with every adapter supporting them and
    /// records the returned tokens.
    pub async fn init_slash_commands(&self) {
        let commands = self.commands.snapshot();
        for adapter in self.adapters() {
            let Some(support) = adapter.as_slash_commands() else {
                continue;
            };
            for command in &commands {
                match support.register_command(command).await {
                    Ok(tokens) => {
                        for mut token in tokens {
                            if token.adapter_name.is_empty() {
                                token.adapter_name = adapter.name().to_string();
                            }
                            self.store_command_token(token);
                        }
                    }
                    Err(e) => warn!(
                        adapter = %adapter.name(),
                        command = %command.trigger,
                        error = %e,
                        "Failed to register slash command"
                    ),
                }
            }
        }
    }

    pub fn store_command_token(&self, token: SlashCommandToken) {
        debug!(token = %token.id, command = %token.command_name, "Stored slash command token");
        self.command_tokens.write().insert(token.id.clone(), token);
    }

    pub fn find_command_token(&self, id: &str) -> Option<SlashCommandToken> {
        self.command_tokens.read().get(id).cloned()
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Publishes `event` and waits until every subscriber processed it.
    pub async fn emit(&self, event: LifecycleEvent) -> usize {
        self.bus.emit(event).await
    }

    pub fn on(&self, name: EventName) -> Subscription {
        self.bus.on(name)
    }

    pub fn once(&self, name: EventName) -> Subscription {
        self.bus.once(name)
    }

    pub fn on_any(&self) -> Subscription {
        self.bus.on_any()
    }
}

impl fmt::Debug for Robot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Robot")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("scripts", &self.scripts.len())
            .field("commands", &self.commands.len())
            .field("adapters", &self.adapters.read().len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AdapterContext for Robot {
    fn robot_name(&self) -> &str {
        &self.name
    }

    async fn receive(&self, envelope: Envelope) {
        Robot::receive(self, envelope).await;
    }

    async fn emit(&self, event: LifecycleEvent) {
        Robot::emit(self, event).await;
    }

    fn find_command_token(&self, id: &str) -> Option<SlashCommandToken> {
        Robot::find_command_token(self, id)
    }

    async fn dispatch_command(
        &self,
        token: &SlashCommandToken,
        envelope: Envelope,
    ) -> Result<Option<Value>, BoxError> {
        Ok(Robot::dispatch_command(self, token, envelope).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::ScriptKind;

    #[test]
    fn test_token_validation() {
        let robot = Robot::new("bot").with_tokens(["abc", ""]);
        assert!(robot.is_valid_token("abc"));
        assert!(!robot.is_valid_token(""));
        assert!(!robot.is_valid_token("abd"));

        robot.add_token("def");
        assert!(robot.is_valid_token("def"));
    }

    #[test]
    fn test_empty_host_is_none() {
        assert!(Robot::new("bot").with_host("").host().is_none());
        assert_eq!(
            Robot::new("bot").with_host("http://x").host(),
            Some("http://x")
        );
    }

    #[test]
    fn test_unregister_script_by_key() {
        let robot = Robot::new("bot");
        let script = Script::new("a", "a", ScriptKind::Send).handler(|_, _| async { Ok(vec![]) });
        robot.register_script(script.clone()).unwrap();
        assert!(robot.unregister_script(&script));
        assert!(!robot.unregister_script(&script));
    }

    #[tokio::test]
    async fn test_init_slash_commands_stores_tokens() {
        let robot = Robot::new("bot");
        robot.register_adapter(Arc::new(crate::testing::RecordingAdapter::new("recording")));
        robot
            .register_command(
                SlashCommand::new("ping", "ping").handler(|_| async { Ok("pong".to_string()) }),
            )
            .unwrap();

        robot.init_slash_commands().await;

        let token = robot.find_command_token("recording-ping").unwrap();
        assert_eq!(token.adapter_name, "recording");
        assert_eq!(token.command_name, "ping");
        assert!(robot.find_command_token("unknown").is_none());
    }
}
