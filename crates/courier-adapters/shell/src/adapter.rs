//! Shell adapter implementation.

use std::io::{self, Write};
use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{
    Adapter, AdapterContext, AdapterError, AdapterResult, ConfigurableAdapter, DirectSend,
    Envelope, EventName, LifecycleEvent, SlashCommand, SlashCommandSupport, SlashCommandToken,
    UserIdentity,
};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ShellConfig;

pub const ADAPTER_NAME: &str = "shell";

const SEND_PREFIX: &str = "Send> ";
const REPLY_PREFIX: &str = "Reply> ";
const DIRECT_PREFIX: &str = "Direct> ";

/// Shared, line-oriented output sink.
#[derive(Clone)]
struct Output(Arc<Mutex<Box<dyn Write + Send>>>);

impl Output {
    fn line(&self, prefix: &str, message: &str) -> AdapterResult<()> {
        let mut out = self.0.lock();
        writeln!(out, "{prefix}{message}")
            .and_then(|_| out.flush())
            .map_err(|e| AdapterError::send(e.to_string()))
    }
}

/// Talks to the robot from a terminal.
///
/// Every line typed on stdin becomes an inbound [`Envelope`]. A line starting
/// with `/` invokes a slash command; `/enter`, `/leave`, `/online` and
/// `/offline` emit the matching presence event when no command claims them.
pub struct ShellAdapter {
    config: ShellConfig,
    out: Output,
    shutdown: CancellationToken,
}

impl ShellAdapter {
    pub fn new(config: ShellConfig) -> Self {
        Self {
            config,
            out: Output(Arc::new(Mutex::new(Box::new(io::stdout())))),
            shutdown: CancellationToken::new(),
        }
    }

    /// Replaces stdout with `writer`.
    pub fn with_writer(mut self, writer: impl Write + Send + 'static) -> Self {
        self.out = Output(Arc::new(Mutex::new(Box::new(writer))));
        self
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    /// Processes one line of input.
    pub async fn handle_line(&self, ctx: &dyn AdapterContext, line: &str) {
        handle_line(&self.config, &self.out, ctx, line).await;
    }
}

impl Default for ShellAdapter {
    fn default() -> Self {
        Self::new(ShellConfig::default())
    }
}

fn envelope_for(config: &ShellConfig, message: &str) -> Envelope {
    let user = UserIdentity {
        name: config.user_name.clone(),
        id: config.user_name.clone(),
        channel_name: config.channel_name.clone(),
        ..Default::default()
    };
    Envelope::new(message)
        .with_channel(config.channel_name.clone())
        .with_user(user)
}

fn presence_event(word: &str) -> Option<EventName> {
    match word {
        "enter" => Some(EventName::ChannelEnter),
        "leave" => Some(EventName::ChannelLeave),
        "online" => Some(EventName::UserOnline),
        "offline" => Some(EventName::UserOffline),
        _ => None,
    }
}

async fn handle_line(config: &ShellConfig, out: &Output, ctx: &dyn AdapterContext, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let Some(command_line) = line.strip_prefix('/') else {
        ctx.receive(envelope_for(config, line)).await;
        return;
    };

    let (trigger, rest) = command_line
        .split_once(' ')
        .map(|(t, r)| (t, r.trim()))
        .unwrap_or((command_line, ""));

    if let Some(token) = ctx.find_command_token(trigger) {
        let envelope = envelope_for(config, rest);
        match ctx.dispatch_command(&token, envelope).await {
            Ok(Some(value)) => {
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                if !text.is_empty()
                    && let Err(e) = out.line(SEND_PREFIX, &text)
                {
                    warn!(error = %e, "Failed to print command result");
                }
            }
            Ok(None) => {}
            Err(e) => warn!(command = %trigger, error = %e, "Slash command failed"),
        }
        return;
    }

    if let Some(name) = presence_event(trigger) {
        debug!(event = %name, "Emitting presence event");
        ctx.emit(LifecycleEvent::new(name, envelope_for(config, rest)))
            .await;
        return;
    }

    warn!(command = %trigger, "Unknown slash command");
}

#[async_trait]
impl Adapter for ShellAdapter {
    fn name(&self) -> &str {
        ADAPTER_NAME
    }

    async fn send(&self, _envelope: &Envelope, message: &str) -> AdapterResult<()> {
        self.out.line(SEND_PREFIX, message)
    }

    async fn reply(&self, _envelope: &Envelope, message: &str) -> AdapterResult<()> {
        self.out.line(REPLY_PREFIX, message)
    }

    async fn on_start(&self, ctx: Arc<dyn AdapterContext>) -> AdapterResult<()> {
        if !self.config.enabled {
            info!("Shell input disabled");
            return Ok(());
        }

        let config = self.config.clone();
        let out = self.out.clone();
        let shutdown = self.shutdown.clone();
        info!(user = %config.user_name, channel = %config.channel_name, "Shell adapter reading stdin");

        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    next = lines.next_line() => match next {
                        Ok(Some(line)) => handle_line(&config, &out, ctx.as_ref(), &line).await,
                        Ok(None) => {
                            debug!("Shell input closed");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "Failed to read shell input");
                            break;
                        }
                    },
                }
            }
        });
        Ok(())
    }

    async fn on_shutdown(&self) -> AdapterResult<()> {
        self.shutdown.cancel();
        Ok(())
    }

    fn as_direct(&self) -> Option<&dyn DirectSend> {
        Some(self)
    }

    fn as_slash_commands(&self) -> Option<&dyn SlashCommandSupport> {
        Some(self)
    }
}

#[async_trait]
impl DirectSend for ShellAdapter {
    async fn send_direct(&self, _envelope: &Envelope, message: &str) -> AdapterResult<()> {
        self.out.line(DIRECT_PREFIX, message)
    }
}

#[async_trait]
impl SlashCommandSupport for ShellAdapter {
    fn format(&self, message: &str) -> AdapterResult<Value> {
        Ok(Value::String(message.to_string()))
    }

    async fn register_command(
        &self,
        command: &SlashCommand,
    ) -> AdapterResult<Vec<SlashCommandToken>> {
        Ok(vec![SlashCommandToken::new(
            command.trigger.clone(),
            ADAPTER_NAME,
            command.trigger.clone(),
        )])
    }
}

impl ConfigurableAdapter for ShellAdapter {
    type Config = ShellConfig;

    fn config_key() -> &'static str {
        ADAPTER_NAME
    }

    fn from_config(config: Self::Config) -> AdapterResult<Self> {
        Ok(Self::new(config))
    }
}
