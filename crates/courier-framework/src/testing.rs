//! Test doubles.

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{
    Adapter, AdapterContext, AdapterError, AdapterResult, DirectSend, Envelope, SlashCommand,
    SlashCommandSupport, SlashCommandToken,
};
use parking_lot::Mutex;
use serde_json::Value;

/// Adapter recording every delivery as `(route, message)`.
#[derive(Default)]
pub struct RecordingAdapter {
    name: String,
    direct: bool,
    failing: bool,
    sent: Mutex<Vec<(String, String)>>,
    envelopes: Mutex<Vec<Envelope>>,
}

impl RecordingAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Enables the direct-send capability.
    pub fn with_direct(mut self) -> Self {
        self.direct = true;
        self
    }

    /// Makes every delivery fail.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    pub fn envelopes(&self) -> Vec<Envelope> {
        self.envelopes.lock().clone()
    }

    fn record(&self, route: &str, envelope: &Envelope, message: &str) -> AdapterResult<()> {
        if self.failing {
            return Err(AdapterError::send("recording adapter set to fail"));
        }
        self.sent.lock().push((route.to_string(), message.to_string()));
        self.envelopes.lock().push(envelope.clone());
        Ok(())
    }
}

#[async_trait]
impl Adapter for RecordingAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, envelope: &Envelope, message: &str) -> AdapterResult<()> {
        self.record("send", envelope, message)
    }

    async fn reply(&self, envelope: &Envelope, message: &str) -> AdapterResult<()> {
        self.record("reply", envelope, message)
    }

    async fn on_start(&self, _ctx: Arc<dyn AdapterContext>) -> AdapterResult<()> {
        Ok(())
    }

    fn as_direct(&self) -> Option<&dyn DirectSend> {
        self.direct.then_some(self as &dyn DirectSend)
    }

    fn as_slash_commands(&self) -> Option<&dyn SlashCommandSupport> {
        Some(self)
    }
}

#[async_trait]
impl DirectSend for RecordingAdapter {
    async fn send_direct(&self, envelope: &Envelope, message: &str) -> AdapterResult<()> {
        self.record("direct", envelope, message)
    }
}

#[async_trait]
impl SlashCommandSupport for RecordingAdapter {
    fn format(&self, message: &str) -> AdapterResult<Value> {
        Ok(Value::String(message.to_string()))
    }

    async fn register_command(
        &self,
        command: &SlashCommand,
    ) -> AdapterResult<Vec<SlashCommandToken>> {
        Ok(vec![SlashCommandToken::new(
            format!("{}-{}", self.name, command.trigger),
            "",
            command.trigger.clone(),
        )])
    }
}
