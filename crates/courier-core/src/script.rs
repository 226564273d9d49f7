//! Pattern-triggered scripts.
//!
//! A [`Script`] couples a regular expression with an async handler that turns
//! a matching [`Envelope`] into zero or more candidate replies. The script's
//! [`ScriptKind`] decides which outbound path consumes those replies.
//!
//! ```rust,ignore
//! let badger = Script::new("badger", "(?i)badger", ScriptKind::Send)
//!     .description("Badgers? BADGERS?")
//!     .handler(|_envelope, _subs| async { Ok(vec!["BADGERS!".to_string()]) });
//! ```

use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::{HandlerResult, RegistryError, RegistryResult};
use crate::pattern::{Pattern, SubMatches};
use crate::sanitize::Sanitizer;

/// Type-erased script handler.
pub type ScriptHandler =
    Arc<dyn Fn(Envelope, SubMatches) -> BoxFuture<'static, HandlerResult<Vec<String>>> + Send + Sync>;

/// Wraps an async closure into a [`ScriptHandler`].
pub fn script_handler<F, Fut>(f: F) -> ScriptHandler
where
    F: Fn(Envelope, SubMatches) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult<Vec<String>>> + Send + 'static,
{
    Arc::new(move |envelope, subs| f(envelope, subs).boxed())
}

/// Output path consuming a script's replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptKind {
    /// Sent to the channel.
    Send,
    /// Replied to the originating user.
    Respond,
    /// Sent privately to the originating user.
    Direct,
}

impl ScriptKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "send",
            Self::Respond => "respond",
            Self::Direct => "direct",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "send" => Ok(Self::Send),
            "respond" => Ok(Self::Respond),
            "direct" => Ok(Self::Direct),
            other => Err(format!("unknown script type '{other}'")),
        }
    }
}

/// A pattern-triggered handler.
#[derive(Clone)]
pub struct Script {
    pub name: String,
    pub description: String,
    pub example: String,
    pub matcher: String,
    pub trigger_on_mention: bool,
    pub kind: ScriptKind,
    handler: Option<ScriptHandler>,
    sanitizer: Option<Sanitizer>,
    pattern: Option<Pattern>,
}

impl Script {
    /// Creates a script without a handler.
    pub fn new(name: impl Into<String>, matcher: impl Into<String>, kind: ScriptKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            example: String::new(),
            matcher: matcher.into(),
            trigger_on_mention: false,
            kind,
            handler: None,
            sanitizer: None,
            pattern: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.example = example.into();
        self
    }

    /// Only fire when the robot was addressed directly.
    pub fn trigger_on_mention(mut self, enabled: bool) -> Self {
        self.trigger_on_mention = enabled;
        self
    }

    /// Overrides the standard sanitizer.
    pub fn sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = Some(sanitizer);
        self
    }

    /// Sets the handler from an async closure.
    pub fn handler<F, Fut>(self, f: F) -> Self
    where
        F: Fn(Envelope, SubMatches) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<Vec<String>>> + Send + 'static,
    {
        self.with_handler(script_handler(f))
    }

    /// Sets an already type-erased handler.
    pub fn with_handler(mut self, handler: ScriptHandler) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn get_handler(&self) -> Option<&ScriptHandler> {
        self.handler.as_ref()
    }

    pub fn get_sanitizer(&self) -> Option<&Sanitizer> {
        self.sanitizer.as_ref()
    }

    /// Returns the compiled matcher. Present once the script is prepared.
    pub fn get_pattern(&self) -> Option<&Pattern> {
        self.pattern.as_ref()
    }

    /// Validates required fields, compiles the matcher and installs the
    /// standard sanitizer when none was given.
    pub fn prepare(&mut self) -> RegistryResult<()> {
        const KIND: &str = "script";
        if self.name.is_empty() {
            return Err(RegistryError::missing(KIND, &self.name, "name"));
        }
        if self.matcher.is_empty() {
            return Err(RegistryError::missing(KIND, &self.name, "matcher"));
        }
        if self.handler.is_none() {
            return Err(RegistryError::missing(KIND, &self.name, "handler"));
        }
        let pattern = Pattern::new(&self.matcher).map_err(|e| RegistryError::InvalidPattern {
            kind: KIND,
            name: self.name.clone(),
            reason: e.to_string(),
        })?;
        self.pattern = Some(pattern);
        self.sanitizer.get_or_insert_with(Sanitizer::standard);
        Ok(())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Script")
            .field("name", &self.name)
            .field("matcher", &self.matcher)
            .field("kind", &self.kind)
            .field("trigger_on_mention", &self.trigger_on_mention)
            .field("sanitizer", &self.sanitizer)
            .finish_non_exhaustive()
    }
}
