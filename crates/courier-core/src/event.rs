//! Lifecycle events published on the event bus.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;

/// Name of a lifecycle event. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    Started,
    Initialized,
    InitializedStore,
    Received,
    Send,
    Respond,
    ChannelEnter,
    ChannelLeave,
    UserOnline,
    UserOffline,
    NoScriptFound,
}

impl EventName {
    /// Every event name, in declaration order.
    pub const ALL: [EventName; 11] = [
        Self::Started,
        Self::Initialized,
        Self::InitializedStore,
        Self::Received,
        Self::Send,
        Self::Respond,
        Self::ChannelEnter,
        Self::ChannelLeave,
        Self::UserOnline,
        Self::UserOffline,
        Self::NoScriptFound,
    ];

    /// Returns the wire name of this event.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Initialized => "initialized",
            Self::InitializedStore => "initialized_store",
            Self::Received => "received",
            Self::Send => "send",
            Self::Respond => "respond",
            Self::ChannelEnter => "channel_enter",
            Self::ChannelLeave => "channel_leave",
            Self::UserOnline => "user_online",
            Self::UserOffline => "user_offline",
            Self::NoScriptFound => "no_script_found",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle notification: its name, the envelope it concerns, and the
/// chosen output message when one applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub name: EventName,
    #[serde(default)]
    pub envelope: Envelope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LifecycleEvent {
    /// Creates an event without an output message.
    pub fn new(name: EventName, envelope: Envelope) -> Self {
        Self {
            name,
            envelope,
            message: None,
        }
    }

    /// Creates an event carrying the chosen output message.
    pub fn with_message(name: EventName, envelope: Envelope, message: impl Into<String>) -> Self {
        Self {
            name,
            envelope,
            message: Some(message.into()),
        }
    }

    /// Creates an event with an empty envelope, used for boot notifications.
    pub fn bare(name: EventName) -> Self {
        Self::new(name, Envelope::default())
    }
}
