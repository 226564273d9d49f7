//! Message context passed between reception, dispatch and delivery.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form string-keyed property bag.
pub type Properties = Map<String, Value>;

/// Identity of the user a message originates from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Properties,
}

impl UserIdentity {
    /// Creates an identity with only a display name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the opaque user id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// One inbound or outbound message context.
///
/// Channel identity may be given by name, by opaque id, or both; either may be
/// empty. `not_mentioned` is set by adapters when the robot was not addressed
/// directly and drives mention-gating during dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub icon_url: String,
    #[serde(default)]
    pub not_mentioned: bool,
    #[serde(default)]
    pub user: UserIdentity,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub properties: Properties,
}

impl Envelope {
    /// Creates an envelope carrying `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Sets the originating user.
    pub fn with_user(mut self, user: UserIdentity) -> Self {
        self.user = user;
        self
    }

    /// Sets the channel name.
    pub fn with_channel(mut self, channel_name: impl Into<String>) -> Self {
        self.channel_name = channel_name.into();
        self
    }

    /// Marks whether the robot was addressed directly.
    pub fn mentioned(mut self, mentioned: bool) -> Self {
        self.not_mentioned = !mentioned;
        self
    }

    /// Looks up a property by key.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_partial_envelope() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"message":"hi","user":{"name":"ann"}}"#).unwrap();
        assert_eq!(envelope.message, "hi");
        assert_eq!(envelope.user.name, "ann");
        assert!(!envelope.not_mentioned);
        assert!(envelope.channel_name.is_empty());
    }

    #[test]
    fn test_mentioned_flag_is_inverted() {
        assert!(Envelope::new("x").mentioned(false).not_mentioned);
        assert!(!Envelope::new("x").mentioned(true).not_mentioned);
    }
}
