//! Relay wire format.
//!
//! Every frame is one JSON text message. Zero sequence numbers and absent
//! fields are omitted:
//!
//! ```text
//! client → server   {"seq":1,"token":"s3cret"}                       handshake
//! server → client   {"status":"OK","seq_reply":1}                    handshake accepted
//! server → client   {"event":{...},"status":"OK","seq":2}            event push
//! client → server   {"status":"OK","seq_reply":2}                    acknowledgment
//! server → client   {"status":"FAIL","error":"...","seq_reply":2}    failure notice
//! ```

use courier_core::LifecycleEvent;
use serde::{Deserialize, Serialize};

/// Outcome carried by a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FrameStatus {
    Ok,
    Fail,
}

/// One message of the relay protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelayFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<LifecycleEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<FrameStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub seq: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub seq_reply: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

impl RelayFrame {
    /// The client's opening frame.
    pub fn handshake(token: impl Into<String>) -> Self {
        Self {
            seq: 1,
            token: Some(token.into()),
            ..Default::default()
        }
    }

    /// A success notice for `seq_reply`.
    pub fn ok(seq_reply: u64) -> Self {
        Self::ack(seq_reply, FrameStatus::Ok)
    }

    /// A failure notice for `seq_reply`.
    pub fn fail(seq_reply: u64, error: impl Into<String>) -> Self {
        Self {
            status: Some(FrameStatus::Fail),
            error: Some(error.into()),
            seq_reply,
            ..Default::default()
        }
    }

    /// An event push numbered `seq`.
    pub fn event(event: LifecycleEvent, seq: u64) -> Self {
        Self {
            event: Some(event),
            status: Some(FrameStatus::Ok),
            seq,
            ..Default::default()
        }
    }

    /// An acknowledgment of frame `seq_reply`.
    pub fn ack(seq_reply: u64, status: FrameStatus) -> Self {
        Self {
            status: Some(status),
            seq_reply,
            ..Default::default()
        }
    }

    /// Returns whether the frame reports a failure. A frame without a status
    /// does not.
    pub fn is_fail(&self) -> bool {
        self.status == Some(FrameStatus::Fail)
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
