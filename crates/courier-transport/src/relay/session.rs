//! The relay session state machine.
//!
//! ```text
//!   AwaitingAuth ──(valid token, seq 1)──▶ Streaming ──(stream end / abort)──▶ Closed
//!        │                                     │
//!        └──(close / bad token / bad seq)──────┴──────────────────────────────▶ Closed
//! ```
//!
//! While streaming, every bus event is pushed with the next sequence number
//! and held until the client acknowledges it. The bus emitter stays blocked
//! on this session until then. Each event gets at most `max_attempts`
//! writes; running out of attempts ends the connection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_core::LifecycleEvent;
use courier_framework::{Robot, Subscription};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::frame::RelayFrame;

// =============================================================================
// Transport
// =============================================================================

/// Errors raised while exchanging frames.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The peer went away.
    #[error("connection closed")]
    Closed,

    #[error("no frame received within {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The server answered the handshake with a failure.
    #[error("rejected by server: {0}")]
    Rejected(String),

    /// An acknowledgment named another sequence number.
    #[error("{0}")]
    Mismatch(String),
}

impl RelayError {
    /// Returns whether the connection is gone and no retry can succeed.
    pub fn is_close(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// A duplex, message-oriented frame channel.
#[async_trait]
pub trait FrameTransport: Send {
    async fn write_frame(&mut self, frame: &RelayFrame) -> RelayResult<()>;

    /// Reads the next frame, giving up after `timeout` when one is given.
    async fn read_frame(&mut self, timeout: Option<Duration>) -> RelayResult<RelayFrame>;
}

// =============================================================================
// Settings
// =============================================================================

/// What to do when an acknowledgment names the wrong sequence number.
///
/// A failure frame describing the mismatch is written under every policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MismatchPolicy {
    /// Treat the event as handled and move to the next one.
    Skip,
    /// Count the mismatch as a failed attempt and resend the event.
    #[default]
    Retry,
    /// End the connection.
    Abort,
}

/// Delivery parameters of a relay session.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Writes allowed per event.
    pub max_attempts: u32,
    /// Deadline for each acknowledgment.
    pub ack_timeout: Duration,
    /// Deadline for the handshake frame. `None` waits forever.
    pub handshake_timeout: Option<Duration>,
    pub mismatch: MismatchPolicy,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            ack_timeout: Duration::from_secs(3),
            handshake_timeout: None,
            mismatch: MismatchPolicy::default(),
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// The handshake was refused or could not be read.
    HandshakeFailed(String),
    /// The peer closed the connection.
    Closed,
    /// An event could not be delivered within the allowed attempts, or a
    /// sequence mismatch ended the connection.
    DeliveryFailed { seq: u64, reason: String },
    /// The event bus was closed.
    StreamEnded,
}

/// Final state of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub end: SessionEnd,
    /// Sequence number the next event would have carried.
    pub next_seq: u64,
    /// Events the client acknowledged.
    pub delivered: u64,
}

enum Outcome {
    Delivered,
    Skipped,
    Aborted(SessionEnd),
}

/// One relay connection.
pub struct RelaySession<T> {
    transport: T,
    robot: Arc<Robot>,
    settings: RelaySettings,
    peer: String,
}

impl<T: FrameTransport> RelaySession<T> {
    pub fn new(transport: T, robot: Arc<Robot>, settings: RelaySettings) -> Self {
        Self {
            transport,
            robot,
            settings,
            peer: String::from("unknown"),
        }
    }

    /// Sets the peer label used in logs.
    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = peer.into();
        self
    }

    /// Runs the session to completion.
    pub async fn run(mut self) -> SessionSummary {
        let mut subscription = match self.handshake().await {
            Ok(subscription) => subscription,
            Err(end) => {
                info!(peer = %self.peer, reason = ?end, "Relay handshake failed");
                return SessionSummary {
                    end,
                    next_seq: 1,
                    delivered: 0,
                };
            }
        };
        info!(peer = %self.peer, "Relay client connected");

        let mut seq = 2;
        let mut delivered = 0;
        let end = loop {
            let Some(delivery) = subscription.recv().await else {
                break SessionEnd::StreamEnded;
            };
            let outcome = self.deliver(delivery.event(), seq).await;
            drop(delivery);

            match outcome {
                Outcome::Delivered => {
                    delivered += 1;
                    seq += 1;
                }
                Outcome::Skipped => seq += 1,
                Outcome::Aborted(end) => break end,
            }
        };

        info!(peer = %self.peer, reason = ?end, delivered, "Relay client disconnected");
        SessionSummary {
            end,
            next_seq: seq,
            delivered,
        }
    }

    async fn handshake(&mut self) -> Result<Subscription, SessionEnd> {
        let frame = match self
            .transport
            .read_frame(self.settings.handshake_timeout)
            .await
        {
            Ok(frame) => frame,
            Err(e) if e.is_close() => return Err(SessionEnd::Closed),
            Err(e) => return Err(self.refuse(e.to_string()).await),
        };

        let token = frame.token.as_deref().unwrap_or_default();
        if !self.robot.is_valid_token(token) {
            return Err(self.refuse("Invalid token".to_string()).await);
        }
        if frame.seq != 1 {
            let reason = format!("Invalid seq receive, expected 1 got {}", frame.seq);
            return Err(self.refuse(reason).await);
        }

        // Subscribe first so no event emitted after the OK frame is missed.
        let subscription = self.robot.on_any();
        match self.transport.write_frame(&RelayFrame::ok(1)).await {
            Ok(()) => Ok(subscription),
            Err(e) if e.is_close() => Err(SessionEnd::Closed),
            Err(e) => Err(SessionEnd::HandshakeFailed(e.to_string())),
        }
    }

    async fn refuse(&mut self, reason: String) -> SessionEnd {
        if let Err(e) = self
            .transport
            .write_frame(&RelayFrame::fail(1, reason.clone()))
            .await
        {
            debug!(peer = %self.peer, error = %e, "Failed to write handshake refusal");
        }
        SessionEnd::HandshakeFailed(reason)
    }

    async fn deliver(&mut self, event: &LifecycleEvent, seq: u64) -> Outcome {
        let frame = RelayFrame::event(event.clone(), seq);
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=self.settings.max_attempts {
            if let Err(e) = self.transport.write_frame(&frame).await {
                if e.is_close() {
                    return Outcome::Aborted(SessionEnd::Closed);
                }
                warn!(peer = %self.peer, seq, attempt, error = %e, "Failed to write event");
                last_error = format!("error when writing event {}: {e}", event.name);
                continue;
            }

            let ack = match self
                .transport
                .read_frame(Some(self.settings.ack_timeout))
                .await
            {
                Ok(ack) => ack,
                Err(e) if e.is_close() => return Outcome::Aborted(SessionEnd::Closed),
                Err(e) => {
                    warn!(peer = %self.peer, seq, attempt, error = %e, "No acknowledgment");
                    last_error =
                        format!("error when reading reply after event {}: {e}", event.name);
                    continue;
                }
            };

            if ack.seq_reply != seq {
                let reason = format!(
                    "Invalid seq_reply receive, expected {seq} got {}",
                    ack.seq_reply
                );
                warn!(peer = %self.peer, seq, attempt, policy = ?self.settings.mismatch, "{reason}");
                if let Err(e) = self
                    .transport
                    .write_frame(&RelayFrame::fail(seq, reason.clone()))
                    .await
                    && e.is_close()
                {
                    return Outcome::Aborted(SessionEnd::Closed);
                }
                match self.settings.mismatch {
                    MismatchPolicy::Skip => return Outcome::Skipped,
                    MismatchPolicy::Retry => {
                        last_error = reason;
                        continue;
                    }
                    MismatchPolicy::Abort => {
                        return Outcome::Aborted(SessionEnd::DeliveryFailed { seq, reason });
                    }
                }
            }

            if ack.is_fail() {
                debug!(peer = %self.peer, seq, attempt, "Client rejected event");
                last_error = ack
                    .error
                    .unwrap_or_else(|| String::from("client reported failure"));
                continue;
            }

            debug!(peer = %self.peer, seq, event = %event.name, "Event delivered");
            return Outcome::Delivered;
        }

        Outcome::Aborted(SessionEnd::DeliveryFailed {
            seq,
            reason: last_error,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
