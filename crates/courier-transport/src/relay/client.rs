//! Relay client for out-of-process observers.
//!
//! ```rust,ignore
//! let mut client = RelayClient::connect("ws://127.0.0.1:8080/api/websocket", "s3cret").await?;
//! while let Ok(event) = client.next_event().await {
//!     println!("{} {}", event.name, event.envelope.message);
//! }
//! ```

use std::io;

use courier_core::LifecycleEvent;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use super::frame::{FrameStatus, RelayFrame};
use super::session::{RelayError, RelayResult};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An authenticated relay connection.
pub struct RelayClient {
    stream: WsStream,
}

impl RelayClient {
    /// Connects to `url` and performs the handshake with `token`.
    pub async fn connect(url: &str, token: &str) -> RelayResult<Self> {
        info!(url = %url, "Connecting to relay");
        let (stream, _response) = connect_async(url).await.map_err(classify)?;
        let mut client = Self { stream };

        client.send(&RelayFrame::handshake(token)).await?;
        let reply = client.next_frame().await?;
        if reply.is_fail() || reply.seq_reply != 1 {
            return Err(RelayError::Rejected(
                reply.error.unwrap_or_else(|| String::from("unexpected handshake reply")),
            ));
        }
        debug!(url = %url, "Relay handshake accepted");
        Ok(client)
    }

    /// Waits for the next event and acknowledges it.
    ///
    /// A failure notice from the server surfaces as [`RelayError::Mismatch`];
    /// the connection stays usable.
    pub async fn next_event(&mut self) -> RelayResult<LifecycleEvent> {
        let frame = self.next_frame().await?;
        match frame.event {
            Some(event) => {
                self.acknowledge(frame.seq, FrameStatus::Ok).await?;
                Ok(event)
            }
            None if frame.is_fail() => {
                let reason = frame.error.unwrap_or_default();
                warn!(seq_reply = frame.seq_reply, reason = %reason, "Relay server reported a failure");
                Err(RelayError::Mismatch(reason))
            }
            None => Err(RelayError::Transport(String::from(
                "frame carries no event",
            ))),
        }
    }

    /// Reads the next frame without acknowledging anything.
    pub async fn next_frame(&mut self) -> RelayResult<RelayFrame> {
        loop {
            match self.stream.next().await {
                None | Some(Ok(Message::Close(_))) => return Err(RelayError::Closed),
                Some(Err(e)) => return Err(classify(e)),
                Some(Ok(Message::Text(text))) => return Ok(RelayFrame::decode(text.as_str())?),
                Some(Ok(Message::Binary(data))) => return Ok(serde_json::from_slice(&data)?),
                Some(Ok(other)) => trace!(kind = ?other, "Ignoring control message"),
            }
        }
    }

    /// Acknowledges frame `seq` with `status`.
    pub async fn acknowledge(&mut self, seq: u64, status: FrameStatus) -> RelayResult<()> {
        self.send(&RelayFrame::ack(seq, status)).await
    }

    /// Writes a raw frame.
    pub async fn send(&mut self, frame: &RelayFrame) -> RelayResult<()> {
        let text = frame.encode()?;
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(classify)
    }

    /// Closes the connection.
    pub async fn close(mut self) -> RelayResult<()> {
        self.stream.close(None).await.map_err(classify)
    }
}

fn classify(error: WsError) -> RelayError {
    match error {
        WsError::ConnectionClosed | WsError::AlreadyClosed => RelayError::Closed,
        WsError::Io(e)
            if matches!(
                e.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::UnexpectedEof
            ) =>
        {
            RelayError::Closed
        }
        other => RelayError::Transport(other.to_string()),
    }
}
