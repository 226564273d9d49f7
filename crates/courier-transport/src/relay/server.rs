//! Relay endpoint on top of axum WebSockets.

use std::error::Error as StdError;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use tokio::time::Instant;
use tracing::{info, trace};

use super::frame::RelayFrame;
use super::session::{FrameTransport, RelayError, RelayResult, RelaySession};
use crate::state::AppState;

/// Frames carried as WebSocket text messages.
pub struct WsFrameTransport {
    socket: WebSocket,
}

impl WsFrameTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl FrameTransport for WsFrameTransport {
    async fn write_frame(&mut self, frame: &RelayFrame) -> RelayResult<()> {
        let text = frame.encode()?;
        self.socket
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| classify(&e))
    }

    async fn read_frame(&mut self, timeout: Option<Duration>) -> RelayResult<RelayFrame> {
        let deadline = timeout.map(|limit| (Instant::now() + limit, limit));
        loop {
            let next = match deadline {
                Some((at, limit)) => tokio::time::timeout_at(at, self.socket.recv())
                    .await
                    .map_err(|_| RelayError::Timeout(limit))?,
                None => self.socket.recv().await,
            };
            match next {
                None | Some(Ok(Message::Close(_))) => return Err(RelayError::Closed),
                Some(Err(e)) => return Err(classify(&e)),
                Some(Ok(Message::Text(text))) => return Ok(RelayFrame::decode(text.as_str())?),
                Some(Ok(Message::Binary(data))) => return Ok(serde_json::from_slice(&data)?),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => trace!("Relay keep-alive"),
            }
        }
    }
}

/// Maps a socket error to [`RelayError::Closed`] when the connection is gone.
fn classify(error: &axum::Error) -> RelayError {
    let mut source: Option<&(dyn StdError + 'static)> = error.source();
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<io::Error>()
            && matches!(
                io.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::UnexpectedEof
            )
        {
            return RelayError::Closed;
        }
        source = err.source();
    }
    let text = error.to_string();
    if text.contains("closed") || text.contains("Closed") {
        RelayError::Closed
    } else {
        RelayError::Transport(text)
    }
}

fn peer_label(headers: &HeaderMap, addr: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| addr.to_string())
}

/// `GET /api/websocket`: upgrades and runs a relay session.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let peer = peer_label(&headers, addr);
    info!(peer = %peer, "Relay client trying to connect");

    ws.on_upgrade(move |socket| async move {
        let session = RelaySession::new(WsFrameTransport::new(socket), state.robot, state.relay)
            .with_peer(peer);
        session.run().await;
    })
}
