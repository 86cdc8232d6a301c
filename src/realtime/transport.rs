//! Transport seams between the relay core and the real connections.
//!
//! The relays and the coordinator only ever see these traits. The axum
//! WebSocket (client side) and the tungstenite WebSocket (upstream side)
//! each implement the half they own; tests substitute channel-backed mocks.

use async_trait::async_trait;
use axum::extract::ws;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::error::RelayError;
use super::events::{ClientEvent, UpstreamEvent};
use super::session::SessionConfig;

/// Client read half: yields raw audio frames in receipt order.
///
/// `Ok(None)` means the client disconnected cleanly; an `Err` means the
/// connection failed mid-stream.
#[async_trait]
pub trait AudioFrameSource: Send {
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, RelayError>;
}

/// Client write half: delivers one JSON text message per upstream event.
#[async_trait]
pub trait EventTextSink: Send {
    async fn send_text(&mut self, text: String) -> Result<(), RelayError>;

    /// Close the client connection. Closing twice is a no-op, never an error.
    async fn close(&mut self) -> Result<(), RelayError>;
}

/// Upstream write half, owned exclusively by the inbound relay.
#[async_trait]
pub trait UpstreamSink: Send {
    async fn send(&mut self, event: ClientEvent) -> Result<(), RelayError>;

    /// Close the upstream connection. Idempotent like [`EventTextSink::close`].
    async fn close(&mut self) -> Result<(), RelayError>;
}

/// Upstream read half, owned exclusively by the outbound relay.
///
/// Yields raw event text; `Ok(None)` means the upstream stream ended.
#[async_trait]
pub trait UpstreamSource: Send {
    async fn next_event(&mut self) -> Result<Option<String>, RelayError>;
}

/// A fully negotiated upstream session, ready for streaming.
pub struct NegotiatedUpstream {
    pub sink: Box<dyn UpstreamSink>,
    pub source: Box<dyn UpstreamSource>,

    /// Events observed while waiting for the session acknowledgment, in
    /// arrival order. The outbound relay delivers these before reading from
    /// the source so nothing is swallowed by negotiation.
    pub pending: Vec<UpstreamEvent>,
}

/// The negotiation seam: opens and configures an upstream session.
#[async_trait]
pub trait UpstreamConnector: Send + Sync {
    async fn connect(&self, config: &SessionConfig) -> Result<NegotiatedUpstream, RelayError>;
}

// ============================================================================
// Client connection (axum WebSocket)
// ============================================================================

/// Read half of the client WebSocket.
pub struct WsFrameSource {
    stream: SplitStream<ws::WebSocket>,
}

/// Write half of the client WebSocket.
pub struct WsTextSink {
    sink: SplitSink<ws::WebSocket, ws::Message>,
    closed: bool,
}

/// Split a client WebSocket into the two relay-owned halves.
pub fn split_client(socket: ws::WebSocket) -> (WsFrameSource, WsTextSink) {
    let (sink, stream) = socket.split();
    (
        WsFrameSource { stream },
        WsTextSink {
            sink,
            closed: false,
        },
    )
}

#[async_trait]
impl AudioFrameSource for WsFrameSource {
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, RelayError> {
        while let Some(msg) = self.stream.next().await {
            match msg {
                Ok(ws::Message::Binary(data)) => return Ok(Some(data)),
                Ok(ws::Message::Close(_)) => return Ok(None),
                // Text/ping/pong frames carry no audio; skip them.
                Ok(_) => continue,
                Err(e) => return Err(RelayError::Transport(e.to_string())),
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl EventTextSink for WsTextSink {
    async fn send_text(&mut self, text: String) -> Result<(), RelayError> {
        self.sink
            .send(ws::Message::Text(text))
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), RelayError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        // The peer may already be gone; a failed close frame is not an error.
        let _ = self.sink.send(ws::Message::Close(None)).await;
        Ok(())
    }
}

// ============================================================================
// Upstream connection (tokio-tungstenite)
// ============================================================================

pub type UpstreamWebSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Write half of the upstream WebSocket.
pub struct WsUpstreamSink {
    sink: SplitSink<UpstreamWebSocket, TungsteniteMessage>,
    closed: bool,
}

/// Read half of the upstream WebSocket.
pub struct WsUpstreamSource {
    stream: SplitStream<UpstreamWebSocket>,
}

/// Split an upstream WebSocket into the two relay-owned halves.
pub fn split_upstream(socket: UpstreamWebSocket) -> (WsUpstreamSink, WsUpstreamSource) {
    let (sink, stream) = socket.split();
    (
        WsUpstreamSink {
            sink,
            closed: false,
        },
        WsUpstreamSource { stream },
    )
}

#[async_trait]
impl UpstreamSink for WsUpstreamSink {
    async fn send(&mut self, event: ClientEvent) -> Result<(), RelayError> {
        let json =
            serde_json::to_string(&event).map_err(|e| RelayError::Transport(e.to_string()))?;
        self.sink
            .send(TungsteniteMessage::Text(json))
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), RelayError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let _ = self.sink.send(TungsteniteMessage::Close(None)).await;
        Ok(())
    }
}

#[async_trait]
impl UpstreamSource for WsUpstreamSource {
    async fn next_event(&mut self) -> Result<Option<String>, RelayError> {
        while let Some(msg) = self.stream.next().await {
            match msg {
                Ok(TungsteniteMessage::Text(text)) => return Ok(Some(text)),
                Ok(TungsteniteMessage::Close(_)) => return Ok(None),
                // Pongs are handled by the write half; binary is not part of
                // the event protocol.
                Ok(_) => continue,
                Err(e) => return Err(RelayError::Transport(e.to_string())),
            }
        }
        Ok(None)
    }
}
