//! Session negotiation against the OpenAI Realtime API.
//!
//! Opens the upstream WebSocket, sends exactly one `session.update` derived
//! from the [`SessionConfig`], and succeeds only after observing the
//! `session.created` acknowledgment. No partial session is ever handed to
//! the relays: every failure here aborts before streaming starts.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::time::Duration;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info};

use super::error::RelayError;
use super::events::{ClientEvent, UpstreamEvent};
use super::session::SessionConfig;
use super::transport::{split_upstream, NegotiatedUpstream, UpstreamConnector};

const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";
const OPENAI_REALTIME_HOST: &str = "api.openai.com";

/// How long negotiation may wait for the session acknowledgment.
const NEGOTIATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Connector for the OpenAI Realtime API.
pub struct OpenAiConnector {
    api_key: String,
    model: String,
}

impl OpenAiConnector {
    pub fn new(api_key: String, model: String) -> Self {
        Self { api_key, model }
    }

    fn build_request(&self) -> Result<http::Request<()>, RelayError> {
        let url = format!("{}?model={}", OPENAI_REALTIME_URL, self.model);

        http::Request::builder()
            .uri(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", "realtime=v1")
            .header(
                "Sec-WebSocket-Key",
                tungstenite::handshake::client::generate_key(),
            )
            .header("Sec-WebSocket-Version", "13")
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Host", OPENAI_REALTIME_HOST)
            .body(())
            .map_err(|e| RelayError::Handshake(e.to_string()))
    }
}

#[async_trait]
impl UpstreamConnector for OpenAiConnector {
    async fn connect(&self, config: &SessionConfig) -> Result<NegotiatedUpstream, RelayError> {
        let request = self.build_request()?;

        let (mut socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RelayError::Handshake(e.to_string()))?;

        info!(model = %self.model, "connected to realtime API, configuring session");

        // The one and only configuration request for this session.
        let update = ClientEvent::SessionUpdate {
            session: config.clone(),
        };
        let json =
            serde_json::to_string(&update).map_err(|e| RelayError::Handshake(e.to_string()))?;
        socket
            .send(Message::Text(json))
            .await
            .map_err(|e| RelayError::Handshake(e.to_string()))?;

        // Wait for the acknowledgment, keeping every event we see so the
        // outbound relay can deliver them in arrival order.
        let pending = tokio::time::timeout(NEGOTIATION_TIMEOUT, await_session_ack(&mut socket))
            .await
            .map_err(|_| RelayError::HandshakeTimeout)??;

        debug!(
            buffered = pending.len(),
            "session acknowledged, handing connection to relays"
        );

        let (sink, source) = split_upstream(socket);
        Ok(NegotiatedUpstream {
            sink: Box::new(sink),
            source: Box::new(source),
            pending,
        })
    }
}

/// Read events until `session.created` arrives, returning everything seen
/// (acknowledgment included) in order.
async fn await_session_ack(
    socket: &mut super::transport::UpstreamWebSocket,
) -> Result<Vec<UpstreamEvent>, RelayError> {
    let mut pending = Vec::new();

    while let Some(msg) = socket.next().await {
        let text = match msg {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => {
                return Err(RelayError::Handshake(
                    "upstream closed during negotiation".to_string(),
                ));
            }
            Ok(_) => continue,
            Err(e) => return Err(RelayError::Handshake(e.to_string())),
        };

        let event: UpstreamEvent = serde_json::from_str(&text).map_err(|e| {
            RelayError::Handshake(format!("malformed event during negotiation: {e}"))
        })?;

        // An error before the acknowledgment means upstream rejected the
        // configuration.
        if let UpstreamEvent::Error { error, .. } = &event {
            return Err(RelayError::Handshake(error_detail(error)));
        }

        let acknowledged = event.is_session_ack();
        pending.push(event);

        if acknowledged {
            return Ok(pending);
        }
    }

    Err(RelayError::Handshake(
        "upstream ended before acknowledging session".to_string(),
    ))
}

fn error_detail(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("upstream rejected session configuration")
        .to_string()
}
