//! The two forwarding loops of one relay session.
//!
//! Inbound: client audio frames -> base64 -> `input_audio_buffer.append`.
//! Outbound: upstream events -> mode filter -> JSON text to the client.
//!
//! Both loops observe the cancellation token at every suspension point (the
//! receive and the send), so the coordinator's shutdown signal takes effect
//! within one boundary instead of waiting for the next loop iteration. Each
//! loop returns the connection half it owns so the coordinator can close it
//! exactly once.

use base64::Engine;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::error::{RelayEnd, RelayResult};
use super::events::{ClientEvent, UpstreamEvent};
use super::session::RelayMode;
use super::transport::{AudioFrameSource, EventTextSink, UpstreamSink, UpstreamSource};

/// Client -> upstream audio path. Pure pass-through: one frame in flight,
/// order and boundaries preserved.
pub async fn run_inbound(
    mut frames: Box<dyn AudioFrameSource>,
    mut upstream: Box<dyn UpstreamSink>,
    cancel: CancellationToken,
) -> (Box<dyn UpstreamSink>, RelayResult) {
    let mut forwarded: u64 = 0;

    let result = loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(RelayEnd::Cancelled),
            frame = frames.next_frame() => frame,
        };

        let frame = match frame {
            Ok(Some(frame)) => frame,
            Ok(None) => break Ok(RelayEnd::ClientDisconnected),
            Err(e) => break Err(e),
        };

        let audio = base64::engine::general_purpose::STANDARD.encode(&frame);
        let event = ClientEvent::InputAudioBufferAppend { audio };

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(RelayEnd::Cancelled),
            sent = upstream.send(event) => sent,
        };
        if let Err(e) = sent {
            break Err(e);
        }

        forwarded += 1;
        if forwarded % 100 == 0 {
            debug!(forwarded, "audio frames forwarded upstream");
        }
    };

    debug!(forwarded, outcome = ?result, "inbound relay finished");
    (upstream, result)
}

/// Upstream -> client event path with mode-dependent filtering.
///
/// `pending` holds events the negotiator observed before streaming started;
/// they are delivered first so arrival order survives negotiation.
pub async fn run_outbound(
    mut events: Box<dyn UpstreamSource>,
    mut client: Box<dyn EventTextSink>,
    mode: RelayMode,
    pending: Vec<UpstreamEvent>,
    cancel: CancellationToken,
) -> (Box<dyn EventTextSink>, RelayResult) {
    let mut queued = pending.into_iter();

    let result = loop {
        let event = match queued.next() {
            Some(event) => event,
            None => {
                let text = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break Ok(RelayEnd::Cancelled),
                    text = events.next_event() => text,
                };

                let text = match text {
                    Ok(Some(text)) => text,
                    Ok(None) => break Ok(RelayEnd::UpstreamEnded),
                    Err(e) => break Err(e),
                };

                // One malformed payload must not kill the stream: skip it
                // and keep relaying.
                match serde_json::from_str::<UpstreamEvent>(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("skipping unparseable upstream event: {e}");
                        continue;
                    }
                }
            }
        };

        if !mode.forwards(&event) {
            trace!(kind = event.kind(), "event dropped by filter");
            continue;
        }

        let json = match serde_json::to_string(&event) {
            Ok(json) => json,
            Err(e) => {
                warn!(kind = event.kind(), "failed to serialize event: {e}");
                continue;
            }
        };

        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(RelayEnd::Cancelled),
            sent = client.send_text(json) => sent,
        };
        if let Err(e) = sent {
            break Err(e);
        }
    };

    debug!(outcome = ?result, "outbound relay finished");
    (client, result)
}
