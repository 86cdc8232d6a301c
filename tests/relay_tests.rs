// Integration tests for the duplex streaming relay.
//
// The relays and the coordinator only know the transport traits, so these
// tests drive whole sessions through channel-backed mocks: scripted client
// frames, scripted upstream events, and recording sinks on both ends.

use async_trait::async_trait;
use base64::Engine;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use voicebridge::realtime::{
    AudioFrameSource, ClientEvent, EventTextSink, NegotiatedUpstream, RelayCoordinator, RelayEnd,
    RelayError, RelayMode, SessionConfig, SessionDefaults, UpstreamConnector, UpstreamEvent,
    UpstreamSink, UpstreamSource,
};
use voicebridge::LifecycleState;

// ============================================================================
// Channel-backed mock transports
// ============================================================================

struct ChannelFrames(mpsc::Receiver<Vec<u8>>);

#[async_trait]
impl AudioFrameSource for ChannelFrames {
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, RelayError> {
        Ok(self.0.recv().await)
    }
}

struct RecordingUpstreamSink {
    events: Arc<Mutex<Vec<ClientEvent>>>,
    closes: Arc<AtomicUsize>,
    fail_sends: bool,
}

#[async_trait]
impl UpstreamSink for RecordingUpstreamSink {
    async fn send(&mut self, event: ClientEvent) -> Result<(), RelayError> {
        if self.fail_sends {
            return Err(RelayError::Transport("upstream send refused".to_string()));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RelayError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct ChannelEvents(mpsc::Receiver<String>);

#[async_trait]
impl UpstreamSource for ChannelEvents {
    async fn next_event(&mut self) -> Result<Option<String>, RelayError> {
        Ok(self.0.recv().await)
    }
}

struct RecordingClientSink {
    sent: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
    fail_sends: bool,
}

#[async_trait]
impl EventTextSink for RecordingClientSink {
    async fn send_text(&mut self, text: String) -> Result<(), RelayError> {
        if self.fail_sends {
            return Err(RelayError::Transport("client send refused".to_string()));
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RelayError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockConnector {
    upstream: tokio::sync::Mutex<Option<NegotiatedUpstream>>,
    refuse: bool,
}

#[async_trait]
impl UpstreamConnector for MockConnector {
    async fn connect(&self, _config: &SessionConfig) -> Result<NegotiatedUpstream, RelayError> {
        if self.refuse {
            return Err(RelayError::HandshakeTimeout);
        }
        Ok(self
            .upstream
            .lock()
            .await
            .take()
            .expect("connector used once per session"))
    }
}

// ============================================================================
// Test harness
// ============================================================================

struct Harness {
    frames_tx: mpsc::Sender<Vec<u8>>,
    events_tx: mpsc::Sender<String>,
    upstream_events: Arc<Mutex<Vec<ClientEvent>>>,
    upstream_closes: Arc<AtomicUsize>,
    client_sent: Arc<Mutex<Vec<String>>>,
    client_closes: Arc<AtomicUsize>,
    connector: MockConnector,
    frames: Box<dyn AudioFrameSource>,
    client_sink: Box<dyn EventTextSink>,
}

fn harness(pending: Vec<UpstreamEvent>, client_fails: bool, upstream_fails: bool) -> Harness {
    let (frames_tx, frames_rx) = mpsc::channel(64);
    let (events_tx, events_rx) = mpsc::channel(64);

    let upstream_events = Arc::new(Mutex::new(Vec::new()));
    let upstream_closes = Arc::new(AtomicUsize::new(0));
    let client_sent = Arc::new(Mutex::new(Vec::new()));
    let client_closes = Arc::new(AtomicUsize::new(0));

    let negotiated = NegotiatedUpstream {
        sink: Box::new(RecordingUpstreamSink {
            events: upstream_events.clone(),
            closes: upstream_closes.clone(),
            fail_sends: upstream_fails,
        }),
        source: Box::new(ChannelEvents(events_rx)),
        pending,
    };

    Harness {
        frames_tx,
        events_tx,
        upstream_events,
        upstream_closes,
        client_sent: client_sent.clone(),
        client_closes: client_closes.clone(),
        connector: MockConnector {
            upstream: tokio::sync::Mutex::new(Some(negotiated)),
            refuse: false,
        },
        frames: Box::new(ChannelFrames(frames_rx)),
        client_sink: Box::new(RecordingClientSink {
            sent: client_sent.clone(),
            closes: client_closes.clone(),
            fail_sends: client_fails,
        }),
    }
}

fn coordinator(mode: RelayMode) -> RelayCoordinator {
    let session = mode.session_config(&SessionDefaults::default());
    RelayCoordinator::new(mode, session)
}

fn event_types(messages: &[String]) -> Vec<String> {
    messages
        .iter()
        .map(|m| {
            let v: Value = serde_json::from_str(m).expect("client messages are well-formed JSON");
            v["type"].as_str().expect("every message has a type").to_string()
        })
        .collect()
}

// ============================================================================
// Scenarios
// ============================================================================

/// Scenario A: three frames then disconnect before any upstream event.
#[tokio::test]
async fn test_client_frames_forwarded_in_order_then_clean_close() {
    let h = harness(Vec::new(), false, false);
    let mut coordinator = coordinator(RelayMode::Full);

    for i in 0..3u8 {
        h.frames_tx.send(vec![i, i, i]).await.unwrap();
    }
    drop(h.frames_tx); // client disconnects
    let _events_tx = h.events_tx; // upstream stays open until cancelled

    let outcome = coordinator
        .run(h.frames, h.client_sink, &h.connector)
        .await
        .unwrap();

    assert!(matches!(outcome.inbound, Ok(RelayEnd::ClientDisconnected)));
    assert!(matches!(outcome.outbound, Ok(RelayEnd::Cancelled)));
    assert_eq!(coordinator.state(), LifecycleState::Closed);

    // Outbound never sent anything.
    assert!(h.client_sent.lock().unwrap().is_empty());

    // All three frames reached upstream, in order, byte-for-byte.
    let events = h.upstream_events.lock().unwrap();
    assert_eq!(events.len(), 3);
    for (i, event) in events.iter().enumerate() {
        match event {
            ClientEvent::InputAudioBufferAppend { audio } => {
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(audio)
                    .unwrap();
                assert_eq!(decoded, vec![i as u8; 3]);
            }
            other => panic!("unexpected upstream event: {other:?}"),
        }
    }

    // Both connections closed exactly once.
    assert_eq!(h.client_closes.load(Ordering::SeqCst), 1);
    assert_eq!(h.upstream_closes.load(Ordering::SeqCst), 1);
}

/// Scenario B: transcription-only mode forwards the full lifecycle +
/// transcript sequence, in order, nothing dropped.
#[tokio::test]
async fn test_transcription_mode_forwards_lifecycle_and_transcripts() {
    let h = harness(Vec::new(), false, false);
    let mut coordinator = coordinator(RelayMode::TranscriptionOnly);

    let sequence = [
        r#"{"type":"session.created","session":{"id":"sess_1"}}"#,
        r#"{"type":"session.updated","session":{"id":"sess_1"}}"#,
        r#"{"type":"conversation.item.input_audio_transcription.delta","delta":"hel"}"#,
        r#"{"type":"conversation.item.input_audio_transcription.delta","delta":"lo"}"#,
        r#"{"type":"conversation.item.input_audio_transcription.completed","transcript":"hello"}"#,
    ];
    for text in sequence {
        h.events_tx.send(text.to_string()).await.unwrap();
    }
    drop(h.events_tx); // upstream stream ends
    let _frames_tx = h.frames_tx; // client stays connected until cancelled

    let outcome = coordinator
        .run(h.frames, h.client_sink, &h.connector)
        .await
        .unwrap();

    assert!(matches!(outcome.outbound, Ok(RelayEnd::UpstreamEnded)));
    assert!(matches!(outcome.inbound, Ok(RelayEnd::Cancelled)));

    let sent = h.client_sent.lock().unwrap();
    assert_eq!(
        event_types(&sent),
        vec![
            "session.created",
            "session.updated",
            "conversation.item.input_audio_transcription.delta",
            "conversation.item.input_audio_transcription.delta",
            "conversation.item.input_audio_transcription.completed",
        ]
    );

    // Delta payloads survive forwarding.
    let first_delta: Value = serde_json::from_str(&sent[2]).unwrap();
    assert_eq!(first_delta["delta"], "hel");
}

/// Scenario C: response events are silently filtered in transcription-only
/// mode, and later events still flow.
#[tokio::test]
async fn test_transcription_mode_drops_response_events() {
    let h = harness(Vec::new(), false, false);
    let mut coordinator = coordinator(RelayMode::TranscriptionOnly);

    h.events_tx
        .send(r#"{"type":"response.created","response":{"id":"resp_1"}}"#.to_string())
        .await
        .unwrap();
    h.events_tx
        .send(
            r#"{"type":"conversation.item.input_audio_transcription.delta","delta":"hi"}"#
                .to_string(),
        )
        .await
        .unwrap();
    drop(h.events_tx);
    let _frames_tx = h.frames_tx;

    coordinator
        .run(h.frames, h.client_sink, &h.connector)
        .await
        .unwrap();

    let sent = h.client_sent.lock().unwrap();
    assert_eq!(
        event_types(&sent),
        vec!["conversation.item.input_audio_transcription.delta"]
    );
}

/// Full mode forwards response events and unrecognized kinds verbatim.
#[tokio::test]
async fn test_full_mode_forwards_everything() {
    let h = harness(Vec::new(), false, false);
    let mut coordinator = coordinator(RelayMode::Full);

    h.events_tx
        .send(r#"{"type":"response.created","response":{"id":"resp_1"}}"#.to_string())
        .await
        .unwrap();
    h.events_tx
        .send(r#"{"type":"rate_limits.updated","rate_limits":[]}"#.to_string())
        .await
        .unwrap();
    drop(h.events_tx);
    let _frames_tx = h.frames_tx;

    coordinator
        .run(h.frames, h.client_sink, &h.connector)
        .await
        .unwrap();

    let sent = h.client_sent.lock().unwrap();
    assert_eq!(
        event_types(&sent),
        vec!["response.created", "rate_limits.updated"]
    );
}

/// Scenario D: negotiation failure means one error envelope, a closed
/// client connection, and no relay activity at all.
#[tokio::test]
async fn test_handshake_failure_sends_one_error_envelope_and_closes() {
    let h = harness(Vec::new(), false, false);
    let connector = MockConnector {
        upstream: tokio::sync::Mutex::new(None),
        refuse: true,
    };
    let mut coordinator = coordinator(RelayMode::Full);

    let result = coordinator.run(h.frames, h.client_sink, &connector).await;

    assert!(matches!(result, Err(RelayError::HandshakeTimeout)));
    assert_eq!(coordinator.state(), LifecycleState::Closed);

    let sent = h.client_sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let envelope: Value = serde_json::from_str(&sent[0]).unwrap();
    assert_eq!(envelope["type"], "error");
    assert!(envelope["error"]["message"].as_str().is_some());

    assert_eq!(h.client_closes.load(Ordering::SeqCst), 1);
    // No relay ever started, so nothing reached upstream.
    assert!(h.upstream_events.lock().unwrap().is_empty());
}

/// Scenario E: one unparseable upstream payload is skipped, the next event
/// is still delivered.
#[tokio::test]
async fn test_malformed_event_skipped_stream_continues() {
    let h = harness(Vec::new(), false, false);
    let mut coordinator = coordinator(RelayMode::Full);

    h.events_tx.send("{not json at all".to_string()).await.unwrap();
    h.events_tx
        .send(r#"{"type":"session.updated","session":{}}"#.to_string())
        .await
        .unwrap();
    drop(h.events_tx);
    let _frames_tx = h.frames_tx;

    let outcome = coordinator
        .run(h.frames, h.client_sink, &h.connector)
        .await
        .unwrap();

    assert!(matches!(outcome.outbound, Ok(RelayEnd::UpstreamEnded)));
    let sent = h.client_sent.lock().unwrap();
    assert_eq!(event_types(&sent), vec!["session.updated"]);
}

// ============================================================================
// Lifecycle properties
// ============================================================================

/// Events observed during negotiation are delivered before live events.
#[tokio::test]
async fn test_pending_negotiation_events_delivered_first() {
    let pending: Vec<UpstreamEvent> =
        vec![
            serde_json::from_str(r#"{"type":"session.created","session":{"id":"sess_1"}}"#)
                .unwrap(),
        ];
    let h = harness(pending, false, false);
    let mut coordinator = coordinator(RelayMode::TranscriptionOnly);

    h.events_tx
        .send(r#"{"type":"input_audio_buffer.speech_started","audio_start_ms":10}"#.to_string())
        .await
        .unwrap();
    drop(h.events_tx);
    let _frames_tx = h.frames_tx;

    coordinator
        .run(h.frames, h.client_sink, &h.connector)
        .await
        .unwrap();

    let sent = h.client_sent.lock().unwrap();
    assert_eq!(
        event_types(&sent),
        vec!["session.created", "input_audio_buffer.speech_started"]
    );
}

/// A transport failure on the client side cancels the inbound relay and
/// still tears everything down exactly once.
#[tokio::test]
async fn test_client_send_failure_cancels_other_relay() {
    let h = harness(Vec::new(), true, false);
    let mut coordinator = coordinator(RelayMode::Full);

    h.events_tx
        .send(r#"{"type":"session.updated","session":{}}"#.to_string())
        .await
        .unwrap();
    let _events_tx = h.events_tx;
    let _frames_tx = h.frames_tx;

    let outcome = coordinator
        .run(h.frames, h.client_sink, &h.connector)
        .await
        .unwrap();

    assert!(matches!(outcome.outbound, Err(RelayError::Transport(_))));
    assert!(matches!(outcome.inbound, Ok(RelayEnd::Cancelled)));
    assert_eq!(coordinator.state(), LifecycleState::Closed);
    assert_eq!(h.client_closes.load(Ordering::SeqCst), 1);
    assert_eq!(h.upstream_closes.load(Ordering::SeqCst), 1);
}

/// A transport failure on the upstream side surfaces exactly one error
/// envelope to the client before the close.
#[tokio::test]
async fn test_upstream_send_failure_notifies_client_once() {
    let h = harness(Vec::new(), false, true);
    let mut coordinator = coordinator(RelayMode::Full);

    h.frames_tx.send(vec![1, 2, 3]).await.unwrap();
    let _frames_tx = h.frames_tx;
    let _events_tx = h.events_tx;

    let outcome = coordinator
        .run(h.frames, h.client_sink, &h.connector)
        .await
        .unwrap();

    assert!(matches!(outcome.inbound, Err(RelayError::Transport(_))));
    assert!(matches!(outcome.outbound, Ok(RelayEnd::Cancelled)));

    let sent = h.client_sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let envelope: Value = serde_json::from_str(&sent[0]).unwrap();
    assert_eq!(envelope["type"], "error");

    assert_eq!(h.client_closes.load(Ordering::SeqCst), 1);
    assert_eq!(h.upstream_closes.load(Ordering::SeqCst), 1);
}

/// Order preservation across a longer frame burst.
#[tokio::test]
async fn test_many_frames_preserve_order_and_count() {
    let h = harness(Vec::new(), false, false);
    let mut coordinator = coordinator(RelayMode::Full);

    for i in 0..50u8 {
        h.frames_tx.send(vec![i]).await.unwrap();
    }
    drop(h.frames_tx);
    let _events_tx = h.events_tx;

    coordinator
        .run(h.frames, h.client_sink, &h.connector)
        .await
        .unwrap();

    let events = h.upstream_events.lock().unwrap();
    assert_eq!(events.len(), 50);
    for (i, event) in events.iter().enumerate() {
        let ClientEvent::InputAudioBufferAppend { audio } = event else {
            panic!("unexpected event kind");
        };
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(audio)
            .unwrap();
        assert_eq!(decoded, vec![i as u8]);
    }
}
