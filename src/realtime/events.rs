use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::session::SessionConfig;

/// Events sent to the upstream realtime session.
///
/// Only the two kinds the relay actually produces are modeled: the one-time
/// configuration request and the audio append used by the inbound relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// One audio frame, base64-encoded PCM. Each append grows the upstream
    /// input buffer; commit/turn handling is owned by upstream VAD.
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },
}

/// Events received from the upstream realtime session, keyed by event kind.
///
/// Kind-specific fields the relay inspects are modeled explicitly; everything
/// else is preserved through the flattened `extra` map so a forwarded event
/// reaches the client byte-equivalent in content. Kinds the relay has no
/// business knowing about land in the untagged `Other` variant verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum UpstreamEvent {
    #[serde(rename = "session.created")]
    SessionCreated {
        session: Value,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    #[serde(rename = "session.updated")]
    SessionUpdated {
        session: Value,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(skip_serializing_if = "Option::is_none")]
        audio_start_ms: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        item_id: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(skip_serializing_if = "Option::is_none")]
        audio_end_ms: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        item_id: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    #[serde(rename = "input_audio_buffer.committed")]
    BufferCommitted {
        #[serde(skip_serializing_if = "Option::is_none")]
        item_id: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    #[serde(rename = "conversation.item.created")]
    ItemCreated {
        item: Value,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    InputTranscriptionDelta {
        delta: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        item_id: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted {
        transcript: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        item_id: Option<String>,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.failed")]
    InputTranscriptionFailed {
        error: Value,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    #[serde(rename = "response.created")]
    ResponseCreated {
        response: Value,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    #[serde(rename = "response.done")]
    ResponseDone {
        response: Value,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    #[serde(rename = "response.audio_transcript.delta")]
    ResponseTranscriptDelta {
        delta: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    #[serde(rename = "response.audio_transcript.done")]
    ResponseTranscriptDone {
        transcript: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    #[serde(rename = "error")]
    Error {
        error: Value,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },

    /// Any event kind not modeled above, carried as raw JSON.
    #[serde(untagged)]
    Other(Value),
}

impl UpstreamEvent {
    /// The wire `type` of this event, for logging and filter decisions.
    pub fn kind(&self) -> &str {
        match self {
            Self::SessionCreated { .. } => "session.created",
            Self::SessionUpdated { .. } => "session.updated",
            Self::SpeechStarted { .. } => "input_audio_buffer.speech_started",
            Self::SpeechStopped { .. } => "input_audio_buffer.speech_stopped",
            Self::BufferCommitted { .. } => "input_audio_buffer.committed",
            Self::ItemCreated { .. } => "conversation.item.created",
            Self::InputTranscriptionDelta { .. } => {
                "conversation.item.input_audio_transcription.delta"
            }
            Self::InputTranscriptionCompleted { .. } => {
                "conversation.item.input_audio_transcription.completed"
            }
            Self::InputTranscriptionFailed { .. } => {
                "conversation.item.input_audio_transcription.failed"
            }
            Self::ResponseCreated { .. } => "response.created",
            Self::ResponseDone { .. } => "response.done",
            Self::ResponseTranscriptDelta { .. } => "response.audio_transcript.delta",
            Self::ResponseTranscriptDone { .. } => "response.audio_transcript.done",
            Self::Error { .. } => "error",
            Self::Other(value) => value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("unknown"),
        }
    }

    /// True for `session.created`, the acknowledgment the negotiator waits for.
    pub fn is_session_ack(&self) -> bool {
        matches!(self, Self::SessionCreated { .. })
    }
}

/// The fatal-error envelope sent to the client at most once, right before
/// the connection closes.
pub fn error_envelope(message: &str) -> String {
    serde_json::json!({
        "type": "error",
        "error": { "message": message },
    })
    .to_string()
}
