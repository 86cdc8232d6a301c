use serde::{Deserialize, Serialize};

use super::events::UpstreamEvent;

/// Turn-detection parameters for upstream voice-activity detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnDetection {
    /// Detection strategy (currently always "server_vad")
    #[serde(rename = "type")]
    pub kind: String,

    /// Activation sensitivity (0.0 to 1.0)
    pub threshold: f32,

    /// Audio retained before detected speech onset
    pub prefix_padding_ms: u32,

    /// Trailing silence required to mark speech end
    pub silence_duration_ms: u32,

    /// Whether upstream auto-generates a reply after each turn
    pub create_response: bool,
}

/// Transcription model selection for inbound audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputTranscription {
    pub model: String,
}

/// Immutable description of one upstream session.
///
/// Constructed once per client connection, serialized into the single
/// `session.update` request the negotiator sends, and never touched again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Output channels: `["text"]` or `["text", "audio"]`
    pub modalities: Vec<String>,

    /// System-level behavioral directive for the upstream model
    pub instructions: String,

    /// Synthesized voice, only meaningful with audio output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Sample encoding of client audio (e.g. "pcm16")
    pub input_audio_format: String,

    /// Sample encoding of synthesized audio
    pub output_audio_format: String,

    /// Which transcription model processes inbound audio
    pub input_audio_transcription: InputTranscription,

    /// Voice-activity detection parameters
    pub turn_detection: TurnDetection,
}

/// Defaults shared by both profiles; callers override via `RealtimeSettings`
/// in the application config.
#[derive(Debug, Clone)]
pub struct SessionDefaults {
    pub instructions: String,
    pub voice: String,
    pub transcription_model: String,
    pub vad_threshold: f32,
    pub vad_prefix_padding_ms: u32,
    pub vad_silence_duration_ms: u32,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            instructions:
                "You are a helpful transcription assistant. Transcribe all speech accurately."
                    .to_string(),
            voice: "alloy".to_string(),
            transcription_model: "whisper-1".to_string(),
            vad_threshold: 0.5,
            vad_prefix_padding_ms: 300,
            vad_silence_duration_ms: 500,
        }
    }
}

impl SessionConfig {
    /// Full-duplex profile: text + audio output, voice enabled, upstream
    /// auto-responds after each detected turn.
    pub fn full(defaults: &SessionDefaults) -> Self {
        Self {
            modalities: vec!["text".to_string(), "audio".to_string()],
            instructions: defaults.instructions.clone(),
            voice: Some(defaults.voice.clone()),
            input_audio_format: "pcm16".to_string(),
            output_audio_format: "pcm16".to_string(),
            input_audio_transcription: InputTranscription {
                model: defaults.transcription_model.clone(),
            },
            turn_detection: TurnDetection {
                kind: "server_vad".to_string(),
                threshold: defaults.vad_threshold,
                prefix_padding_ms: defaults.vad_prefix_padding_ms,
                silence_duration_ms: defaults.vad_silence_duration_ms,
                create_response: true,
            },
        }
    }

    /// Transcription-only profile: text output, no auto-response, so the
    /// upstream never emits synthesized replies.
    pub fn transcription_only(defaults: &SessionDefaults) -> Self {
        Self {
            modalities: vec!["text".to_string()],
            voice: None,
            turn_detection: TurnDetection {
                create_response: false,
                ..Self::full(defaults).turn_detection
            },
            ..Self::full(defaults)
        }
    }
}

/// Which upstream events the outbound relay forwards to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    /// Forward every event kind verbatim, recognized or not.
    Full,

    /// Forward only session lifecycle, speech activity, transcription, and
    /// error events. Response/content-generation events would leak
    /// synthesized-assistant output the client never asked for.
    TranscriptionOnly,
}

impl RelayMode {
    /// The filter predicate applied by the outbound relay.
    pub fn forwards(&self, event: &UpstreamEvent) -> bool {
        match self {
            RelayMode::Full => true,
            RelayMode::TranscriptionOnly => matches!(
                event,
                UpstreamEvent::SessionCreated { .. }
                    | UpstreamEvent::SessionUpdated { .. }
                    | UpstreamEvent::SpeechStarted { .. }
                    | UpstreamEvent::SpeechStopped { .. }
                    | UpstreamEvent::BufferCommitted { .. }
                    | UpstreamEvent::InputTranscriptionDelta { .. }
                    | UpstreamEvent::InputTranscriptionCompleted { .. }
                    | UpstreamEvent::InputTranscriptionFailed { .. }
                    | UpstreamEvent::Error { .. }
            ),
        }
    }

    /// The session profile matching this mode.
    pub fn session_config(&self, defaults: &SessionDefaults) -> SessionConfig {
        match self {
            RelayMode::Full => SessionConfig::full(defaults),
            RelayMode::TranscriptionOnly => SessionConfig::transcription_only(defaults),
        }
    }
}
