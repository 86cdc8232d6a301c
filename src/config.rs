use anyhow::Result;
use serde::Deserialize;

use crate::realtime::SessionDefaults;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub realtime: RealtimeSettings,
    #[serde(default)]
    pub limits: UploadLimits,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
    /// Directory of static frontend assets served at the root path
    pub static_dir: String,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct OpenAiConfig {
    /// Realtime speech model for the WebSocket relay
    pub realtime_model: String,
    /// Diarizing transcription model for file uploads
    pub transcription_model: String,
    /// Chat model used to summarize transcripts
    pub summary_model: String,
}

/// Session defaults for the realtime relay.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    pub instructions: String,
    pub voice: String,
    pub transcription_model: String,
    pub vad_threshold: f32,
    pub vad_prefix_padding_ms: u32,
    pub vad_silence_duration_ms: u32,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        let defaults = SessionDefaults::default();
        Self {
            instructions: defaults.instructions,
            voice: defaults.voice,
            transcription_model: defaults.transcription_model,
            vad_threshold: defaults.vad_threshold,
            vad_prefix_padding_ms: defaults.vad_prefix_padding_ms,
            vad_silence_duration_ms: defaults.vad_silence_duration_ms,
        }
    }
}

impl RealtimeSettings {
    pub fn session_defaults(&self) -> SessionDefaults {
        SessionDefaults {
            instructions: self.instructions.clone(),
            voice: self.voice.clone(),
            transcription_model: self.transcription_model.clone(),
            vad_threshold: self.vad_threshold,
            vad_prefix_padding_ms: self.vad_prefix_padding_ms,
            vad_silence_duration_ms: self.vad_silence_duration_ms,
        }
    }
}

/// Size bounds on uploaded audio files.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UploadLimits {
    pub min_bytes: usize,
    pub max_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            min_bytes: 1024,             // anything smaller is an empty recording
            max_bytes: 25 * 1024 * 1024, // API upload cap
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
