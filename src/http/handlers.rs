use super::state::AppState;
use crate::audio;
use crate::realtime::{split_client, OpenAiConnector, RelayCoordinator, RelayMode};
use crate::transcribe::{
    merge_similar_speakers, rename_speakers, unique_speakers, DiarizedSegment,
};
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        Multipart, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RealtimeQuery {
    /// "full" (default) or "transcription"
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
    pub speakers: Vec<DiarizedSegment>,
    pub words: Vec<Value>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub identified_speakers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker_mapping: Option<BTreeMap<String, String>>,
}

/// Soft-error shape for processing failures: the UI renders the `error`
/// field instead of a transcript.
#[derive(Debug, Serialize)]
pub struct TranscribeError {
    pub error: String,
    pub text: String,
    pub speakers: Vec<DiarizedSegment>,
    pub words: Vec<Value>,
    pub summary: String,
}

impl TranscribeError {
    fn new(error: String) -> Self {
        Self {
            error,
            text: String::new(),
            speakers: Vec::new(),
            words: Vec::new(),
            summary: String::new(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Supported upload formats and the MIME type sent upstream
fn supported_mime(extension: &str) -> Option<&'static str> {
    match extension {
        ".mp3" | ".mpeg" | ".mpga" => Some("audio/mpeg"),
        ".mp4" | ".m4a" => Some("audio/mp4"),
        ".wav" => Some("audio/wav"),
        ".webm" => Some("audio/webm"),
        _ => None,
    }
}

const SUPPORTED_EXTENSIONS: &str = ".mp3, .mp4, .mpeg, .mpga, .m4a, .wav, .webm";

// ============================================================================
// Handlers
// ============================================================================

/// GET /ws/realtime
/// Upgrade to a WebSocket and run the duplex relay for this connection
pub async fn ws_realtime(
    ws: WebSocketUpgrade,
    Query(query): Query<RealtimeQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let mode = match query.mode.as_deref() {
        Some("transcription") => RelayMode::TranscriptionOnly,
        _ => RelayMode::Full,
    };

    info!(?mode, "realtime WebSocket connection requested");

    ws.on_upgrade(move |socket| handle_realtime_socket(socket, state, mode))
}

async fn handle_realtime_socket(socket: WebSocket, state: AppState, mode: RelayMode) {
    let defaults = state.config.realtime.session_defaults();
    let session = mode.session_config(&defaults);
    let connector = OpenAiConnector::new(
        state.api_key.clone(),
        state.config.openai.realtime_model.clone(),
    );

    let (frames, sink) = split_client(socket);
    let mut coordinator = RelayCoordinator::new(mode, session);

    // The coordinator owns teardown; whatever happened, both connections
    // are closed by the time this returns.
    if let Err(e) = coordinator
        .run(Box::new(frames), Box::new(sink), &connector)
        .await
    {
        warn!("realtime session ended at negotiation: {e}");
    }
}

/// POST /transcribe
/// Batch transcription with speaker diarization, optional merging and
/// display-name mapping, and a generated summary
pub async fn transcribe(
    State(state): State<AppState>,
    multipart: Multipart,
) -> impl IntoResponse {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err((status, message)) => {
            return (status, Json(ErrorResponse { error: message })).into_response();
        }
    };

    // Bounds checks before anything expensive
    let limits = &state.config.limits;
    if upload.bytes.len() < limits.min_bytes {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "File is too small or empty. Please record at least 1 second of audio."
                    .to_string(),
            }),
        )
            .into_response();
    }
    if upload.bytes.len() > limits.max_bytes {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!(
                    "File too large: {:.2} MB (max {} MB)",
                    upload.bytes.len() as f64 / (1024.0 * 1024.0),
                    limits.max_bytes / (1024 * 1024)
                ),
            }),
        )
            .into_response();
    }

    info!(
        filename = %upload.filename,
        size_kb = upload.bytes.len() / 1024,
        merge = upload.merge_speakers,
        "transcription upload received"
    );

    // The transcription API mishandles some compressed containers; convert
    // those to WAV first. Decoding is CPU-bound, so keep it off the runtime.
    let (bytes, filename, mime) = if matches!(upload.extension.as_str(), ".mp3" | ".webm") {
        let ext = upload.extension.clone();
        let raw = upload.bytes.clone();
        match tokio::task::spawn_blocking(move || audio::convert_to_wav_16k_mono(raw, &ext)).await
        {
            Ok(Ok(wav)) => {
                let stem = upload
                    .filename
                    .rsplit_once('.')
                    .map(|(stem, _)| stem.to_string())
                    .unwrap_or_else(|| upload.filename.clone());
                (wav, format!("{stem}.wav"), "audio/wav")
            }
            Ok(Err(e)) => {
                warn!("upload conversion failed, sending original: {e}");
                (upload.bytes, upload.filename.clone(), upload.mime)
            }
            Err(e) => {
                error!("conversion task panicked: {e}");
                (upload.bytes, upload.filename.clone(), upload.mime)
            }
        }
    } else {
        (upload.bytes, upload.filename.clone(), upload.mime)
    };

    let transcription = match state
        .openai
        .transcribe(
            &filename,
            bytes,
            mime,
            &state.config.openai.transcription_model,
        )
        .await
    {
        Ok(t) => t,
        Err(e) => {
            error!("transcription failed: {e:#}");
            return (
                StatusCode::OK,
                Json(TranscribeError::new(e.to_string())),
            )
                .into_response();
        }
    };

    let mut speakers: Vec<DiarizedSegment> = transcription
        .segments
        .iter()
        .map(|s| DiarizedSegment {
            speaker: s.speaker.clone(),
            text: s.text.clone(),
            start_time: s.start,
            end_time: s.end,
        })
        .collect();

    if upload.merge_speakers {
        merge_similar_speakers(&mut speakers);
    }

    let speaker_mapping = if upload.speaker_names.is_empty() {
        None
    } else {
        Some(rename_speakers(&mut speakers, &upload.speaker_names))
    };

    let identified_speakers = unique_speakers(&speakers);
    info!(
        count = identified_speakers.len(),
        "final speakers: {}",
        identified_speakers.join(", ")
    );

    let prompt = if identified_speakers.len() > 1 {
        format!(
            "Summarize this conversation between {}:\n\n{}",
            identified_speakers.join(", "),
            transcription.text
        )
    } else {
        format!(
            "Provide a concise summary of this transcription:\n\n{}",
            transcription.text
        )
    };

    let summary = match state
        .openai
        .summarize(&prompt, &state.config.openai.summary_model)
        .await
    {
        Ok(summary) => summary,
        Err(e) => {
            warn!("summary generation failed: {e:#}");
            String::new()
        }
    };

    (
        StatusCode::OK,
        Json(TranscribeResponse {
            text: transcription.text,
            speakers,
            words: Vec::new(),
            summary,
            duration: transcription.duration,
            identified_speakers,
            speaker_mapping,
        }),
    )
        .into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "service": state.config.service.name,
        })),
    )
}

// ============================================================================
// Multipart parsing
// ============================================================================

struct Upload {
    filename: String,
    extension: String,
    mime: &'static str,
    bytes: Vec<u8>,
    merge_speakers: bool,
    speaker_names: Vec<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, (StatusCode, String)> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut merge_speakers = true;
    let mut speaker_names = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid multipart body: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read file: {e}")))?;
                file = Some((filename, bytes.to_vec()));
            }
            "merge_speakers" => {
                let value = field.text().await.unwrap_or_default();
                merge_speakers = value.eq_ignore_ascii_case("true");
            }
            "speaker_names" => {
                let value = field.text().await.unwrap_or_default();
                speaker_names = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or((StatusCode::BAD_REQUEST, "Missing file field".to_string()))?;

    let extension = filename
        .rfind('.')
        .map(|i| filename[i..].to_ascii_lowercase())
        .unwrap_or_default();

    let mime = supported_mime(&extension).ok_or((
        StatusCode::BAD_REQUEST,
        format!("Unsupported format: {extension}. Supported: {SUPPORTED_EXTENSIONS}"),
    ))?;

    Ok(Upload {
        filename,
        extension,
        mime,
        bytes,
        merge_speakers,
        speaker_names,
    })
}
