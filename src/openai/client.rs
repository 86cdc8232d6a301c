use anyhow::{bail, Context, Result};
use reqwest::multipart;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

const API_BASE: &str = "https://api.openai.com/v1";

/// Per-process client for the hosted transcription and summarization calls.
/// The realtime relay has its own connector; this one only speaks REST.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
}

/// Result of a diarized batch transcription.
#[derive(Debug, Clone, Deserialize)]
pub struct Transcription {
    pub text: String,
    #[serde(default)]
    pub segments: Vec<TranscriptionSegment>,
    #[serde(default)]
    pub duration: Option<f64>,
}

/// One diarized segment: who said what, and when.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionSegment {
    #[serde(default)]
    pub speaker: String,
    pub text: String,
    #[serde(default)]
    pub start: Option<f64>,
    #[serde(default)]
    pub end: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    /// Submit a bounded audio payload for diarized transcription.
    pub async fn transcribe(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        mime: &str,
        model: &str,
    ) -> Result<Transcription> {
        info!(
            filename,
            mime,
            size_kb = bytes.len() / 1024,
            "submitting audio for transcription"
        );

        let part = multipart::Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str(mime)
            .context("Invalid MIME type for upload")?;

        let form = multipart::Form::new()
            .text("model", model.to_string())
            .text("response_format", "diarized_json")
            .text("chunking_strategy", "auto")
            .part("file", part);

        let response = self
            .http
            .post(format!("{API_BASE}/audio/transcriptions"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Transcription request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("transcription request rejected ({status}): {body}");
        }

        let transcription: Transcription = response
            .json()
            .await
            .context("Failed to parse transcription response")?;

        info!(
            chars = transcription.text.len(),
            segments = transcription.segments.len(),
            "transcription completed"
        );

        Ok(transcription)
    }

    /// Ask the chat model for a short summary of transcript text.
    pub async fn summarize(&self, prompt: &str, model: &str) -> Result<String> {
        let body = json!({
            "model": model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .http
            .post(format!("{API_BASE}/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Summary request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("summary request rejected ({status}): {body}");
        }

        let mut chat: ChatResponse = response
            .json()
            .await
            .context("Failed to parse summary response")?;

        if chat.choices.is_empty() {
            bail!("summary response contained no choices");
        }

        Ok(chat.choices.remove(0).message.content)
    }
}
