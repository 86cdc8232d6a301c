//! REST client for the hosted transcription and summarization endpoints.

mod client;

pub use client::{OpenAiClient, Transcription, TranscriptionSegment};
