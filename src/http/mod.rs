//! HTTP API server for the transcription frontend
//!
//! This module provides the web surface:
//! - GET /ws/realtime - Duplex streaming relay (WebSocket)
//! - POST /transcribe - Batch file transcription with diarization
//! - GET /health - Health check
//! - Static frontend assets at the root path

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
