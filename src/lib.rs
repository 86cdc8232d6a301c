pub mod audio;
pub mod config;
pub mod http;
pub mod openai;
pub mod realtime;
pub mod transcribe;

pub use config::Config;
pub use http::{create_router, AppState};
pub use openai::{OpenAiClient, Transcription, TranscriptionSegment};
pub use realtime::{
    LifecycleState, RelayCoordinator, RelayEnd, RelayError, RelayMode, RelayOutcome, RelayResult,
    SessionConfig, SessionDefaults, UpstreamEvent,
};
pub use transcribe::DiarizedSegment;
