use crate::config::Config;
use crate::openai::OpenAiClient;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub openai: Arc<OpenAiClient>,
    /// API key for the realtime relay's upstream connector
    pub api_key: String,
}

impl AppState {
    pub fn new(config: Config, api_key: String) -> Self {
        Self {
            config: Arc::new(config),
            openai: Arc::new(OpenAiClient::new(api_key.clone())),
            api_key,
        }
    }
}
