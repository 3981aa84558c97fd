use std::sync::Arc;

use crate::config::Config;
use crate::services::completion::{CompletionClient, CompletionGateway};
use crate::services::openai::OpenAiClient;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The application's configuration.
    pub config: Config,
    /// The gateway to the completion API.
    pub gateway: Arc<CompletionGateway>,
}

impl AppState {
    /// Creates a new `AppState` with the OpenAI client when a key is set.
    pub fn new(config: &Config) -> Self {
        let client = config.openai_api_key.clone().map(|key| {
            Arc::new(OpenAiClient::new(config.openai_base_url.clone(), key)) as Arc<dyn CompletionClient>
        });

        match &client {
            Some(_) => tracing::info!("✅ OpenAI client initialized ({})", config.openai_base_url),
            None => tracing::warn!("⚠️ OPENAI_API_KEY is not set; chat requests will report a configuration error"),
        }

        Self::with_client(config, client)
    }

    /// Creates a new `AppState` around an explicit client.
    pub fn with_client(config: &Config, client: Option<Arc<dyn CompletionClient>>) -> Self {
        let gateway = CompletionGateway::new(client, config.fallback_model.clone());

        AppState {
            config: config.clone(),
            gateway: Arc::new(gateway),
        }
    }
}
