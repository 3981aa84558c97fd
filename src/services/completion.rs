use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::models::message::{ChatMessage, Role};

/// The system prompt injected when a conversation carries none.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant in a pixel art themed chat interface. Provide concise, friendly responses.";

/// Returned when the API answers with empty content.
pub const EMPTY_RESPONSE_PLACEHOLDER: &str = "No response generated.";

/// Sampling temperature sent upstream.
pub const TEMPERATURE: f32 = 0.7;

/// Completion length cap sent upstream.
pub const MAX_TOKENS: u32 = 1000;

/// One request to the completion API.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

/// A failed call as reported by the completion API (or the transport).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamFailure {
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// The machine-readable error code, e.g. `model_not_found`.
    pub code: Option<String>,
    pub message: String,
}

impl UpstreamFailure {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            code: None,
            message: message.into(),
        }
    }
}

/// The port to the completion API.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends one request and returns the first choice's content, if any.
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, UpstreamFailure>;
}

/// Why a generation failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The API credential is absent. Do not retry.
    #[error("OpenAI API key is not configured. Please add it to your .env file.")]
    Config,

    /// The API rejected the credential. Do not retry.
    #[error("Invalid OpenAI API key. Please check your .env file and ensure the key is correct.")]
    Auth,

    /// The model id is unknown upstream; the caller may retry with
    /// `fallback_model`.
    #[error("Model \"{model}\" not found. Falling back to {fallback_model}.")]
    ModelNotFound { model: String, fallback_model: String },

    /// Any other upstream failure, message passed through.
    #[error("{0}")]
    Upstream(String),
}

impl GatewayError {
    /// Whether the caller should retry with the fallback model.
    pub fn fallback(&self) -> bool {
        matches!(self, GatewayError::ModelNotFound { .. })
    }

    /// The model to retry with, for `ModelNotFound`.
    pub fn fallback_model(&self) -> Option<&str> {
        match self {
            GatewayError::ModelNotFound { fallback_model, .. } => Some(fallback_model),
            _ => None,
        }
    }
}

/// Maps an upstream failure onto the gateway's error kinds.
pub fn classify(failure: UpstreamFailure, model: &str, fallback_model: &str) -> GatewayError {
    let code = failure.code.as_deref();

    if code == Some("model_not_found") {
        return GatewayError::ModelNotFound {
            model: model.to_string(),
            fallback_model: fallback_model.to_string(),
        };
    }

    if failure.status == Some(401)
        || code == Some("invalid_api_key")
        || failure.message.contains("API key")
    {
        return GatewayError::Auth;
    }

    if failure.message.trim().is_empty() {
        return GatewayError::Upstream(
            "An error occurred while generating a response.".to_string(),
        );
    }

    GatewayError::Upstream(failure.message)
}

/// Prepends the default system prompt unless a system message is present.
pub fn with_default_system_prompt(mut messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    if !messages.iter().any(|m| m.role == Role::System) {
        messages.insert(0, ChatMessage::system(DEFAULT_SYSTEM_PROMPT));
    }
    messages
}

/// The structured result form of `generate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl From<Result<String, GatewayError>> for GenerateOutcome {
    fn from(result: Result<String, GatewayError>) -> Self {
        match result {
            Ok(content) => Self {
                success: true,
                content: Some(content),
                error: None,
                fallback: false,
            },
            Err(e) => Self {
                success: false,
                content: None,
                fallback: e.fallback(),
                error: Some(e.to_string()),
            },
        }
    }
}

/// Whether a credential is configured, without exposing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyStatus {
    pub configured: bool,
    pub key_length: usize,
    pub key_prefix: String,
}

impl KeyStatus {
    pub fn of(key: Option<&Zeroizing<String>>) -> Self {
        match key {
            Some(key) => Self {
                configured: true,
                key_length: key.len(),
                key_prefix: key.chars().take(5).collect(),
            },
            None => Self {
                configured: false,
                key_length: 0,
                key_prefix: String::new(),
            },
        }
    }
}

/// Mediates between callers and the completion API.
pub struct CompletionGateway {
    /// `None` when no credential is configured.
    client: Option<Arc<dyn CompletionClient>>,
    fallback_model: String,
}

impl CompletionGateway {
    /// # Arguments
    ///
    /// * `client` - The upstream client, or `None` when the key is absent.
    /// * `fallback_model` - The model recommended on `model_not_found`.
    pub fn new(client: Option<Arc<dyn CompletionClient>>, fallback_model: impl Into<String>) -> Self {
        Self {
            client,
            fallback_model: fallback_model.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    pub fn fallback_model(&self) -> &str {
        &self.fallback_model
    }

    /// Generates the assistant reply for `messages` with `model`.
    ///
    /// Never retries: on `ModelNotFound` the error carries the fallback
    /// recommendation and the caller decides.
    pub async fn generate(
        &self,
        messages: Vec<ChatMessage>,
        model: &str,
    ) -> Result<String, GatewayError> {
        let Some(client) = self.client.as_ref() else {
            tracing::error!("❌ OpenAI API key is missing, refusing to call upstream");
            return Err(GatewayError::Config);
        };

        let request = CompletionRequest {
            model: model.to_string(),
            messages: with_default_system_prompt(messages),
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            stream: false,
        };

        tracing::info!(
            "🤖 Generating completion with model {} ({} messages)",
            request.model,
            request.messages.len()
        );

        match client.complete(&request).await {
            Ok(Some(content)) if !content.is_empty() => Ok(content),
            Ok(_) => {
                tracing::warn!("⚠️ Completion API returned empty content");
                Ok(EMPTY_RESPONSE_PLACEHOLDER.to_string())
            }
            Err(failure) => {
                tracing::warn!(
                    "❌ Completion API failed (status: {:?}, code: {:?}): {}",
                    failure.status,
                    failure.code,
                    failure.message
                );
                Err(classify(failure, model, &self.fallback_model))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A client that replays scripted results and records every request.
    #[derive(Default)]
    pub struct ScriptedClient {
        replies: Mutex<VecDeque<Result<Option<String>, UpstreamFailure>>>,
        pub requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedClient {
        pub fn new(replies: Vec<Result<Option<String>, UpstreamFailure>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        pub fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, UpstreamFailure> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(UpstreamFailure::transport("no scripted reply")))
        }
    }

    pub fn failure(status: u16, code: Option<&str>, message: &str) -> UpstreamFailure {
        UpstreamFailure {
            status: Some(status),
            code: code.map(str::to_string),
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{ScriptedClient, failure};
    use super::*;

    fn gateway(client: &Arc<ScriptedClient>) -> CompletionGateway {
        CompletionGateway::new(Some(client.clone() as Arc<dyn CompletionClient>), "gpt-3.5-turbo")
    }

    #[tokio::test]
    async fn hi_returns_hello() {
        let client = ScriptedClient::new(vec![Ok(Some("Hello!".into()))]);
        let result = gateway(&client)
            .generate(vec![ChatMessage::user("Hi")], "gpt-4o-mini")
            .await;

        let outcome = GenerateOutcome::from(result);
        assert_eq!(
            outcome,
            GenerateOutcome {
                success: true,
                content: Some("Hello!".into()),
                error: None,
                fallback: false,
            }
        );

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[0].model, "gpt-4o-mini");
        assert_eq!(requests[0].temperature, TEMPERATURE);
        assert_eq!(requests[0].max_tokens, MAX_TOKENS);
    }

    #[tokio::test]
    async fn prepends_exactly_one_system_message_when_absent() {
        let client = ScriptedClient::new(vec![Ok(Some("ok".into()))]);
        gateway(&client)
            .generate(
                vec![
                    ChatMessage::user("a"),
                    ChatMessage::new(Role::Assistant, "b"),
                    ChatMessage::user("c"),
                ],
                "m",
            )
            .await
            .unwrap();

        let sent = &client.requests.lock().unwrap()[0].messages;
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0], ChatMessage::system(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(sent.iter().filter(|m| m.role == Role::System).count(), 1);
        assert_eq!(sent[1], ChatMessage::user("a"));
    }

    #[tokio::test]
    async fn keeps_an_existing_system_message() {
        let client = ScriptedClient::new(vec![Ok(Some("ok".into()))]);
        let messages = vec![ChatMessage::user("a"), ChatMessage::system("custom")];
        gateway(&client).generate(messages.clone(), "m").await.unwrap();

        assert_eq!(client.requests.lock().unwrap()[0].messages, messages);
    }

    #[tokio::test]
    async fn empty_content_becomes_placeholder() {
        let client = ScriptedClient::new(vec![Ok(None), Ok(Some(String::new()))]);
        let gw = gateway(&client);
        assert_eq!(gw.generate(vec![ChatMessage::user("a")], "m").await.unwrap(), EMPTY_RESPONSE_PLACEHOLDER);
        assert_eq!(gw.generate(vec![ChatMessage::user("a")], "m").await.unwrap(), EMPTY_RESPONSE_PLACEHOLDER);
    }

    #[tokio::test]
    async fn missing_key_is_a_config_error_without_network() {
        let gw = CompletionGateway::new(None, "gpt-3.5-turbo");
        let err = gw.generate(vec![ChatMessage::user("Hi")], "gpt-4o-mini").await.unwrap_err();
        assert_eq!(err, GatewayError::Config);
        assert!(!err.fallback());

        let outcome = GenerateOutcome::from(Err::<String, _>(err));
        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("OpenAI API key is not configured. Please add it to your .env file.")
        );
    }

    #[tokio::test]
    async fn model_not_found_recommends_fallback_and_does_not_retry() {
        let client = ScriptedClient::new(vec![
            Err(failure(404, Some("model_not_found"), "The model `gpt-5` does not exist")),
            Ok(Some("should not be used".into())),
        ]);
        let err = gateway(&client)
            .generate(vec![ChatMessage::user("Hi")], "gpt-5")
            .await
            .unwrap_err();

        assert!(err.fallback());
        assert_eq!(err.fallback_model(), Some("gpt-3.5-turbo"));
        assert_eq!(client.calls(), 1);

        let outcome = GenerateOutcome::from(Err::<String, _>(err));
        assert!(!outcome.success);
        assert!(outcome.fallback);
        assert!(outcome.error.unwrap().starts_with("Model \"gpt-5\" not found"));
    }

    #[test]
    fn classifies_auth_failures() {
        assert_eq!(classify(failure(401, None, "nope"), "m", "f"), GatewayError::Auth);
        assert_eq!(
            classify(failure(400, Some("invalid_api_key"), "bad"), "m", "f"),
            GatewayError::Auth
        );
        assert_eq!(
            classify(UpstreamFailure::transport("Incorrect API key provided"), "m", "f"),
            GatewayError::Auth
        );
    }

    #[test]
    fn other_failures_pass_through_verbatim() {
        assert_eq!(
            classify(failure(500, Some("server_error"), "upstream exploded"), "m", "f"),
            GatewayError::Upstream("upstream exploded".into())
        );
        assert_eq!(
            classify(failure(502, None, "  "), "m", "f"),
            GatewayError::Upstream("An error occurred while generating a response.".into())
        );
    }

    #[test]
    fn outcome_serializes_without_empty_fields() {
        let json = sonic_rs::to_string(&GenerateOutcome::from(Ok::<_, GatewayError>("Hello!".to_string()))).unwrap();
        assert_eq!(json, r#"{"success":true,"content":"Hello!"}"#);
    }

    #[test]
    fn key_status_reports_prefix_and_length_only() {
        let key = Zeroizing::new("sk-abcdef123".to_string());
        let status = KeyStatus::of(Some(&key));
        assert!(status.configured);
        assert_eq!(status.key_length, 12);
        assert_eq!(status.key_prefix, "sk-ab");

        assert_eq!(
            KeyStatus::of(None),
            KeyStatus { configured: false, key_length: 0, key_prefix: String::new() }
        );
    }
}
