use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::services::completion::{CompletionClient, CompletionRequest, UpstreamFailure};

/// Calls an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Zeroizing<String>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

impl OpenAiClient {
    pub fn new(base_url: impl Into<String>, api_key: Zeroizing<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Turns a non-success response body into an `UpstreamFailure`.
///
/// OpenAI reports errors as `{"error": {"message", "type", "code"}}`; any
/// other body is kept as the message.
pub(crate) fn parse_error_body(status: u16, body: &str) -> UpstreamFailure {
    match sonic_rs::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => UpstreamFailure {
            status: Some(status),
            code: parsed.error.code,
            message: parsed
                .error
                .message
                .unwrap_or_else(|| format!("HTTP {}", status)),
        },
        Err(_) => UpstreamFailure {
            status: Some(status),
            code: None,
            message: if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                format!("HTTP {}: {}", status, body)
            },
        },
    }
}

/// Extracts the first choice's content from a success body.
pub(crate) fn parse_success_body(body: &str) -> Result<Option<String>, UpstreamFailure> {
    let parsed: ChatCompletionResponse = sonic_rs::from_str(body)
        .map_err(|e| UpstreamFailure::transport(format!("Invalid completion response: {}", e)))?;

    Ok(parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content))
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>, UpstreamFailure> {
        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key.as_str()))
            .json(request)
            .send()
            .await
            .map_err(|e| UpstreamFailure::transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UpstreamFailure::transport(e.to_string()))?;

        if !status.is_success() {
            return Err(parse_error_body(status.as_u16(), &body));
        }

        parse_success_body(&body)
    }
}
