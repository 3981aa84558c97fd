use axum::{Json, body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, Result},
    models::message::{ChatMessage, Role},
    services::completion::GenerateOutcome,
    state::AppState,
    validation::chat::{validate_messages, validate_model},
};

/// The request payload shared by `/api/chat` and `/api/generate`.
#[derive(Deserialize, Debug)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Option<Vec<ChatMessage>>,
    #[serde(default)]
    pub model: Option<String>,
}

/// The success payload of `/api/chat`.
#[derive(Serialize, Debug)]
pub struct ChatResponse {
    pub role: Role,
    pub content: String,
}

/// Parses and validates a chat request body.
///
/// # Returns
///
/// The messages and the model, `default_model` when none was sent.
fn parse_request(body: &[u8], default_model: &str) -> Result<(Vec<ChatMessage>, String)> {
    let payload: ChatRequest = sonic_rs::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))?;

    validate_messages(payload.messages.as_deref())?;
    let model = payload.model.unwrap_or_else(|| default_model.to_string());
    validate_model(&model)?;

    Ok((payload.messages.unwrap_or_default(), model))
}

/// Handles `POST /api/chat`.
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    tracing::info!("💬 Chat API called");
    if !state.gateway.is_configured() {
        return Err(AppError::NotConfigured);
    }
    let (messages, model) = parse_request(&body, &state.config.fallback_model)?;
    tracing::info!("Using model: {} ({} messages)", model, messages.len());

    let content = state.gateway.generate(messages, &model).await?;

    Ok((
        StatusCode::OK,
        Json(ChatResponse {
            role: Role::Assistant,
            content,
        }),
    ))
}

/// Handles `POST /api/generate`: the structured `{success, ...}` form.
pub async fn generate(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let (messages, model) = parse_request(&body, &state.config.default_model)?;
    tracing::info!("🧪 Generate called with model: {}", model);

    let outcome = GenerateOutcome::from(state.gateway.generate(messages, &model).await);
    if !outcome.success {
        tracing::warn!("Generate failed: {:?}", outcome.error);
    }

    Ok((StatusCode::OK, Json(outcome)))
}
