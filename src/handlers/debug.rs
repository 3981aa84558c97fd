use axum::{Json, extract::State};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::{services::completion::KeyStatus, state::AppState};

/// Runtime diagnostics returned by `/api/debug`.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub server_version: &'static str,
    pub environment: String,
    #[serde(rename = "hasOpenAIKey")]
    pub has_openai_key: bool,
    #[serde(rename = "openAIKeyLength")]
    pub openai_key_length: usize,
    pub time: String,
}

/// An entry of the model catalog.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// Models offered by the model selector.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "gpt-4o-mini",
        name: "GPT-4o Mini",
        description: "Balanced model",
    },
    ModelInfo {
        id: "gpt-3.5-turbo",
        name: "GPT-3.5",
        description: "Fast responses",
    },
];

/// Handles `GET /api/debug`.
pub async fn debug_info(State(state): State<AppState>) -> Json<DebugInfo> {
    let key = state.config.openai_api_key.as_ref();

    Json(DebugInfo {
        server_version: env!("CARGO_PKG_VERSION"),
        environment: state.config.app_env.clone(),
        has_openai_key: state.config.has_api_key(),
        openai_key_length: key.map(|k| k.len()).unwrap_or(0),
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// Handles `GET /api/key-status`.
pub async fn key_status(State(state): State<AppState>) -> Json<KeyStatus> {
    Json(KeyStatus::of(state.config.openai_api_key.as_ref()))
}

/// Handles `GET /api/models`.
pub async fn models() -> Json<&'static [ModelInfo]> {
    Json(MODELS)
}
