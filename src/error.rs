use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::services::completion::GatewayError;

/// The HTTP-facing error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The request body could not be understood.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The completion API credential is absent.
    #[error("OpenAI API key is not configured")]
    NotConfigured,

    /// The completion gateway failed for any other reason.
    #[error("Completion failed: {0}")]
    Completion(GatewayError),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Config => AppError::NotConfigured,
            other => AppError::Completion(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details) = match self {
            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone(), None)
            }

            AppError::NotConfigured => {
                tracing::error!("OPENAI_API_KEY is not set");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "OpenAI API key is not configured".to_string(),
                    None,
                )
            }

            AppError::Completion(ref e) => {
                tracing::error!("Completion error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An error occurred while processing your request".to_string(),
                    Some(e.to_string()),
                )
            }
        };

        let body = match details {
            Some(details) => sonic_rs::to_string(&sonic_rs::json!({
                "error": message,
                "details": details
            })),
            None => sonic_rs::to_string(&sonic_rs::json!({
                "error": message
            })),
        }
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (
            status,
            [(http::header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}
