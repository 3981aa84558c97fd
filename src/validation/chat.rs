use crate::error::{AppError, Result};
use crate::models::message::ChatMessage;

/// Longest accepted model identifier.
const MAX_MODEL_LEN: usize = 100;

/// Validates a model identifier.
///
/// # Arguments
///
/// * `model` - The model id sent by the client.
///
/// # Returns
///
/// A `Result<()>` indicating whether the model id is acceptable.
pub fn validate_model(model: &str) -> Result<()> {
    if model.trim().is_empty() {
        return Err(AppError::Validation("Model cannot be empty".to_string()));
    }

    if model.len() > MAX_MODEL_LEN {
        return Err(AppError::Validation(format!(
            "Model must be at most {} characters",
            MAX_MODEL_LEN
        )));
    }

    if !model
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '/'))
    {
        return Err(AppError::Validation(
            "Model can only contain letters, numbers, and - _ . : /".to_string(),
        ));
    }

    Ok(())
}

/// Validates the message list of a chat request.
pub fn validate_messages(messages: Option<&[ChatMessage]>) -> Result<()> {
    match messages {
        Some(messages) if !messages.is_empty() => Ok(()),
        _ => Err(AppError::Validation("Messages are required".to_string())),
    }
}
