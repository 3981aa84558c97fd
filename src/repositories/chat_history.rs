use crate::{
    models::chat::{ChatHistory, ChatSession},
    models::message::Message,
    storage::{KeyValueStore, Result, StoreError},
};

/// The key holding the chat history of `user_id`.
pub fn history_key(user_id: &str) -> String {
    format!("pixelAiChatHistory_{}", user_id)
}

/// Loads a user's history.
///
/// A malformed record is discarded and the history starts out empty.
pub fn load_history(store: &dyn KeyValueStore, user_id: &str) -> Result<ChatHistory> {
    let key = history_key(user_id);
    let Some(raw) = store.get(&key)? else {
        return Ok(ChatHistory::new());
    };

    match sonic_rs::from_str::<ChatHistory>(&raw) {
        Ok(history) => Ok(history),
        Err(e) => {
            tracing::warn!("⚠️ Failed to parse chat history for {}, discarding it: {}", user_id, e);
            store.remove(&key)?;
            Ok(ChatHistory::new())
        }
    }
}

/// Persists the full history of a user.
pub fn save_history(store: &dyn KeyValueStore, user_id: &str, history: &ChatHistory) -> Result<()> {
    let json = sonic_rs::to_string(history)
        .map_err(|e| StoreError::Serialization(format!("History serialization failed: {}", e)))?;
    store.set(&history_key(user_id), &json)
}

/// Removes every session of a user.
pub fn clear_history(store: &dyn KeyValueStore, user_id: &str) -> Result<()> {
    store.remove(&history_key(user_id))
}

/// Lists a user's sessions, newest first.
pub fn list_sessions(store: &dyn KeyValueStore, user_id: &str) -> Result<Vec<ChatSession>> {
    Ok(load_history(store, user_id)?.sessions().to_vec())
}

/// Appends a message to `session_id`, creating a session when there is none.
/// The whole updated history is written back.
///
/// # Returns
///
/// The id of the session that received the message.
pub fn append_message(
    store: &dyn KeyValueStore,
    user_id: &str,
    session_id: Option<&str>,
    message: Message,
) -> Result<String> {
    let mut history = load_history(store, user_id)?;
    let id = history.append_message(session_id, message);
    save_history(store, user_id, &history)?;
    Ok(id)
}

/// Deletes one session. Returns whether it existed.
pub fn delete_session(store: &dyn KeyValueStore, user_id: &str, session_id: &str) -> Result<bool> {
    let mut history = load_history(store, user_id)?;
    let removed = history.delete_session(session_id);
    if removed {
        save_history(store, user_id, &history)?;
    }
    Ok(removed)
}
