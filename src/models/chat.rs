use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::generate_id;
use crate::models::message::Message;

/// Maximum number of characters of the first message kept in a title.
pub const TITLE_MAX_CHARS: usize = 30;

/// One continuous chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// The unique identifier for the session.
    pub id: String,
    /// Derived from the first message.
    pub title: String,
    /// When the session was started.
    pub created_at: DateTime<Utc>,
    /// Chronological, never empty.
    pub messages: Vec<Message>,
}

impl ChatSession {
    /// Starts a session from its first message.
    pub fn start(first: Message) -> Self {
        Self {
            id: generate_id(),
            title: derive_title(&first.content),
            created_at: Utc::now(),
            messages: vec![first],
        }
    }
}

/// Builds a session title from message content.
pub fn derive_title(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// All sessions of one user, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatHistory {
    sessions: Vec<ChatSession>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn get(&self, session_id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    /// Appends `message` to the session `session_id`, or starts a new
    /// session at the front when there is no active session (or the id is
    /// unknown). Returns the id of the session that received the message.
    pub fn append_message(&mut self, session_id: Option<&str>, message: Message) -> String {
        if let Some(id) = session_id {
            if let Some(session) = self.sessions.iter_mut().find(|s| s.id == id) {
                session.messages.push(message);
                return session.id.clone();
            }
            tracing::debug!("Session {} not found, starting a new one", id);
        }

        let session = ChatSession::start(message);
        let id = session.id.clone();
        self.sessions.insert(0, session);
        id
    }

    /// Removes a session. Returns whether it existed.
    pub fn delete_session(&mut self, session_id: &str) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != session_id);
        self.sessions.len() != before
    }
}
