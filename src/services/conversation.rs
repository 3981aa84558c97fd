use std::path::Path;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use thiserror::Error;

use crate::{
    models::{
        chat::{ChatHistory, ChatSession},
        message::{ChatMessage, Message},
        theme::Theme,
        user::User,
    },
    repositories::{chat_history as history_repo, theme as theme_repo, user as user_repo},
    services::{
        completion::{CompletionGateway, GatewayError},
        profile::{self, ProfileError},
    },
    storage::{KeyValueStore, StoreError},
};

/// Largest file accepted as an attachment.
pub const MAX_ATTACHMENT_BYTES: u64 = 5 * 1024 * 1024;

/// Errors surfaced to the front end as a single message.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Type a message or attach a file first")]
    EmptyInput,

    #[error("File size too large ({0} bytes). Please select a file under 5MB.")]
    AttachmentTooLarge(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Profile(#[from] ProfileError),
}

/// A `Result` type that uses `ChatError` as the error type.
pub type Result<T> = std::result::Result<T, ChatError>;

/// A file attached to the next user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    /// A `data:` URL for images, a `file://` reference otherwise.
    pub url: String,
    pub mime_type: String,
}

impl Attachment {
    /// Reads and sniffs a file from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let size = std::fs::metadata(path)?.len();
        if size > MAX_ATTACHMENT_BYTES {
            return Err(ChatError::AttachmentTooLarge(size));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let bytes = std::fs::read(path)?;

        Self::from_bytes(name, &bytes)
    }

    /// Builds an attachment from raw bytes, detecting the MIME type from
    /// the content.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> Result<Self> {
        if bytes.len() as u64 > MAX_ATTACHMENT_BYTES {
            return Err(ChatError::AttachmentTooLarge(bytes.len() as u64));
        }

        let name = name.into();
        let mime_type = infer::get(bytes)
            .map(|kind| kind.mime_type())
            .unwrap_or("application/octet-stream")
            .to_string();

        let url = if mime_type.starts_with("image/") {
            format!("data:{};base64,{}", mime_type, general_purpose::STANDARD.encode(bytes))
        } else {
            format!("file://{}", name)
        };

        Ok(Self {
            name,
            url,
            mime_type,
        })
    }
}

/// Drives one conversation: input, gateway call, transcript, persistence.
///
/// `submit` takes `&mut self`, so at most one gateway call is outstanding.
pub struct ChatController<S: KeyValueStore> {
    gateway: Arc<CompletionGateway>,
    store: S,
    user: Option<User>,
    history: ChatHistory,
    current_chat_id: Option<String>,
    transcript: Vec<Message>,
    model: String,
    theme: Theme,
}

impl<S: KeyValueStore> ChatController<S> {
    /// Restores theme, user and (for a signed-in user) history from `store`.
    pub fn open(gateway: Arc<CompletionGateway>, store: S, model: impl Into<String>) -> Result<Self> {
        let theme = theme_repo::load_theme(&store)?;
        let user = user_repo::load_user(&store)?;
        let history = match &user {
            Some(user) => history_repo::load_history(&store, &user.id)?,
            None => ChatHistory::new(),
        };

        Ok(Self {
            gateway,
            store,
            user,
            history,
            current_chat_id: None,
            transcript: Vec::new(),
            model: model.into(),
            theme,
        })
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn sessions(&self) -> &[ChatSession] {
        self.history.sessions()
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn current_chat_id(&self) -> Option<&str> {
        self.current_chat_id.as_deref()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.model = model.into();
    }

    pub fn toggle_theme(&mut self) -> Result<Theme> {
        self.theme = self.theme.toggled();
        theme_repo::save_theme(&self.store, self.theme)?;
        Ok(self.theme)
    }

    /// Leaves the active session; the next message starts a new one.
    pub fn new_chat(&mut self) {
        self.current_chat_id = None;
        self.transcript.clear();
    }

    /// Makes a stored session active. Returns false for an unknown id.
    pub fn open_session(&mut self, session_id: &str) -> bool {
        match self.history.get(session_id) {
            Some(session) => {
                self.transcript = session.messages.clone();
                self.current_chat_id = Some(session.id.clone());
                true
            }
            None => false,
        }
    }

    pub fn delete_session(&mut self, session_id: &str) -> Result<bool> {
        let removed = self.history.delete_session(session_id);
        if removed {
            if self.current_chat_id.as_deref() == Some(session_id) {
                self.new_chat();
            }
            self.persist()?;
        }
        Ok(removed)
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.history = ChatHistory::new();
        self.new_chat();
        if let Some(user) = &self.user {
            history_repo::clear_history(&self.store, &user.id)?;
        }
        Ok(())
    }

    pub fn sign_up(&mut self, email: &str, name: Option<&str>) -> Result<&User> {
        let user = profile::sign_up(&self.store, email, name)?;
        self.switch_to(user)
    }

    pub fn sign_in(&mut self, email: &str) -> Result<&User> {
        let user = profile::sign_in(&self.store, email)?;
        self.switch_to(user)
    }

    pub fn sign_out(&mut self) -> Result<()> {
        profile::sign_out(&self.store)?;
        self.user = None;
        self.history = ChatHistory::new();
        self.new_chat();
        Ok(())
    }

    pub fn update_profile(&mut self, name: Option<&str>, profile_pic: Option<&str>) -> Result<&User> {
        let user = profile::update_profile(&self.store, name, profile_pic)?;
        Ok(self.user.insert(user))
    }

    fn switch_to(&mut self, user: User) -> Result<&User> {
        self.history = history_repo::load_history(&self.store, &user.id)?;
        self.new_chat();
        Ok(self.user.insert(user))
    }

    /// Sends one user turn and returns the assistant's reply.
    ///
    /// The user message is recorded before the call, so a failed call keeps
    /// it in the transcript. On a fallback recommendation the selected model
    /// switches and the call is retried once.
    pub async fn submit(&mut self, input: &str, attachment: Option<Attachment>) -> Result<Message> {
        let text = input.trim();
        if text.is_empty() && attachment.is_none() {
            return Err(ChatError::EmptyInput);
        }

        let mut user_message = Message::user(match (&attachment, text.is_empty()) {
            (Some(file), true) => format!("Analyzing file: {}", file.name),
            _ => text.to_string(),
        });
        if let Some(file) = &attachment {
            user_message = user_message.with_attachment(file.url.clone(), file.mime_type.clone());
        }
        self.record(user_message)?;

        let mut wire: Vec<ChatMessage> = self.transcript.iter().map(Message::to_wire).collect();
        if let Some(file) = &attachment {
            wire.push(ChatMessage::system(format!(
                "The user has uploaded a file of type: {}. Please provide analysis or response based on this context.",
                file.mime_type
            )));
        }

        let content = match self.gateway.generate(wire.clone(), &self.model).await {
            Ok(content) => content,
            Err(e) if e.fallback() => {
                let fallback = e
                    .fallback_model()
                    .unwrap_or(self.gateway.fallback_model())
                    .to_string();
                tracing::warn!("🔁 {} Retrying with {}", e, fallback);
                self.model = fallback;
                self.gateway.generate(wire, &self.model).await?
            }
            Err(e) => return Err(e.into()),
        };

        let reply = Message::assistant(content);
        self.record(reply.clone())?;
        Ok(reply)
    }

    fn record(&mut self, message: Message) -> Result<()> {
        self.transcript.push(message.clone());
        let id = self
            .history
            .append_message(self.current_chat_id.as_deref(), message);
        self.current_chat_id = Some(id);
        self.persist()
    }

    /// Writes the full history when a user is signed in; anonymous
    /// conversations stay in memory.
    fn persist(&self) -> Result<()> {
        if let Some(user) = &self.user {
            history_repo::save_history(&self.store, &user.id, &self.history)?;
        }
        Ok(())
    }
}
