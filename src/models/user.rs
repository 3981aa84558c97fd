use serde::{Deserialize, Serialize};

/// The locally stored identity. It carries no credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// The unique identifier for the user; namespaces the chat history.
    pub id: String,
    /// The user's email address.
    pub email: String,
    /// The display name, if set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// A reference to the profile picture (URL or data URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

impl User {
    /// The name to show: the display name, or the local part of the email.
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => email_local_part(&self.email),
        }
    }
}

/// The part of an email address before the `@`.
pub fn email_local_part(email: &str) -> &str {
    email.split('@').next().unwrap_or(email)
}
