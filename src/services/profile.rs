use garde::Validate;
use thiserror::Error;

use crate::{
    ids::generate_id,
    models::user::{User, email_local_part},
    repositories::user as user_repo,
    storage::{KeyValueStore, StoreError},
};

/// Picture used when the user picks none.
pub const DEFAULT_PROFILE_PIC: &str = "/profile-pics/default.png";

/// Errors from the local identity operations.
#[derive(Error, Debug)]
pub enum ProfileError {
    /// The email failed validation.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    /// No stored user matches the email.
    #[error("No stored user with that email")]
    UnknownEmail,

    /// The operation needs a signed-in user.
    #[error("Not signed in")]
    NotSignedIn,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A `Result` type that uses `ProfileError` as the error type.
pub type Result<T> = std::result::Result<T, ProfileError>;

#[derive(Validate)]
struct SignUpForm {
    #[garde(email)]
    email: String,
    #[garde(length(max = 64))]
    name: Option<String>,
}

/// Creates and stores a new local user, replacing any previous one.
///
/// # Arguments
///
/// * `store` - The local store.
/// * `email` - The user's email address.
/// * `name` - An optional display name.
pub fn sign_up(store: &dyn KeyValueStore, email: &str, name: Option<&str>) -> Result<User> {
    let form = SignUpForm {
        email: email.trim().to_string(),
        name: name.map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
    };
    form.validate()
        .map_err(|report| ProfileError::InvalidEmail(report.to_string()))?;

    let user = User {
        id: generate_id(),
        email: form.email,
        name: form.name,
        profile_pic: None,
    };
    user_repo::save_user(store, &user)?;
    user_repo::remember_user(store, &user)?;

    tracing::info!("✅ Local user created: {}", user.id);
    Ok(user)
}

/// Selects the known user whose email matches and makes it current. This
/// is identity selection only: there are no credentials to verify.
pub fn sign_in(store: &dyn KeyValueStore, email: &str) -> Result<User> {
    let email = email.trim();
    let current = user_repo::load_user(store)?.filter(|user| user.email.eq_ignore_ascii_case(email));
    let user = match current {
        Some(user) => user,
        None => user_repo::find_known_user(store, email)?.ok_or(ProfileError::UnknownEmail)?,
    };
    user_repo::save_user(store, &user)?;

    tracing::info!("✅ Signed in as {}", user.id);
    Ok(user)
}

/// Forgets the current user. Their identity and history stay in the store,
/// so signing in again with the same email restores them.
pub fn sign_out(store: &dyn KeyValueStore) -> Result<()> {
    user_repo::clear_user(store)?;
    tracing::info!("👋 Signed out");
    Ok(())
}

/// Updates the display name and picture of the stored user.
///
/// An empty name falls back to the email's local part; a missing picture to
/// the default one.
pub fn update_profile(
    store: &dyn KeyValueStore,
    name: Option<&str>,
    profile_pic: Option<&str>,
) -> Result<User> {
    let mut user = user_repo::load_user(store)?.ok_or(ProfileError::NotSignedIn)?;

    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| email_local_part(&user.email));
    user.name = Some(name.to_string());
    user.profile_pic = Some(
        profile_pic
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(DEFAULT_PROFILE_PIC)
            .to_string(),
    );

    user_repo::save_user(store, &user)?;
    user_repo::remember_user(store, &user)?;
    tracing::info!("✅ Profile updated for {}", user.id);
    Ok(user)
}
