use crate::{
    models::user::User,
    storage::{KeyValueStore, Result, StoreError},
};

/// The key the user record lives under.
pub const USER_KEY: &str = "pixelAiUser";
/// The key of every identity created on this store, kept across sign-outs.
pub const KNOWN_USERS_KEY: &str = "pixelAiKnownUsers";

/// Saves the user record, replacing any previous one.
pub fn save_user(store: &dyn KeyValueStore, user: &User) -> Result<()> {
    let json = sonic_rs::to_string(user)
        .map_err(|e| StoreError::Serialization(format!("User serialization failed: {}", e)))?;
    store.set(USER_KEY, &json)
}

/// Loads the user record.
///
/// A malformed record is discarded and reported as absent.
pub fn load_user(store: &dyn KeyValueStore) -> Result<Option<User>> {
    let Some(raw) = store.get(USER_KEY)? else {
        return Ok(None);
    };

    match sonic_rs::from_str::<User>(&raw) {
        Ok(user) => Ok(Some(user)),
        Err(e) => {
            tracing::warn!("⚠️ Failed to parse stored user, discarding it: {}", e);
            store.remove(USER_KEY)?;
            Ok(None)
        }
    }
}

/// Removes the user record. Chat histories are left in place.
pub fn clear_user(store: &dyn KeyValueStore) -> Result<()> {
    store.remove(USER_KEY)
}

/// Loads every identity created on this store.
///
/// A malformed registry is discarded and reported as empty.
pub fn load_known_users(store: &dyn KeyValueStore) -> Result<Vec<User>> {
    let Some(raw) = store.get(KNOWN_USERS_KEY)? else {
        return Ok(Vec::new());
    };

    match sonic_rs::from_str::<Vec<User>>(&raw) {
        Ok(users) => Ok(users),
        Err(e) => {
            tracing::warn!("⚠️ Failed to parse known users, discarding them: {}", e);
            store.remove(KNOWN_USERS_KEY)?;
            Ok(Vec::new())
        }
    }
}

/// Records `user` in the registry, replacing the entry with the same id.
pub fn remember_user(store: &dyn KeyValueStore, user: &User) -> Result<()> {
    let mut users = load_known_users(store)?;
    match users.iter_mut().find(|known| known.id == user.id) {
        Some(known) => *known = user.clone(),
        None => users.push(user.clone()),
    }

    let json = sonic_rs::to_string(&users)
        .map_err(|e| StoreError::Serialization(format!("User serialization failed: {}", e)))?;
    store.set(KNOWN_USERS_KEY, &json)
}

/// Finds a known identity by email, ignoring ASCII case.
pub fn find_known_user(store: &dyn KeyValueStore, email: &str) -> Result<Option<User>> {
    Ok(load_known_users(store)?
        .into_iter()
        .find(|user| user.email.eq_ignore_ascii_case(email)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn sample() -> User {
        User {
            id: "id-00aa".into(),
            email: "pixel@example.com".into(),
            name: Some("Pixel".into()),
            profile_pic: None,
        }
    }

    #[test]
    fn save_then_load_returns_the_same_user() {
        let store = MemoryStore::new();
        save_user(&store, &sample()).unwrap();
        assert_eq!(load_user(&store).unwrap(), Some(sample()));
    }

    #[test]
    fn malformed_record_is_absent_and_discarded() {
        let store = MemoryStore::new();
        store.set(USER_KEY, "{\"id\":").unwrap();

        assert_eq!(load_user(&store).unwrap(), None);
        assert_eq!(store.get(USER_KEY).unwrap(), None);
    }

    #[test]
    fn clear_removes_the_record() {
        let store = MemoryStore::new();
        save_user(&store, &sample()).unwrap();
        clear_user(&store).unwrap();
        assert_eq!(load_user(&store).unwrap(), None);
    }

    #[test]
    fn known_users_survive_clear_and_update_in_place() {
        let store = MemoryStore::new();
        remember_user(&store, &sample()).unwrap();
        clear_user(&store).unwrap();

        let mut renamed = sample();
        renamed.name = Some("Pix".into());
        remember_user(&store, &renamed).unwrap();

        assert_eq!(load_known_users(&store).unwrap(), vec![renamed.clone()]);
        assert_eq!(find_known_user(&store, "PIXEL@example.com").unwrap(), Some(renamed));
        assert_eq!(find_known_user(&store, "other@example.com").unwrap(), None);
    }

    #[test]
    fn malformed_registry_reads_as_empty() {
        let store = MemoryStore::new();
        store.set(KNOWN_USERS_KEY, "[{").unwrap();

        assert!(load_known_users(&store).unwrap().is_empty());
        assert_eq!(store.get(KNOWN_USERS_KEY).unwrap(), None);
    }
}
