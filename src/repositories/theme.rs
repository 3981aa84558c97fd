use crate::{
    models::theme::Theme,
    storage::{KeyValueStore, Result},
};

/// The key the theme flag lives under.
pub const THEME_KEY: &str = "pixelAiTheme";

/// Loads the theme flag; absent or unknown values mean dark.
pub fn load_theme(store: &dyn KeyValueStore) -> Result<Theme> {
    Ok(store
        .get(THEME_KEY)?
        .and_then(|raw| raw.parse().ok())
        .unwrap_or_default())
}

pub fn save_theme(store: &dyn KeyValueStore, theme: Theme) -> Result<()> {
    store.set(THEME_KEY, theme.as_str())
}
