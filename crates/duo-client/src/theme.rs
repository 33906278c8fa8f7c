use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::storage::{KeyValueStore, StorageError};

pub const THEME_KEY: &str = "couple-app-theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "light" => Some(Theme::Light),
            "dark" => Some(Theme::Dark),
            _ => None,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Light/dark preference. A saved choice wins over the system hint.
pub struct ThemeSetting {
    store: Arc<dyn KeyValueStore>,
}

impl ThemeSetting {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn current(&self, system_prefers_dark: bool) -> Theme {
        match self.store.get(THEME_KEY).as_deref().and_then(Theme::parse) {
            Some(theme) => theme,
            None if system_prefers_dark => Theme::Dark,
            None => Theme::Light,
        }
    }

    pub fn set(&self, theme: Theme) -> Result<(), StorageError> {
        debug!("Theme set to {}", theme);
        self.store.set(THEME_KEY, theme.as_str())
    }

    pub fn toggle(&self, system_prefers_dark: bool) -> Result<Theme, StorageError> {
        let next = self.current(system_prefers_dark).toggled();
        self.set(next)?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn system_hint_applies_until_a_choice_is_saved() {
        let setting = ThemeSetting::new(Arc::new(MemoryStore::new()));
        assert_eq!(setting.current(true), Theme::Dark);
        assert_eq!(setting.current(false), Theme::Light);

        assert_eq!(setting.toggle(true).unwrap(), Theme::Light);
        assert_eq!(setting.current(true), Theme::Light);
    }

    #[test]
    fn unknown_saved_value_is_ignored() {
        let store = Arc::new(MemoryStore::new());
        store.set(THEME_KEY, "sepia").unwrap();
        let setting = ThemeSetting::new(store);
        assert_eq!(setting.current(false), Theme::Light);
    }
}
