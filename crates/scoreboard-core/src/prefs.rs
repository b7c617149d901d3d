//! Persisted user preferences. Only the stored values live here; nothing
//! in the core acts on them.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::{NamespacedStore, Storage};

const NAMESPACE: &str = "prefs";
const THEME_KEY: &str = "theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(anyhow::anyhow!("Unknown theme: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Preferences {
    store: NamespacedStore,
}

impl Preferences {
    pub fn new(storage: Storage) -> Self {
        Self {
            store: NamespacedStore::new(storage),
        }
    }

    pub fn theme(&self) -> Theme {
        self.store.get(NAMESPACE, THEME_KEY).unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        self.store
            .set(NAMESPACE, THEME_KEY, &theme, None)
            .context("Failed to save theme")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_defaults_to_dark_and_persists() {
        let storage = Storage::in_memory();
        let prefs = Preferences::new(storage.clone());
        assert_eq!(prefs.theme(), Theme::Dark);

        prefs.set_theme(Theme::Dark.toggled()).unwrap();
        assert_eq!(Preferences::new(storage).theme(), Theme::Light);
    }

    #[test]
    fn test_theme_parse() {
        assert_eq!("LIGHT".parse::<Theme>().unwrap(), Theme::Light);
        assert!("sepia".parse::<Theme>().is_err());
    }
}
