use serde::{Deserialize, Serialize};

use crate::progress::Inventory;
use crate::storage::StoreError;
use crate::types::{Difficulty, Theme};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub difficulty: Difficulty,
    pub sound_enabled: bool,
    pub theme: Theme,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Medium,
            sound_enabled: true,
            theme: Theme::Neon,
        }
    }
}

/// Command-line choices layered over the persisted settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub difficulty: Option<Difficulty>,
    pub theme: Option<Theme>,
    pub mute: bool,
}

impl Settings {
    /// Applies overrides. A theme the player does not own is ignored.
    pub fn merge(mut self, overrides: &SettingsOverrides, inventory: &Inventory) -> Self {
        if let Some(difficulty) = overrides.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(theme) = overrides.theme {
            if inventory.owns_theme(theme) {
                self.theme = theme;
            } else {
                tracing::warn!(%theme, "theme not owned, keeping current theme");
            }
        }
        if overrides.mute {
            self.sound_enabled = false;
        }
        self
    }
}

pub trait ConfigStore {
    fn load(&self) -> Settings;
    fn save(&mut self, settings: &Settings) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.difficulty, Difficulty::Medium);
        assert!(s.sound_enabled);
        assert_eq!(s.theme, Theme::Neon);
    }

    #[test]
    fn reads_persisted_shape() {
        let s: Settings =
            serde_json::from_str(r#"{"difficulty":"HARD","soundEnabled":false,"theme":"OCEAN"}"#)
                .unwrap();
        assert_eq!(
            s,
            Settings {
                difficulty: Difficulty::Hard,
                sound_enabled: false,
                theme: Theme::Ocean,
            }
        );

        let partial: Settings = serde_json::from_str(r#"{"difficulty":"EASY"}"#).unwrap();
        assert_eq!(partial.theme, Theme::Neon);
        assert!(partial.sound_enabled);
    }

    #[test]
    fn merge_applies_owned_theme_only() {
        let mut inventory = Inventory::default();
        let overrides = SettingsOverrides {
            difficulty: Some(Difficulty::Hard),
            theme: Some(Theme::Sunset),
            mute: true,
        };

        let merged = Settings::default().merge(&overrides, &inventory);
        assert_eq!(merged.difficulty, Difficulty::Hard);
        assert_eq!(merged.theme, Theme::Neon);
        assert!(!merged.sound_enabled);

        inventory.unlocked_themes.push(Theme::Sunset);
        let merged = Settings::default().merge(&overrides, &inventory);
        assert_eq!(merged.theme, Theme::Sunset);
    }
}
