use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use crate::achievements::{catalog_index, AchievementDef, ACHIEVEMENTS, CATALOG_VERSION};
use crate::types::Theme;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub max_progress: u64,
    #[serde(default)]
    pub unlocked: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub unlocked_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub progress: u64,
}

impl Achievement {
    pub fn locked(def: &AchievementDef) -> Self {
        Self {
            id: def.id.to_string(),
            title: def.title.to_string(),
            description: def.description.to_string(),
            icon: def.icon.to_string(),
            max_progress: def.max_progress,
            unlocked: false,
            unlocked_at: None,
            progress: 0,
        }
    }

    /// Progress as a fraction of the goal, for progress bars
    pub fn ratio(&self) -> f64 {
        if self.unlocked {
            return 1.0;
        }
        if self.max_progress == 0 {
            return 0.0;
        }
        (self.progress as f64 / self.max_progress as f64).min(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Inventory {
    #[serde(deserialize_with = "known_themes")]
    pub unlocked_themes: Vec<Theme>,
    pub power_up_boosts: u32,
    pub shields: u32,
    pub double_tap_cards: u32,
}

impl Default for Inventory {
    fn default() -> Self {
        Self {
            unlocked_themes: vec![Theme::Neon],
            power_up_boosts: 0,
            shields: 0,
            double_tap_cards: 0,
        }
    }
}

impl Inventory {
    pub fn owns_theme(&self, theme: Theme) -> bool {
        self.unlocked_themes.contains(&theme)
    }
}

/// Long-lived player record. Only the progression engine mutates the
/// counters; the shop debits coins and grants inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlayerProgress {
    /// Catalog the achievements were last migrated to; 0 for records that predate versioning
    #[serde(default)]
    pub catalog_version: u32,
    pub achievements: Vec<Achievement>,
    pub daily_streak: u32,
    #[serde(with = "played_date")]
    pub last_played_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_count")]
    pub total_score: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub total_games_played: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub total_hits: u64,
    pub best_combo: u32,
    pub best_score: u32,
    #[serde(deserialize_with = "lenient_count")]
    pub power_ups_collected: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub golden_numbers_hit: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub coins: u64,
    #[serde(deserialize_with = "lenient_count")]
    pub total_coins_earned: u64,
    pub inventory: Inventory,
    /// Fields written by other clients, carried through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for PlayerProgress {
    fn default() -> Self {
        Self {
            catalog_version: CATALOG_VERSION,
            achievements: ACHIEVEMENTS.iter().map(Achievement::locked).collect(),
            daily_streak: 0,
            last_played_date: None,
            total_score: 0,
            total_games_played: 0,
            total_hits: 0,
            best_combo: 0,
            best_score: 0,
            power_ups_collected: 0,
            golden_numbers_hit: 0,
            coins: 0,
            total_coins_earned: 0,
            inventory: Inventory::default(),
            extra: serde_json::Map::new(),
        }
    }
}

impl PlayerProgress {
    /// Brings a loaded record up to the current catalog: adds missing
    /// achievements as locked, drops duplicate ids and puts entries in
    /// catalog order. Catalog text is rewritten when the record was migrated
    /// by an older catalog; a record from a newer catalog keeps its text and
    /// version. Idempotent.
    pub fn migrate(mut self) -> Self {
        let stored_version = self.catalog_version;
        let outdated = stored_version < CATALOG_VERSION;
        if outdated {
            info!(from = stored_version, to = CATALOG_VERSION, "migrating achievement catalog");
        } else if stored_version > CATALOG_VERSION {
            warn!(
                stored = stored_version,
                known = CATALOG_VERSION,
                "progress was saved by a newer catalog"
            );
        }

        let mut seen = std::collections::HashSet::new();
        self.achievements.retain(|a| seen.insert(a.id.clone()));

        for def in ACHIEVEMENTS {
            match self.achievements.iter_mut().find(|a| a.id == def.id) {
                Some(existing) if outdated || existing.title.is_empty() => {
                    existing.title = def.title.to_string();
                    existing.description = def.description.to_string();
                    existing.icon = def.icon.to_string();
                    existing.max_progress = def.max_progress;
                }
                Some(_) => {}
                None => self.achievements.push(Achievement::locked(def)),
            }
        }
        // stable sort keeps unknown ids in their stored order at the end
        self.achievements.sort_by_key(|a| catalog_index(&a.id));

        if !self.inventory.owns_theme(Theme::Neon) {
            self.inventory.unlocked_themes.insert(0, Theme::Neon);
        }
        self.catalog_version = stored_version.max(CATALOG_VERSION);
        self
    }

    pub fn achievement(&self, id: &str) -> Option<&Achievement> {
        self.achievements.iter().find(|a| a.id == id)
    }

    pub fn unlocked_count(&self) -> usize {
        self.achievements.iter().filter(|a| a.unlocked).count()
    }
}

/// Accepts integers or floats (older records stored fractional seconds).
/// Null, negative and non-numeric values count as 0.
fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let number = match value {
        Some(serde_json::Value::Number(n)) if n.is_u64() => return Ok(n.as_u64().unwrap_or(0)),
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match number {
        Some(n) if n.is_finite() && n > 0.0 => Ok(n.floor() as u64),
        _ => Ok(0),
    }
}

/// Keeps the themes this build knows and drops the rest, so a theme added
/// by another client does not make the whole record unreadable.
fn known_themes<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Theme>, D::Error> {
    let Some(raw) = Option::<Vec<serde_json::Value>>::deserialize(deserializer)? else {
        return Ok(Inventory::default().unlocked_themes);
    };
    let mut themes = Vec::with_capacity(raw.len());
    for value in raw {
        match serde_json::from_value::<Theme>(value.clone()) {
            Ok(theme) if !themes.contains(&theme) => themes.push(theme),
            Ok(_) => {}
            Err(_) => warn!(theme = %value, "dropping unknown theme from inventory"),
        }
    }
    Ok(themes)
}

/// Calendar date stored as `YYYY-MM-DD`; also reads the `Wed Oct 14 2026`
/// form and treats empty or unreadable strings as never played.
mod played_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const ISO: &str = "%Y-%m-%d";
    const LEGACY: &str = "%a %b %d %Y";

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&d.format(ISO).to_string()),
            None => s.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(d)?.unwrap_or_default();
        Ok(parse(raw.trim()))
    }

    pub fn parse(raw: &str) -> Option<NaiveDate> {
        if raw.is_empty() {
            return None;
        }
        NaiveDate::parse_from_str(raw, ISO)
            .or_else(|_| NaiveDate::parse_from_str(raw, LEGACY))
            .ok()
    }
}
