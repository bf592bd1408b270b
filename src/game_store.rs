//! Typed access to everything the game persists.
//!
//! Storage faults never escape this module: reads fall back to defaults and
//! failed writes are logged and dropped, so a broken disk costs the player
//! their history but never their session.

use chrono::{DateTime, Local};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{ConfigStore, Settings};
use crate::progress::PlayerProgress;
use crate::progression::{ProgressionEngine, ProgressionOutcome, SideCounters};
use crate::storage::{KeyValueStore, StoreError};
use crate::types::{GameMode, SessionStats};

pub const SETTINGS_KEY: &str = "6-7-tap-settings";
pub const HISTORY_KEY: &str = "6-7-tap-history";
pub const HIGH_SCORE_KEY: &str = "6-7-tap-highscore";
pub const PROGRESS_KEY: &str = "6-7-tap-progress";
/// Unreadable progress blobs are copied here, suffixed with a millisecond timestamp
pub const PROGRESS_BACKUP_PREFIX: &str = "6-7-tap-progress-backup-";

pub const HISTORY_LIMIT: usize = 20;

/// Most recent sessions, newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionHistory {
    pub games: Vec<SessionStats>,
    pub total_games_played: u64,
}

impl SessionHistory {
    pub fn push(&mut self, stats: SessionStats) {
        self.games.insert(0, stats);
        self.games.truncate(HISTORY_LIMIT);
        self.total_games_played = self.total_games_played.saturating_add(1);
    }
}

/// Result of wrapping up a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub outcome: ProgressionOutcome,
    pub high_score: u32,
    pub new_high_score: bool,
}

#[derive(Debug)]
pub struct GameStore<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> GameStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.store.get(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw)
    }

    fn read_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.read(key) {
            Ok(value) => value.unwrap_or_default(),
            Err(err) => {
                warn!(key, %err, "failed to load, using defaults");
                T::default()
            }
        }
    }

    fn write_logged<T: Serialize>(&mut self, key: &str, value: &T) {
        if let Err(err) = self.write(key, value) {
            warn!(key, %err, "failed to save");
        }
    }

    pub fn history(&self) -> SessionHistory {
        self.read_or_default(HISTORY_KEY)
    }

    pub fn record_session(&mut self, stats: &SessionStats) {
        let mut history = self.history();
        history.push(stats.clone());
        self.write_logged(HISTORY_KEY, &history);
    }

    pub fn high_score(&self) -> u32 {
        let raw = match self.store.get(HIGH_SCORE_KEY) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key = HIGH_SCORE_KEY, %err, "failed to load high score");
                return 0;
            }
        };
        let Some(raw) = raw else {
            return 0;
        };
        raw.trim().parse().unwrap_or_else(|_| {
            let err = StoreError::Corrupt {
                key: HIGH_SCORE_KEY.to_string(),
                reason: format!("{raw:?} is not an integer"),
            };
            warn!(%err, "ignoring stored high score");
            0
        })
    }

    /// Only timed sessions compete for the high score. Returns true on a new record.
    pub fn submit_high_score(&mut self, stats: &SessionStats) -> bool {
        if stats.mode != GameMode::Timed || stats.score <= self.high_score() {
            return false;
        }
        if let Err(err) = self.store.set(HIGH_SCORE_KEY, &stats.score.to_string()) {
            warn!(key = HIGH_SCORE_KEY, %err, "failed to save high score");
        }
        true
    }

    /// Stored progress brought up to the current catalog, or defaults for display
    /// when it cannot be read
    pub fn progress(&self) -> PlayerProgress {
        self.read_or_default::<PlayerProgress>(PROGRESS_KEY).migrate()
    }

    /// Like `progress`, but reports an unreadable record instead of hiding it.
    /// Callers that write progress back must use this.
    pub fn load_progress(&self) -> Result<PlayerProgress, StoreError> {
        let stored: Option<PlayerProgress> = self.read(PROGRESS_KEY)?;
        Ok(stored.unwrap_or_default().migrate())
    }

    /// Copies the raw progress blob aside. Returns false when the original
    /// could not be read or the copy failed, in which case it must not be
    /// overwritten.
    fn back_up_progress(&mut self, now: DateTime<Local>) -> bool {
        let raw = match self.store.get(PROGRESS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return true,
            Err(err) => {
                warn!(key = PROGRESS_KEY, %err, "cannot read progress for backup");
                return false;
            }
        };
        let backup_key = format!("{PROGRESS_BACKUP_PREFIX}{}", now.timestamp_millis());
        match self.store.set(&backup_key, &raw) {
            Ok(()) => {
                warn!(key = PROGRESS_KEY, backup = %backup_key, "unreadable progress backed up");
                true
            }
            Err(err) => {
                warn!(key = PROGRESS_KEY, backup = %backup_key, %err, "progress backup failed");
                false
            }
        }
    }

    pub fn save_progress(&mut self, progress: &PlayerProgress) {
        self.write_logged(PROGRESS_KEY, progress);
    }

    /// Everything that happens once a session is over: history, high score,
    /// progression and persistence of the new progress.
    pub fn conclude_session(
        &mut self,
        engine: &ProgressionEngine,
        stats: &SessionStats,
        side: SideCounters,
        now: DateTime<Local>,
    ) -> SessionReport {
        let previous_high = self.high_score();
        let new_high_score = self.submit_high_score(stats);
        self.record_session(stats);

        let (previous, writable) = match self.load_progress() {
            Ok(progress) => (progress, true),
            Err(err) => {
                warn!(key = PROGRESS_KEY, %err, "stored progress is unreadable");
                (PlayerProgress::default(), self.back_up_progress(now))
            }
        };
        let outcome = engine.apply(previous, stats, side, now);
        if writable {
            self.save_progress(&outcome.progress);
        } else {
            warn!(key = PROGRESS_KEY, "leaving stored progress untouched, this session is not saved");
        }
        debug!(
            coins = outcome.coins_earned,
            unlocked = outcome.newly_unlocked.len(),
            new_high_score,
            "session concluded"
        );

        SessionReport {
            high_score: if new_high_score {
                stats.score
            } else {
                previous_high
            },
            new_high_score,
            outcome,
        }
    }
}

impl<S: KeyValueStore> ConfigStore for GameStore<S> {
    fn load(&self) -> Settings {
        self.read_or_default(SETTINGS_KEY)
    }

    fn save(&mut self, settings: &Settings) -> Result<(), StoreError> {
        self.write(SETTINGS_KEY, settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::types::Difficulty;
    use chrono::{TimeZone, Utc};

    fn stats(score: u32, mode: GameMode) -> SessionStats {
        SessionStats {
            score,
            max_combo: 3,
            hits: 4,
            misses: 1,
            accuracy: 0.8,
            difficulty: Difficulty::Medium,
            mode,
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_000).unwrap(),
            duration_secs: 30,
        }
    }

    fn noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn history_is_newest_first_and_capped() {
        let mut store = GameStore::new(MemoryStore::new());
        for score in 0..25 {
            store.record_session(&stats(score, GameMode::Timed));
        }
        let history = store.history();
        assert_eq!(history.games.len(), HISTORY_LIMIT);
        assert_eq!(history.games[0].score, 24);
        assert_eq!(history.games[HISTORY_LIMIT - 1].score, 5);
        assert_eq!(history.total_games_played, 25);
    }

    #[test]
    fn high_score_only_from_timed_sessions() {
        let mut store = GameStore::new(MemoryStore::new());
        assert!(!store.submit_high_score(&stats(9000, GameMode::Practice)));
        assert_eq!(store.high_score(), 0);

        assert!(store.submit_high_score(&stats(1200, GameMode::Timed)));
        assert!(!store.submit_high_score(&stats(1200, GameMode::Timed)));
        assert!(!store.submit_high_score(&stats(800, GameMode::Timed)));
        assert_eq!(store.high_score(), 1200);
    }

    #[test]
    fn corrupt_values_fall_back_to_defaults() {
        let mut raw = MemoryStore::new();
        raw.set(HIGH_SCORE_KEY, "lots").unwrap();
        raw.set(PROGRESS_KEY, "{not json").unwrap();
        raw.set(SETTINGS_KEY, "{oops").unwrap();
        let store = GameStore::new(raw);

        assert_eq!(store.high_score(), 0);
        assert_eq!(store.progress(), PlayerProgress::default());
        assert_eq!(store.load(), Settings::default());
    }

    #[test]
    fn unreadable_store_yields_defaults() {
        let store = GameStore::new(MemoryStore::new().failing_reads());
        assert_eq!(store.history(), SessionHistory::default());
        assert_eq!(store.high_score(), 0);
        assert_eq!(store.progress(), PlayerProgress::default());
    }

    #[test]
    fn failed_writes_do_not_abort_conclusion() {
        let mut store = GameStore::new(MemoryStore::new().failing_writes());
        let engine = ProgressionEngine::new();
        let report = store.conclude_session(
            &engine,
            &stats(1500, GameMode::Timed),
            SideCounters::default(),
            noon(),
        );
        assert_eq!(report.outcome.coins_earned, 15);
        assert!(report.new_high_score);
        assert_eq!(report.high_score, 1500);
        assert!(store.inner().is_empty());
    }

    #[test]
    fn conclusion_persists_progress() {
        let mut store = GameStore::new(MemoryStore::new());
        let engine = ProgressionEngine::new();
        let report = store.conclude_session(
            &engine,
            &stats(1500, GameMode::Timed),
            SideCounters::default(),
            noon(),
        );

        let reloaded = store.progress();
        assert_eq!(reloaded, report.outcome.progress);
        assert_eq!(reloaded.total_games_played, 1);
        assert_eq!(reloaded.coins, 15);
        assert_eq!(store.history().games.len(), 1);
    }

    #[test]
    fn progress_from_a_newer_client_survives_a_session() {
        let mut raw = MemoryStore::new();
        raw.set(
            PROGRESS_KEY,
            r#"{"coins":9000,"totalGamesPlayed":40,"inventory":{"unlockedThemes":["NEON","RAINBOW"]}}"#,
        )
        .unwrap();
        let mut store = GameStore::new(raw);
        let report = store.conclude_session(
            &ProgressionEngine::new(),
            &stats(1500, GameMode::Timed),
            SideCounters::default(),
            noon(),
        );

        let progress = report.outcome.progress;
        assert_eq!(progress.total_games_played, 41);
        assert!(progress.coins >= 9000);
        assert_eq!(store.progress(), progress);
    }

    #[test]
    fn unreadable_progress_is_backed_up_before_saving() {
        let blob = r#"{"coins":9000,"achievements":"nope"}"#;
        let mut raw = MemoryStore::new();
        raw.set(PROGRESS_KEY, blob).unwrap();
        let mut store = GameStore::new(raw);
        assert!(store.load_progress().is_err());

        store.conclude_session(
            &ProgressionEngine::new(),
            &stats(1500, GameMode::Timed),
            SideCounters::default(),
            noon(),
        );

        let backup_key = format!("{PROGRESS_BACKUP_PREFIX}{}", noon().timestamp_millis());
        assert_eq!(store.inner().get(&backup_key).unwrap().as_deref(), Some(blob));
        assert_eq!(store.load_progress().unwrap().total_games_played, 1);
    }

    /// Accepts every write except backups
    struct NoBackups(MemoryStore);

    impl KeyValueStore for NoBackups {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.0.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
            if key.starts_with(PROGRESS_BACKUP_PREFIX) {
                return Err(StoreError::Unavailable("disk full".to_string()));
            }
            self.0.set(key, value)
        }
    }

    #[test]
    fn unreadable_progress_is_not_overwritten_when_backup_fails() {
        let blob = "{not json";
        let mut raw = MemoryStore::new();
        raw.set(PROGRESS_KEY, blob).unwrap();
        let mut store = GameStore::new(NoBackups(raw));

        let report = store.conclude_session(
            &ProgressionEngine::new(),
            &stats(1500, GameMode::Timed),
            SideCounters::default(),
            noon(),
        );
        assert_eq!(report.outcome.progress.total_games_played, 1);
        assert_eq!(store.inner().get(PROGRESS_KEY).unwrap().as_deref(), Some(blob));
        assert_eq!(store.history().games.len(), 1);
    }

    #[test]
    fn settings_round_trip() {
        let mut store = GameStore::new(MemoryStore::new());
        let settings = Settings {
            difficulty: Difficulty::Easy,
            sound_enabled: false,
            theme: crate::types::Theme::Forest,
        };
        store.save(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }
}
