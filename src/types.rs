use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Digits the player is supposed to tap on
pub const TARGET_DIGITS: [u8; 2] = [6, 7];

/// Length of a timed session in clock ticks
pub const TIMED_SESSION_SECS: u32 = 30;

pub const CLOCK_TICK_MS: u64 = 1000;

/// Applied once per spawn tick, independent of the interval length
pub const TARGET_PROBABILITY_DECREMENT: f64 = 0.005;

/// Immediate interval shrink awarded on every correct tap
pub const HIT_SPEEDUP_MS: f64 = 15.0;

pub const FEEDBACK_LIFETIME_MS: u64 = 500;

pub const HIT_BASE_POINTS: u32 = 100;
pub const MISS_PENALTY: u32 = 50;

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// Pacing parameters for one difficulty level. Read-only for the whole session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyConfig {
    pub initial_interval_ms: f64,
    pub min_interval_ms: f64,
    /// Per spawn tick decay factor, compounding
    pub speed_multiplier: f64,
    pub target_probability_start: f64,
    pub target_probability_min: f64,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub const fn config(self) -> DifficultyConfig {
        match self {
            Difficulty::Easy => DifficultyConfig {
                initial_interval_ms: 1200.0,
                min_interval_ms: 500.0,
                speed_multiplier: 0.985,
                target_probability_start: 0.6,
                target_probability_min: 0.45,
            },
            Difficulty::Medium => DifficultyConfig {
                initial_interval_ms: 1000.0,
                min_interval_ms: 350.0,
                speed_multiplier: 0.98,
                target_probability_start: 0.5,
                target_probability_min: 0.3,
            },
            Difficulty::Hard => DifficultyConfig {
                initial_interval_ms: 800.0,
                min_interval_ms: 250.0,
                speed_multiplier: 0.975,
                target_probability_start: 0.4,
                target_probability_min: 0.2,
            },
        }
    }
}

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GameMode {
    /// Counts down from [`TIMED_SESSION_SECS`] and ends on its own
    #[default]
    Timed,
    /// Counts up until the player quits
    Practice,
}

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "lowercase")]
pub enum Theme {
    #[default]
    Neon,
    Sunset,
    Ocean,
    Forest,
    Golden,
}

/// One displayed digit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stimulus {
    pub value: u8,
    pub is_target: bool,
    pub id: u64,
}

/// Final record of a session, produced exactly once at termination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub score: u32,
    pub max_combo: u32,
    pub hits: u32,
    pub misses: u32,
    pub accuracy: f64,
    pub difficulty: Difficulty,
    pub mode: GameMode,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Clock ticks elapsed while the session was running
    #[serde(default)]
    pub duration_secs: u32,
}

impl SessionStats {
    /// hits / (hits + misses), or 0 when nothing was tapped
    pub fn accuracy_of(hits: u32, misses: u32) -> f64 {
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            f64::from(hits) / f64::from(total)
        }
    }

    /// Accuracy as a rounded whole percentage
    pub fn accuracy_percent(&self) -> u64 {
        (self.accuracy * 100.0).round().max(0.0) as u64
    }
}
