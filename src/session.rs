use chrono::{DateTime, Utc};

use crate::types::{
    Difficulty, DifficultyConfig, GameMode, SessionStats, Stimulus, HIT_BASE_POINTS,
    HIT_SPEEDUP_MS, MISS_PENALTY, TARGET_PROBABILITY_DECREMENT, TIMED_SESSION_SECS,
};

/// Step multiplier: +1 for every 5 consecutive hits, capped at 5x
pub fn combo_multiplier(combo: u32) -> u32 {
    (combo / 5 + 1).min(5)
}

/// Live counters of one run. Owned by the stimulus engine for the whole session.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub difficulty: Difficulty,
    pub mode: GameMode,
    pub config: DifficultyConfig,
    pub score: u32,
    pub combo: u32,
    pub max_combo: u32,
    pub hits: u32,
    pub misses: u32,
    pub interval_ms: f64,
    pub target_probability: f64,
    pub current: Option<Stimulus>,
    pub has_responded_to_current: bool,
    pub is_running: bool,
    pub is_paused: bool,
    pub seconds_remaining: u32,
    pub elapsed_secs: u32,
    pub spawned: u32,
}

impl SessionState {
    pub fn new(difficulty: Difficulty, mode: GameMode) -> Self {
        let config = difficulty.config();
        Self {
            difficulty,
            mode,
            config,
            score: 0,
            combo: 0,
            max_combo: 0,
            hits: 0,
            misses: 0,
            interval_ms: config.initial_interval_ms,
            target_probability: config.target_probability_start,
            current: None,
            has_responded_to_current: false,
            is_running: true,
            is_paused: false,
            seconds_remaining: TIMED_SESSION_SECS,
            elapsed_secs: 0,
            spawned: 0,
        }
    }

    /// Value shown on the session timer
    pub fn clock_display(&self) -> u32 {
        match self.mode {
            GameMode::Timed => self.seconds_remaining,
            GameMode::Practice => self.elapsed_secs,
        }
    }

    pub fn can_accept_tap(&self) -> bool {
        self.is_running && !self.is_paused && !self.has_responded_to_current && self.current.is_some()
    }

    /// Scores a correct tap and returns the points awarded
    pub fn register_hit(&mut self) -> u32 {
        let points = HIT_BASE_POINTS * combo_multiplier(self.combo);
        self.score = self.score.saturating_add(points);
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
        self.hits += 1;
        self.interval_ms = (self.interval_ms - HIT_SPEEDUP_MS).max(self.config.min_interval_ms);
        points
    }

    pub fn register_miss(&mut self) {
        self.score = self.score.saturating_sub(MISS_PENALTY);
        self.combo = 0;
        self.misses += 1;
    }

    /// Drops the current stimulus. Returns true when an unanswered target broke a live combo.
    pub fn expire_current(&mut self) -> bool {
        let unanswered_target = matches!(self.current, Some(s) if s.is_target)
            && !self.has_responded_to_current;
        self.current = None;
        if unanswered_target && self.combo > 0 {
            self.combo = 0;
            return true;
        }
        false
    }

    /// Per spawn tick pacing: geometric interval decay and linear probability decay
    pub fn decay(&mut self) {
        self.interval_ms =
            (self.interval_ms * self.config.speed_multiplier).max(self.config.min_interval_ms);
        self.target_probability = (self.target_probability - TARGET_PROBABILITY_DECREMENT)
            .max(self.config.target_probability_min);
    }

    pub fn install(&mut self, stimulus: Stimulus) {
        self.current = Some(stimulus);
        self.has_responded_to_current = false;
        self.spawned += 1;
    }

    pub fn accuracy(&self) -> f64 {
        SessionStats::accuracy_of(self.hits, self.misses)
    }

    pub fn to_stats(&self, timestamp: DateTime<Utc>) -> SessionStats {
        SessionStats {
            score: self.score,
            max_combo: self.max_combo,
            hits: self.hits,
            misses: self.misses,
            accuracy: self.accuracy(),
            difficulty: self.difficulty,
            mode: self.mode,
            timestamp,
            duration_secs: self.elapsed_secs,
        }
    }
}
