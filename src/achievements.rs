//! Achievement catalog and the rules that unlock each entry.
//!
//! The catalog is plain data. Rules live in a [`RuleTable`] keyed by
//! achievement id, built once and handed to the progression engine.

use std::collections::HashMap;
use std::fmt;

use crate::progress::PlayerProgress;
use crate::types::{GameMode, SessionStats};

/// Bump when entries are added so stored progress gets default-filled on load
pub const CATALOG_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AchievementDef {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub max_progress: u64,
}

const fn def(
    id: &'static str,
    title: &'static str,
    description: &'static str,
    icon: &'static str,
    max_progress: u64,
) -> AchievementDef {
    AchievementDef {
        id,
        title,
        description,
        icon,
        max_progress,
    }
}

pub const ACHIEVEMENTS: &[AchievementDef] = &[
    // score
    def("first-blood", "First Blood", "Score your first points", "🎯", 1),
    def("scorer", "Rising Star", "Score 1,000 points in a game", "⭐", 1000),
    def("high-scorer", "Pro Player", "Score 5,000 points in a game", "💫", 5000),
    def("master-scorer", "Master", "Score 10,000 points in a game", "🏆", 10000),
    def("legend", "Legend", "Score 20,000 points in a game", "👑", 20000),
    // combo
    def("combo-starter", "Combo Starter", "Get a 5x combo", "🔥", 5),
    def("combo-master", "Combo Master", "Get a 10x combo", "⚡", 10),
    def("unstoppable", "Unstoppable", "Get a 20x combo", "💥", 20),
    def("godlike", "Godlike", "Get a 30x combo", "🌟", 30),
    // accuracy
    def("sharpshooter", "Sharpshooter", "Finish with 90%+ accuracy", "🎪", 90),
    def("perfect-game", "Perfect Game", "Finish with 100% accuracy", "💯", 100),
    // daily streak
    def("dedicated", "Dedicated", "Play 3 days in a row", "📅", 3),
    def("committed", "Committed", "Play 7 days in a row", "📆", 7),
    def("unstoppable-streak", "Unstoppable", "Play 14 days in a row", "🔥", 14),
    def("legendary-streak", "Legendary Streak", "Play 30 days in a row", "👑", 30),
    // games played
    def("beginner", "Getting Started", "Play 5 games", "🎮", 5),
    def("regular", "Regular Player", "Play 25 games", "🎯", 25),
    def("veteran", "Veteran", "Play 100 games", "⚔️", 100),
    def("addict", "Addicted", "Play 500 games", "🎲", 500),
    // special
    def("golden-touch", "Golden Touch", "Collect 10 golden numbers", "✨", 10),
    def("power-collector", "Power Collector", "Collect 20 power-ups", "⚡", 20),
    def("speed-demon", "Speed Demon", "Score 100+ hits in a game", "💨", 100),
    def("survivor", "Survivor", "Last 60 seconds in practice mode", "🛡️", 60),
];

pub fn find_def(id: &str) -> Option<&'static AchievementDef> {
    ACHIEVEMENTS.iter().find(|d| d.id == id)
}

/// Position in the catalog; unknown ids sort after every known one
pub fn catalog_index(id: &str) -> usize {
    ACHIEVEMENTS
        .iter()
        .position(|d| d.id == id)
        .unwrap_or(ACHIEVEMENTS.len())
}

/// Result of one rule: candidate progress value and whether the goal is met
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub progress: u64,
    pub unlocked: bool,
}

/// `None` means the rule does not apply to this session
pub type Predicate = Box<dyn Fn(&SessionStats, &PlayerProgress) -> Option<Evaluation> + Send + Sync>;

/// Session metric compared against a threshold
fn session_metric(metric: fn(&SessionStats) -> u64, threshold: u64) -> Predicate {
    Box::new(move |stats: &SessionStats, _: &PlayerProgress| {
        let value = metric(stats);
        Some(Evaluation {
            progress: value,
            unlocked: value >= threshold,
        })
    })
}

/// Lifetime counter read from already-updated progress
fn lifetime_counter(counter: fn(&PlayerProgress) -> u64, threshold: u64) -> Predicate {
    Box::new(move |_: &SessionStats, progress: &PlayerProgress| {
        let value = counter(progress);
        Some(Evaluation {
            progress: value,
            unlocked: value >= threshold,
        })
    })
}

pub struct RuleTable {
    rules: HashMap<&'static str, Predicate>,
}

impl RuleTable {
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    pub fn register(&mut self, id: &'static str, predicate: Predicate) {
        self.rules.insert(id, predicate);
    }

    pub fn get(&self, id: &str) -> Option<&Predicate> {
        self.rules.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rules.contains_key(id)
    }

    /// Runs the rule for `id`; ids without a rule evaluate to `None`
    pub fn evaluate(
        &self,
        id: &str,
        stats: &SessionStats,
        progress: &PlayerProgress,
    ) -> Option<Evaluation> {
        self.get(id).and_then(|rule| rule(stats, progress))
    }

    pub fn standard() -> Self {
        let score = |s: &SessionStats| u64::from(s.score);
        let combo = |s: &SessionStats| u64::from(s.max_combo);
        let streak = |p: &PlayerProgress| u64::from(p.daily_streak);
        let games = |p: &PlayerProgress| p.total_games_played;

        let mut table = Self::empty();
        table.register("first-blood", session_metric(|s| u64::from(s.score > 0), 1));
        table.register("scorer", session_metric(score, 1000));
        table.register("high-scorer", session_metric(score, 5000));
        table.register("master-scorer", session_metric(score, 10000));
        table.register("legend", session_metric(score, 20000));

        table.register("combo-starter", session_metric(combo, 5));
        table.register("combo-master", session_metric(combo, 10));
        table.register("unstoppable", session_metric(combo, 20));
        table.register("godlike", session_metric(combo, 30));

        table.register(
            "sharpshooter",
            Box::new(|stats: &SessionStats, _: &PlayerProgress| {
                Some(Evaluation {
                    progress: stats.accuracy_percent(),
                    unlocked: stats.accuracy >= 0.9,
                })
            }),
        );
        // a session with no taps has accuracy 0, but guard the 0/0 case explicitly
        table.register(
            "perfect-game",
            Box::new(|stats: &SessionStats, _: &PlayerProgress| {
                Some(Evaluation {
                    progress: stats.accuracy_percent(),
                    unlocked: stats.accuracy >= 1.0 && stats.hits > 0,
                })
            }),
        );

        table.register("dedicated", lifetime_counter(streak, 3));
        table.register("committed", lifetime_counter(streak, 7));
        table.register("unstoppable-streak", lifetime_counter(streak, 14));
        table.register("legendary-streak", lifetime_counter(streak, 30));

        table.register("beginner", lifetime_counter(games, 5));
        table.register("regular", lifetime_counter(games, 25));
        table.register("veteran", lifetime_counter(games, 100));
        table.register("addict", lifetime_counter(games, 500));

        table.register("golden-touch", lifetime_counter(|p| p.golden_numbers_hit, 10));
        table.register("power-collector", lifetime_counter(|p| p.power_ups_collected, 20));
        table.register("speed-demon", session_metric(|s| u64::from(s.hits), 100));
        table.register(
            "survivor",
            Box::new(|stats: &SessionStats, _: &PlayerProgress| {
                (stats.mode == GameMode::Practice).then(|| {
                    let secs = u64::from(stats.duration_secs);
                    Evaluation {
                        progress: secs,
                        unlocked: secs >= 60,
                    }
                })
            }),
        );
        table
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for RuleTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.rules.keys().collect();
        ids.sort();
        f.debug_struct("RuleTable").field("ids", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Difficulty;
    use chrono::Utc;
    use std::collections::HashSet;

    fn stats(score: u32, hits: u32, misses: u32, mode: GameMode, secs: u32) -> SessionStats {
        SessionStats {
            score,
            max_combo: hits,
            hits,
            misses,
            accuracy: SessionStats::accuracy_of(hits, misses),
            difficulty: Difficulty::Medium,
            mode,
            timestamp: Utc::now(),
            duration_secs: secs,
        }
    }

    #[test]
    fn catalog_ids_are_unique() {
        let ids: HashSet<_> = ACHIEVEMENTS.iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), ACHIEVEMENTS.len());
        assert_eq!(ACHIEVEMENTS.len(), 23);
    }

    #[test]
    fn every_catalog_entry_has_a_rule() {
        let table = RuleTable::standard();
        for def in ACHIEVEMENTS {
            assert!(table.contains(def.id), "missing rule for {}", def.id);
        }
    }

    #[test]
    fn perfect_game_needs_at_least_one_hit() {
        let table = RuleTable::standard();
        let progress = PlayerProgress::default();

        let empty = stats(0, 0, 0, GameMode::Timed, 30);
        let eval = table.evaluate("perfect-game", &empty, &progress).unwrap();
        assert!(!eval.unlocked);
        assert_eq!(eval.progress, 0);

        let flawless = stats(500, 5, 0, GameMode::Timed, 30);
        assert!(table.evaluate("perfect-game", &flawless, &progress).unwrap().unlocked);
    }

    #[test]
    fn sharpshooter_uses_raw_accuracy() {
        let table = RuleTable::standard();
        let progress = PlayerProgress::default();
        let mut almost = stats(100, 179, 21, GameMode::Timed, 30);
        almost.accuracy = 0.898;

        let eval = table.evaluate("sharpshooter", &almost, &progress).unwrap();
        assert_eq!(eval.progress, 90);
        assert!(!eval.unlocked);
    }

    #[test]
    fn survivor_only_counts_practice() {
        let table = RuleTable::standard();
        let progress = PlayerProgress::default();

        let timed = stats(0, 0, 0, GameMode::Timed, 90);
        assert!(table.evaluate("survivor", &timed, &progress).is_none());

        let short = stats(0, 0, 0, GameMode::Practice, 59);
        assert_eq!(
            table.evaluate("survivor", &short, &progress),
            Some(Evaluation {
                progress: 59,
                unlocked: false
            })
        );

        let long = stats(0, 0, 0, GameMode::Practice, 61);
        assert!(table.evaluate("survivor", &long, &progress).unwrap().unlocked);
    }

    #[test]
    fn lifetime_rules_read_progress() {
        let table = RuleTable::standard();
        let progress = PlayerProgress {
            daily_streak: 7,
            total_games_played: 4,
            ..PlayerProgress::default()
        };
        let s = stats(0, 0, 0, GameMode::Timed, 30);

        assert!(table.evaluate("committed", &s, &progress).unwrap().unlocked);
        assert!(!table.evaluate("unstoppable-streak", &s, &progress).unwrap().unlocked);
        assert_eq!(table.evaluate("beginner", &s, &progress).unwrap().progress, 4);
    }

    #[test]
    fn unknown_id_is_a_no_op() {
        let table = RuleTable::standard();
        let s = stats(100, 1, 0, GameMode::Timed, 30);
        assert!(table
            .evaluate("not-a-real-achievement", &s, &PlayerProgress::default())
            .is_none());
        assert_eq!(catalog_index("not-a-real-achievement"), ACHIEVEMENTS.len());
    }
}
