//! End-of-session transform over the player's long-lived record.
//!
//! [`ProgressionEngine::apply`] is pure apart from the instant it is handed:
//! the same progress, stats and `now` always produce the same outcome.

use chrono::{DateTime, Local, NaiveDate, Utc};
use tracing::info;

use crate::achievements::RuleTable;
use crate::progress::{Achievement, PlayerProgress};
use crate::types::SessionStats;

/// Items collected during play by something other than the stimulus engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideCounters {
    pub golden_numbers: u32,
    pub power_ups: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionOutcome {
    pub progress: PlayerProgress,
    /// In catalog order
    pub newly_unlocked: Vec<Achievement>,
    pub coins_earned: u64,
}

/// `score/100 + (maxCombo/10)*5 + golden*10 + 50 if accuracy >= 90%`
pub fn coins_for(stats: &SessionStats, golden_numbers: u32) -> u64 {
    let base = u64::from(stats.score / 100);
    let combo_bonus = u64::from(stats.max_combo / 10) * 5;
    let golden_bonus = u64::from(golden_numbers) * 10;
    let accuracy_bonus = if stats.accuracy >= 0.9 { 50 } else { 0 };
    base + combo_bonus + golden_bonus + accuracy_bonus
}

/// Streak after playing on `today`. Same day keeps it, the day after
/// extends it, anything else (including never played) restarts at 1.
pub fn next_streak(streak: u32, last_played: Option<NaiveDate>, today: NaiveDate) -> u32 {
    match last_played {
        Some(last) if last == today => streak,
        Some(last) if today.pred_opt() == Some(last) => streak.saturating_add(1),
        _ => 1,
    }
}

#[derive(Debug, Default)]
pub struct ProgressionEngine {
    rules: RuleTable,
}

impl ProgressionEngine {
    pub fn new() -> Self {
        Self {
            rules: RuleTable::standard(),
        }
    }

    pub fn with_rules(rules: RuleTable) -> Self {
        Self { rules }
    }

    pub fn apply_now(
        &self,
        progress: PlayerProgress,
        stats: &SessionStats,
        side: SideCounters,
    ) -> ProgressionOutcome {
        self.apply(progress, stats, side, Local::now())
    }

    pub fn apply(
        &self,
        progress: PlayerProgress,
        stats: &SessionStats,
        side: SideCounters,
        now: DateTime<Local>,
    ) -> ProgressionOutcome {
        let mut progress = progress.migrate();

        let today = now.date_naive();
        progress.daily_streak = next_streak(progress.daily_streak, progress.last_played_date, today);
        progress.last_played_date = Some(today);

        let coins_earned = coins_for(stats, side.golden_numbers);

        // stored counters come from disk and may already sit at the maximum
        progress.total_score = progress.total_score.saturating_add(u64::from(stats.score));
        progress.total_games_played = progress.total_games_played.saturating_add(1);
        progress.total_hits = progress.total_hits.saturating_add(u64::from(stats.hits));
        progress.best_combo = progress.best_combo.max(stats.max_combo);
        progress.best_score = progress.best_score.max(stats.score);
        progress.golden_numbers_hit = progress
            .golden_numbers_hit
            .saturating_add(u64::from(side.golden_numbers));
        progress.power_ups_collected = progress
            .power_ups_collected
            .saturating_add(u64::from(side.power_ups));
        progress.coins = progress.coins.saturating_add(coins_earned);
        progress.total_coins_earned = progress.total_coins_earned.saturating_add(coins_earned);

        let newly_unlocked = self.evaluate_achievements(&mut progress, stats, now.with_timezone(&Utc));
        for achievement in &newly_unlocked {
            info!(id = %achievement.id, title = %achievement.title, "achievement unlocked");
        }

        ProgressionOutcome {
            progress,
            newly_unlocked,
            coins_earned,
        }
    }

    /// Runs every locked achievement's rule against the updated record.
    /// Unlocked ones are never touched again.
    fn evaluate_achievements(
        &self,
        progress: &mut PlayerProgress,
        stats: &SessionStats,
        now: DateTime<Utc>,
    ) -> Vec<Achievement> {
        // rules read the post-update record, so evaluate against a snapshot
        let snapshot = progress.clone();
        let mut newly_unlocked = Vec::new();

        for achievement in progress.achievements.iter_mut().filter(|a| !a.unlocked) {
            let Some(eval) = self.rules.evaluate(&achievement.id, stats, &snapshot) else {
                continue;
            };
            achievement.progress = achievement.progress.max(eval.progress);
            if eval.unlocked {
                achievement.unlocked = true;
                achievement.unlocked_at = Some(now);
                newly_unlocked.push(achievement.clone());
            }
        }
        newly_unlocked
    }
}
