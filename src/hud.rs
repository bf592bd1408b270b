use crate::engine::{EngineHost, Feedback};
use crate::types::{SessionStats, Stimulus};

/// Everything the engine has told its host, kept for drawing the screen
#[derive(Debug, Default, Clone)]
pub struct Hud {
    pub stimulus: Option<Stimulus>,
    pub score: u32,
    pub combo: u32,
    pub feedback: Option<Feedback>,
    pub feedback_history: Vec<String>,
    pub clock: u32,
    pub stimuli_shown: u32,
    pub ended: Vec<SessionStats>,
}

impl Hud {
    /// Takes the most recent finished session, if any
    pub fn take_ended(&mut self) -> Option<SessionStats> {
        let stats = self.ended.pop();
        self.ended.clear();
        stats
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl EngineHost for Hud {
    fn on_stimulus_changed(&mut self, stimulus: Option<&Stimulus>) {
        self.stimulus = stimulus.copied();
        if stimulus.is_some() {
            self.stimuli_shown += 1;
        }
    }

    fn on_score_changed(&mut self, score: u32) {
        self.score = score;
    }

    fn on_combo_changed(&mut self, combo: u32) {
        self.combo = combo;
    }

    fn on_transient_feedback(&mut self, feedback: Option<&Feedback>) {
        if let Some(f) = feedback {
            self.feedback_history.push(f.text.clone());
        }
        self.feedback = feedback.cloned();
    }

    fn on_clock(&mut self, seconds: u32) {
        self.clock = seconds;
    }

    fn on_session_ended(&mut self, stats: &SessionStats) {
        self.ended.push(stats.clone());
    }
}
