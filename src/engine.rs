use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};

use crate::scheduler::{Scheduler, Timer, TimerKind};
use crate::session::SessionState;
use crate::types::{
    Difficulty, GameMode, SessionStats, Stimulus, CLOCK_TICK_MS, FEEDBACK_LIFETIME_MS,
    TARGET_DIGITS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackCategory {
    Hit,
    Miss,
    Missed,
}

/// Short-lived text flashed after a scoring event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub text: String,
    pub category: FeedbackCategory,
    pub token: u64,
}

/// Callbacks from the engine to whatever is presenting the session.
/// All methods default to no-ops.
pub trait EngineHost {
    fn on_stimulus_changed(&mut self, _stimulus: Option<&Stimulus>) {}
    fn on_score_changed(&mut self, _score: u32) {}
    fn on_combo_changed(&mut self, _combo: u32) {}
    /// `None` clears the current flash
    fn on_transient_feedback(&mut self, _feedback: Option<&Feedback>) {}
    fn on_clock(&mut self, _seconds: u32) {}
    fn on_session_ended(&mut self, _stats: &SessionStats) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl EngineHost for NullHost {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    Hit { points: u32, combo: u32 },
    Miss,
    /// No live stimulus, already answered, paused or not running
    Ignored,
}

/// Picks the next digit. Targets are drawn with `target_probability`;
/// non-targets are rejection-sampled so they never land in the target set.
pub fn draw_stimulus<R: Rng + ?Sized>(rng: &mut R, target_probability: f64, id: u64) -> Stimulus {
    let is_target = rng.gen_bool(target_probability.clamp(0.0, 1.0));
    let value = if is_target {
        TARGET_DIGITS[rng.gen_range(0..TARGET_DIGITS.len())]
    } else {
        loop {
            let candidate = rng.gen_range(0..10u8);
            if !TARGET_DIGITS.contains(&candidate) {
                break candidate;
            }
        }
    };
    Stimulus {
        value,
        is_target,
        id,
    }
}

/// Runs one session at a time: spawns digits on a self-adjusting cadence,
/// drives the session clock and scores taps against the live digit.
///
/// Time is virtual. The host feeds elapsed wall time through [`advance`],
/// and nothing moves while the session is paused, so a resumed session
/// picks up exactly where it stopped without replaying missed ticks.
///
/// [`advance`]: StimulusEngine::advance
pub struct StimulusEngine<H: EngineHost, R: Rng = StdRng> {
    host: H,
    rng: R,
    scheduler: Scheduler,
    session: Option<SessionState>,
    next_stimulus_id: u64,
    next_feedback_token: u64,
    active_feedback: Option<u64>,
}

impl<H: EngineHost> StimulusEngine<H, StdRng> {
    pub fn new(host: H) -> Self {
        Self::with_rng(host, StdRng::from_entropy())
    }

    pub fn with_seed(host: H, seed: u64) -> Self {
        Self::with_rng(host, StdRng::seed_from_u64(seed))
    }
}

impl<H: EngineHost, R: Rng> StimulusEngine<H, R> {
    pub fn with_rng(host: H, rng: R) -> Self {
        Self {
            host,
            rng,
            scheduler: Scheduler::new(),
            session: None,
            next_stimulus_id: 0,
            next_feedback_token: 0,
            active_feedback: None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_running)
    }

    pub fn is_paused(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_paused)
    }

    pub fn current_stimulus(&self) -> Option<Stimulus> {
        self.session.as_ref().and_then(|s| s.current)
    }

    /// Epoch of the live session; bumps on every start and finish
    pub fn epoch(&self) -> u64 {
        self.scheduler.epoch()
    }

    pub fn elapsed(&self) -> Duration {
        self.scheduler.now()
    }

    /// Begins a fresh session, abandoning any session still in flight.
    /// The first digit is spawned immediately.
    pub fn start(&mut self, difficulty: Difficulty, mode: GameMode) {
        let epoch = self.scheduler.cancel_all();
        self.active_feedback = None;
        self.session = Some(SessionState::new(difficulty, mode));
        info!(%difficulty, %mode, epoch, "session started");

        self.host.on_score_changed(0);
        self.host.on_combo_changed(0);
        self.host.on_transient_feedback(None);
        if let Some(session) = &self.session {
            self.host.on_clock(session.clock_display());
        }

        self.scheduler
            .schedule(Duration::from_millis(CLOCK_TICK_MS), TimerKind::Clock);
        self.spawn_tick();
    }

    /// Scores a tap against the live digit. At most one tap counts per digit.
    pub fn tap(&mut self) -> TapOutcome {
        let Some(session) = self.session.as_mut() else {
            return TapOutcome::Ignored;
        };
        if !session.can_accept_tap() {
            return TapOutcome::Ignored;
        }
        let Some(stimulus) = session.current else {
            return TapOutcome::Ignored;
        };
        session.has_responded_to_current = true;

        let outcome = if stimulus.is_target {
            let points = session.register_hit();
            TapOutcome::Hit {
                points,
                combo: session.combo,
            }
        } else {
            session.register_miss();
            TapOutcome::Miss
        };
        let (score, combo) = (session.score, session.combo);
        debug!(value = stimulus.value, ?outcome, score, "tap");

        self.host.on_score_changed(score);
        self.host.on_combo_changed(combo);
        match outcome {
            TapOutcome::Hit { combo, .. } => {
                let text = if combo > 1 {
                    format!("{combo}x COMBO!")
                } else {
                    "PERFECT!".to_string()
                };
                self.flash(text, FeedbackCategory::Hit);
            }
            TapOutcome::Miss => self.flash("OOPS!".to_string(), FeedbackCategory::Miss),
            TapOutcome::Ignored => {}
        }
        outcome
    }

    /// Flips the pause flag of a running session and returns the new state
    pub fn toggle_pause(&mut self) -> bool {
        match self.session.as_mut() {
            Some(session) if session.is_running => {
                session.is_paused = !session.is_paused;
                debug!(paused = session.is_paused, "pause toggled");
                session.is_paused
            }
            _ => false,
        }
    }

    /// Moves virtual time forward by `dt`, firing every timer that falls due
    pub fn advance(&mut self, dt: Duration) {
        if !self.is_running() || self.is_paused() {
            return;
        }
        let until = self.scheduler.now() + dt;
        while let Some(timer) = self.scheduler.pop_due(until) {
            self.dispatch(timer);
        }
        self.scheduler.advance_to(until);
    }

    /// Ends the running session and reports its stats. Repeat calls return `None`.
    pub fn finish(&mut self) -> Option<SessionStats> {
        let session = self.session.as_mut().filter(|s| s.is_running)?;
        session.is_running = false;
        session.is_paused = false;
        session.current = None;
        let epoch = self.scheduler.cancel_all();
        self.active_feedback = None;
        self.host.on_stimulus_changed(None);
        self.host.on_transient_feedback(None);

        let stats = session.to_stats(Utc::now());
        info!(
            score = stats.score,
            hits = stats.hits,
            misses = stats.misses,
            max_combo = stats.max_combo,
            spawned = session.spawned,
            epoch,
            "session finished"
        );
        self.host.on_session_ended(&stats);
        Some(stats)
    }

    fn dispatch(&mut self, timer: Timer) {
        if timer.epoch != self.scheduler.epoch() {
            return;
        }
        match timer.kind {
            TimerKind::Clock => self.clock_tick(),
            TimerKind::Spawn => self.spawn_tick(),
            TimerKind::ClearFeedback { token } => {
                if self.active_feedback == Some(token) {
                    self.active_feedback = None;
                    self.host.on_transient_feedback(None);
                }
            }
        }
    }

    fn spawn_tick(&mut self) {
        let id = self.next_stimulus_id;
        let Some(session) = self.session.as_mut().filter(|s| s.is_running) else {
            return;
        };
        let broke_combo = session.expire_current();
        session.decay();
        let stimulus = draw_stimulus(&mut self.rng, session.target_probability, id);
        session.install(stimulus);
        let delay = Duration::from_secs_f64(session.interval_ms / 1000.0);
        trace!(
            value = stimulus.value,
            target = stimulus.is_target,
            interval_ms = session.interval_ms,
            probability = session.target_probability,
            "spawn"
        );
        self.next_stimulus_id += 1;

        if broke_combo {
            self.host.on_combo_changed(0);
            self.flash("MISSED!".to_string(), FeedbackCategory::Missed);
        }
        self.host.on_stimulus_changed(Some(&stimulus));
        self.scheduler.schedule(delay, TimerKind::Spawn);
    }

    fn clock_tick(&mut self) {
        let Some(session) = self.session.as_mut().filter(|s| s.is_running) else {
            return;
        };
        session.elapsed_secs += 1;
        let expired = match session.mode {
            GameMode::Timed => {
                session.seconds_remaining = session.seconds_remaining.saturating_sub(1);
                session.seconds_remaining == 0
            }
            GameMode::Practice => false,
        };
        self.host.on_clock(session.clock_display());

        if expired {
            self.finish();
        } else {
            self.scheduler
                .schedule(Duration::from_millis(CLOCK_TICK_MS), TimerKind::Clock);
        }
    }

    fn flash(&mut self, text: String, category: FeedbackCategory) {
        self.next_feedback_token += 1;
        let feedback = Feedback {
            text,
            category,
            token: self.next_feedback_token,
        };
        self.active_feedback = Some(feedback.token);
        self.host.on_transient_feedback(Some(&feedback));
        self.scheduler.schedule(
            Duration::from_millis(FEEDBACK_LIFETIME_MS),
            TimerKind::ClearFeedback {
                token: feedback.token,
            },
        );
    }
}
