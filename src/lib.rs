// Library surface for headless/integration tests and reuse.
// The binary in main.rs owns the terminal and the ratatui screens.
pub mod achievements;
pub mod app_dirs;
pub mod config;
pub mod engine;
pub mod game_store;
pub mod hud;
pub mod progress;
pub mod progression;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod shop;
pub mod storage;
pub mod types;

pub use engine::{EngineHost, StimulusEngine, TapOutcome};
pub use progress::PlayerProgress;
pub use progression::{ProgressionEngine, ProgressionOutcome, SideCounters};
pub use types::{Difficulty, GameMode, SessionStats, Stimulus, Theme};
