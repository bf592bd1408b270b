pub mod ui;

use chrono::Local;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyEvent, KeyModifiers},
    execute,
    style::Print,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use sixseven::{
    app_dirs::AppDirs,
    config::{ConfigStore, Settings, SettingsOverrides},
    engine::{StimulusEngine, TapOutcome},
    game_store::{GameStore, SessionReport},
    hud::Hud,
    progress::PlayerProgress,
    progression::{ProgressionEngine, SideCounters},
    runtime::{CrosstermEventSource, FixedTicker, GameEvent, GameEventSource, Runner, Ticker},
    shop,
    storage::{KeyValueStore, MemoryStore, SqliteStore},
    types::{Difficulty, GameMode, SessionStats, Theme},
};
use std::{
    error::Error,
    fs::OpenOptions,
    io::{self, stdin},
    path::PathBuf,
    sync::Mutex,
    time::Duration,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TICK_RATE_MS: u64 = 16;

/// reflex tapping game: tap on 6 and 7, hold still on everything else
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "A reflex game for the terminal. Digits flash one at a time, faster and faster; press space only when a 6 or 7 is showing. Tracks high scores, daily streaks, coins and achievements."
)]
pub struct Cli {
    /// difficulty to play at (saved for next time)
    #[clap(short = 'd', long, value_enum)]
    difficulty: Option<Difficulty>,

    /// untimed practice session, ended with esc
    #[clap(short = 'p', long)]
    practice: bool,

    /// color theme to use (saved for next time, must be owned)
    #[clap(short = 't', long, value_enum)]
    theme: Option<Theme>,

    /// turn off the terminal bell on misses (saved for next time)
    #[clap(long)]
    mute: bool,

    /// path to the state database
    #[clap(long)]
    db: Option<PathBuf>,

    /// seed for the digit sequence
    #[clap(long)]
    seed: Option<u64>,

    /// print lifetime stats and achievements, then exit
    #[clap(long)]
    progress: bool,

    /// buy a shop item by id, then exit
    #[clap(long, value_name = "ITEM")]
    buy: Option<String>,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            difficulty: self.difficulty,
            theme: self.theme,
            mute: self.mute,
        }
    }

    fn mode(&self) -> GameMode {
        if self.practice {
            GameMode::Practice
        } else {
            GameMode::Timed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Playing,
    Results,
    Achievements,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

pub type Store = GameStore<Box<dyn KeyValueStore>>;

pub struct App {
    pub engine: StimulusEngine<Hud>,
    pub store: Store,
    pub progression: ProgressionEngine,
    pub settings: Settings,
    pub mode: GameMode,
    pub screen: Screen,
    pub progress: PlayerProgress,
    pub high_score: u32,
    pub last_stats: Option<SessionStats>,
    pub report: Option<SessionReport>,
    bell: bool,
}

impl App {
    pub fn new(store: Store, settings: Settings, mode: GameMode, seed: Option<u64>) -> Self {
        let engine = match seed {
            Some(seed) => StimulusEngine::with_seed(Hud::default(), seed),
            None => StimulusEngine::new(Hud::default()),
        };
        Self {
            engine,
            progress: store.progress(),
            high_score: store.high_score(),
            store,
            progression: ProgressionEngine::new(),
            settings,
            mode,
            screen: Screen::Playing,
            last_stats: None,
            report: None,
            bell: false,
        }
    }

    pub fn start_session(&mut self) {
        self.engine.host_mut().reset();
        self.last_stats = None;
        self.report = None;
        self.screen = Screen::Playing;
        self.engine.start(self.settings.difficulty, self.mode);
    }

    /// Feeds wall time to the engine and wraps up a session that ran out on its own
    pub fn on_elapsed(&mut self, dt: Duration) {
        if self.screen == Screen::Playing {
            self.engine.advance(dt);
            self.collect_ended();
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Control {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Control::Quit;
        }

        match self.screen {
            Screen::Playing => match key.code {
                KeyCode::Char(' ') | KeyCode::Enter => {
                    if self.engine.tap() == TapOutcome::Miss && self.settings.sound_enabled {
                        self.bell = true;
                    }
                }
                KeyCode::Char('p') => {
                    self.engine.toggle_pause();
                }
                KeyCode::Esc | KeyCode::Char('q') => {
                    self.engine.finish();
                    self.collect_ended();
                }
                _ => {}
            },
            Screen::Results => match key.code {
                KeyCode::Char('r') | KeyCode::Enter => self.start_session(),
                KeyCode::Char('a') => self.screen = Screen::Achievements,
                KeyCode::Esc | KeyCode::Char('q') => return Control::Quit,
                _ => {}
            },
            Screen::Achievements => match key.code {
                KeyCode::Char('b') | KeyCode::Backspace => self.screen = Screen::Results,
                KeyCode::Char('r') => self.start_session(),
                KeyCode::Esc | KeyCode::Char('q') => return Control::Quit,
                _ => {}
            },
        }
        Control::Continue
    }

    fn take_bell(&mut self) -> bool {
        std::mem::take(&mut self.bell)
    }

    fn collect_ended(&mut self) {
        if let Some(stats) = self.engine.host_mut().take_ended() {
            self.conclude(stats);
        }
    }

    fn conclude(&mut self, stats: SessionStats) {
        let report = self.store.conclude_session(
            &self.progression,
            &stats,
            SideCounters::default(),
            Local::now(),
        );
        self.high_score = report.high_score;
        self.progress = report.outcome.progress.clone();
        self.last_stats = Some(stats);
        self.report = Some(report);
        self.screen = Screen::Results;
    }
}

fn init_logging() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(dir) = path.parent() {
        if std::fs::create_dir_all(dir).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    // the terminal belongs to the game, so logs only go to the file
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
}

/// SQLite at the requested or default location, in-memory when that fails
fn open_store(path: Option<PathBuf>) -> Box<dyn KeyValueStore> {
    let Some(path) = path.or_else(AppDirs::db_path) else {
        warn!("no state directory, progress will not be saved");
        return Box::new(MemoryStore::new());
    };
    match SqliteStore::open(&path) {
        Ok(store) => Box::new(store),
        Err(err) => {
            warn!(path = %path.display(), %err, "state database unavailable, progress will not be saved");
            Box::new(MemoryStore::new())
        }
    }
}

fn print_progress(progress: &PlayerProgress, high_score: u32) {
    println!("high score       {high_score}");
    println!("best score       {}", progress.best_score);
    println!("best combo       {}", progress.best_combo);
    println!("games played     {}", progress.total_games_played);
    println!("total hits       {}", progress.total_hits);
    println!("daily streak     {}", progress.daily_streak);
    println!(
        "coins            {} ({} earned)",
        progress.coins, progress.total_coins_earned
    );
    println!(
        "achievements     {}/{}",
        progress.unlocked_count(),
        progress.achievements.len()
    );
    println!();
    for achievement in &progress.achievements {
        println!("{}", ui::achievement_row(achievement));
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging();

    let mut store = GameStore::new(open_store(cli.db.clone()));

    if let Some(item) = &cli.buy {
        let mut progress = match store.load_progress() {
            Ok(progress) => progress,
            Err(err) => {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::Io, format!("stored progress is unreadable: {err}"))
                    .exit();
            }
        };
        match shop::purchase(&mut progress, item) {
            Ok(bought) => {
                store.save_progress(&progress);
                println!("bought {} ({} coins left)", bought.name, progress.coins);
                return Ok(());
            }
            Err(err) => {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::InvalidValue, err).exit();
            }
        }
    }

    let progress = store.progress();
    if cli.progress {
        print_progress(&progress, store.high_score());
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let stored = store.load();
    let settings = stored.merge(&cli.overrides(), &progress.inventory);
    if settings != stored {
        if let Err(err) = store.save(&settings) {
            warn!(%err, "failed to save settings");
        }
    }
    info!(difficulty = %settings.difficulty, theme = %settings.theme, mode = %cli.mode(), "launching");

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(store, settings, cli.mode(), cli.seed);
    let mut runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(TICK_RATE_MS)),
    );
    let result = start_tui(&mut terminal, &mut app, &mut runner);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend, E: GameEventSource, T: Ticker>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    runner: &mut Runner<E, T>,
) -> Result<(), Box<dyn Error>> {
    app.start_session();
    runner.reset_clock();

    loop {
        terminal.draw(|f| ui(app, f))?;

        let step = runner.step();
        // time first, so a tap is scored against the digit showing right now
        app.on_elapsed(step.elapsed);
        if let GameEvent::Key(key) = step.event {
            if app.handle_key(key) == Control::Quit {
                break;
            }
        }
        if app.take_bell() {
            execute!(io::stdout(), Print('\x07'))?;
        }
    }

    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    f.render_widget(app, f.area());
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use clap::Parser;

    pub(crate) fn test_app(mode: GameMode) -> App {
        let store: Box<dyn KeyValueStore> = Box::new(MemoryStore::new());
        App::new(GameStore::new(store), Settings::default(), mode, Some(42))
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["sixseven"]);
        assert_eq!(cli.difficulty, None);
        assert!(!cli.practice);
        assert!(!cli.mute);
        assert!(!cli.progress);
        assert_eq!(cli.mode(), GameMode::Timed);
        assert_eq!(cli.overrides(), SettingsOverrides::default());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "sixseven",
            "-d",
            "hard",
            "--practice",
            "--theme",
            "ocean",
            "--mute",
            "--seed",
            "9",
        ]);
        assert_eq!(cli.mode(), GameMode::Practice);
        assert_eq!(cli.seed, Some(9));
        assert_eq!(
            cli.overrides(),
            SettingsOverrides {
                difficulty: Some(Difficulty::Hard),
                theme: Some(Theme::Ocean),
                mute: true,
            }
        );
    }

    #[test]
    fn test_cli_rejects_unknown_difficulty() {
        assert!(Cli::try_parse_from(["sixseven", "--difficulty", "brutal"]).is_err());
    }

    #[test]
    fn test_timed_session_reaches_results() {
        let mut app = test_app(GameMode::Timed);
        app.start_session();
        assert_eq!(app.screen, Screen::Playing);

        for _ in 0..31 {
            app.on_elapsed(Duration::from_secs(1));
        }
        assert_eq!(app.screen, Screen::Results);
        let report = app.report.as_ref().unwrap();
        assert_eq!(report.outcome.progress.total_games_played, 1);
        assert_eq!(app.progress.total_games_played, 1);
        assert_eq!(app.store.history().games.len(), 1);
    }

    #[test]
    fn test_escape_ends_practice() {
        let mut app = test_app(GameMode::Practice);
        app.start_session();
        app.on_elapsed(Duration::from_secs(3));

        assert_eq!(app.handle_key(key(KeyCode::Esc)), Control::Continue);
        assert_eq!(app.screen, Screen::Results);
        let stats = app.last_stats.as_ref().unwrap();
        assert_eq!(stats.mode, GameMode::Practice);
        assert!(!app.report.as_ref().unwrap().new_high_score);

        // time spent on the results screen does not reach the engine
        app.on_elapsed(Duration::from_secs(60));
        assert_eq!(app.store.history().total_games_played, 1);
    }

    #[test]
    fn test_results_navigation() {
        let mut app = test_app(GameMode::Practice);
        app.start_session();
        app.handle_key(key(KeyCode::Char('q')));
        assert_eq!(app.screen, Screen::Results);

        app.handle_key(key(KeyCode::Char('a')));
        assert_eq!(app.screen, Screen::Achievements);
        app.handle_key(key(KeyCode::Char('b')));
        assert_eq!(app.screen, Screen::Results);

        app.handle_key(key(KeyCode::Char('r')));
        assert_eq!(app.screen, Screen::Playing);
        assert!(app.engine.is_running());
        assert!(app.report.is_none());
        assert_eq!(app.handle_key(key(KeyCode::Esc)), Control::Continue);
        assert_eq!(app.handle_key(key(KeyCode::Esc)), Control::Quit);
    }

    #[test]
    fn test_ctrl_c_quits_from_anywhere() {
        let mut app = test_app(GameMode::Timed);
        app.start_session();
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(app.handle_key(ctrl_c), Control::Quit);
        assert_eq!(app.store.history().total_games_played, 0);
    }

    #[test]
    fn test_pause_key_toggles() {
        let mut app = test_app(GameMode::Timed);
        app.start_session();
        app.handle_key(key(KeyCode::Char('p')));
        assert!(app.engine.is_paused());
        app.handle_key(key(KeyCode::Char('p')));
        assert!(!app.engine.is_paused());
    }

    #[test]
    fn test_bell_on_miss_unless_muted() {
        for sound_enabled in [true, false] {
            let mut app = test_app(GameMode::Practice);
            app.settings.sound_enabled = sound_enabled;
            app.start_session();

            let mut missed = false;
            for _ in 0..200 {
                if let Some(stimulus) = app.engine.current_stimulus() {
                    if !stimulus.is_target
                        && app.engine.session().is_some_and(|s| s.can_accept_tap())
                    {
                        app.handle_key(key(KeyCode::Char(' ')));
                        missed = true;
                        break;
                    }
                }
                app.on_elapsed(Duration::from_millis(50));
            }
            assert!(missed);
            assert_eq!(app.take_bell(), sound_enabled);
            assert!(!app.take_bell());
        }
    }

    #[test]
    fn test_tap_outcome_reaches_hud() {
        let mut app = test_app(GameMode::Practice);
        app.start_session();
        for _ in 0..400 {
            if app
                .engine
                .current_stimulus()
                .is_some_and(|s| s.is_target)
                && app.engine.session().is_some_and(|s| s.can_accept_tap())
            {
                break;
            }
            app.on_elapsed(Duration::from_millis(10));
        }
        assert_matches!(app.engine.tap(), TapOutcome::Hit { points: 100, combo: 1 });
        assert_eq!(app.engine.host().score, 100);
    }
}
