mod ui;

use breedblink::{
    app_dirs::AppDirs,
    celebration::Celebration,
    config::{Config, ConfigStore, FileConfigStore},
    dog_api::{DogApiResolver, OfflineResolver, Resolver},
    game::{Game, GameEvent},
    history::{HistoryLog, HistoryRecord},
    image_pool::PreloadProgress,
    logging,
    progression::ProgressionController,
    runtime::{AppEvent, CrosstermEventSource, FixedTicker, Loader, Runner},
};
use chrono::Local;
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use rand::{rngs::StdRng, SeedableRng};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, info, warn};

/// Redraw interval; fine enough to show the blink-out
const FRAME_RATE_MS: u64 = 50;

/// Latency of the synthetic images in offline mode
const OFFLINE_LATENCY_MS: u64 = 15;

/// blink-and-you-miss-it dog breed quiz for the terminal
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Name the dog before it blinks away. Three timed rounds of increasingly obscure breeds, shrinking display windows and a tighter error budget."
)]
pub struct Cli {
    /// seed for a reproducible game
    #[clap(long)]
    seed: Option<u64>,

    /// play without network access using generated pictures
    #[clap(long)]
    offline: bool,

    /// path to an alternative config file
    #[clap(long)]
    config: Option<PathBuf>,

    /// do not append finished rounds to the history file
    #[clap(long)]
    no_history: bool,

    /// print the effective configuration as JSON and exit
    #[clap(long)]
    print_config: bool,
}

impl Cli {
    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn history(&self, config: &Config) -> Option<HistoryLog> {
        if self.no_history || !config.record_history {
            return None;
        }
        AppDirs::history_path().map(HistoryLog::new)
    }
}

pub struct App {
    pub game: Game,
    pub loading: Option<PreloadProgress>,
    pub celebration: Celebration,
    pub history: Option<HistoryLog>,
    pub best_score: Option<f64>,
}

impl App {
    pub fn new(game: Game, history: Option<HistoryLog>) -> Self {
        Self {
            game,
            loading: None,
            celebration: Celebration::new(),
            history,
            best_score: None,
        }
    }

    /// React to what the game reports: bookkeeping the core leaves to the shell
    pub fn on_game_event(&mut self, event: &GameEvent, (width, height): (u16, u16)) {
        match event {
            GameEvent::PreloadRequested { round, count, .. } => {
                self.loading = Some(PreloadProgress {
                    round: *round,
                    loaded: 0,
                    total: *count,
                });
            }
            GameEvent::RoundEnded(summary) => {
                let Some(history) = &self.history else {
                    return;
                };
                let record =
                    HistoryRecord::from_stats(&summary.stats, summary.cumulative_correct, Local::now());
                if let Err(err) = history.append(&record) {
                    warn!(error = %err, "could not record round");
                }
                self.best_score = history
                    .best_score(summary.stats.round.number())
                    .unwrap_or_else(|err| {
                        warn!(error = %err, "could not read history");
                        None
                    });
            }
            GameEvent::LeaderboardReached { .. } => {
                self.celebration
                    .start(width, height, &mut rand::thread_rng());
            }
            _ => {}
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let store = cli.config_store();
    let config = store.load();

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    if let Some(log_path) = AppDirs::log_path() {
        // the game runs fine without a subscriber
        let _ = logging::init(&log_path, &config.log_level);
    }
    info!(version = env!("CARGO_PKG_VERSION"), offline = cli.offline, seed = ?cli.seed, "starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let resolver = if cli.offline {
        Resolver::Offline(OfflineResolver::new(
            config.thumbnail_size(),
            Duration::from_millis(OFFLINE_LATENCY_MS),
        ))
    } else {
        Resolver::Online(DogApiResolver::new(
            &config.api_base_url,
            config.catalog.clone(),
            config.thumbnail_size(),
            config.request_timeout(),
        )?)
    };

    let game = Game::new(
        config.catalog.clone(),
        ProgressionController::new(config.thresholds, config.preload),
        cli.rng(),
    );
    let mut app = App::new(game, cli.history(&config));

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &mut app, runtime.handle().clone(), Arc::new(resolver));

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    runtime.shutdown_background();
    info!("bye");
    result
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    handle: tokio::runtime::Handle,
    resolver: Arc<Resolver>,
) -> Result<(), Box<dyn Error>> {
    let runner = Runner::new(
        CrosstermEventSource::new(),
        FixedTicker::new(Duration::from_millis(FRAME_RATE_MS)),
    );
    let loader = Loader::new(handle, resolver, runner.sender());

    let clock = Instant::now();
    let mut last_frame = clock;
    app.game.start();

    loop {
        let event = runner.step();

        // timers due before the event happened fire first
        app.game.advance_to(clock.elapsed());

        match event {
            AppEvent::Key(key) => {
                if key.code == KeyCode::Esc
                    || (key.modifiers.contains(KeyModifiers::CONTROL)
                        && key.code == KeyCode::Char('c'))
                {
                    break;
                }
                let mut screen = ui::screen::current_screen(app.game.phase());
                screen.on_key(key, app);
            }
            AppEvent::Resize | AppEvent::Tick => {}
            AppEvent::Preload(progress) => app.loading = Some(progress),
            AppEvent::PoolReady {
                round,
                pool,
                report,
            } => {
                debug!(%round, ?report, "pool ready");
                app.loading = None;
                app.game.install_pool(round, pool);
            }
            AppEvent::ImageResolved { ticket, result } => {
                app.game.image_resolved(&ticket, result);
            }
        }

        let size = terminal
            .size()
            .map(|s| (s.width, s.height))
            .unwrap_or((80, 24));
        for event in app.game.drain_events() {
            loader.dispatch(&event, app.game.catalog());
            app.on_game_event(&event, size);
        }

        let now = Instant::now();
        app.celebration
            .update(now.duration_since(last_frame).as_secs_f64());
        last_frame = now;

        let screen = ui::screen::current_screen(app.game.phase());
        terminal.draw(|f| screen.render(app, f))?;
    }

    Ok(())
}
