mod config;
mod gemini;
mod ui;

use std::{
    fs::OpenOptions,
    io::{self, Stdout},
    path::PathBuf,
    sync::{
        Arc, Mutex,
        mpsc::{self, Receiver, Sender},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use clap::Parser;
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use robologic_core::{
    Command,
    engine::{CrashReason, EngineEvent, Status},
    level::LevelData,
    session::{HintRequest, LevelOrigin, LevelSession},
    source::{HintSource, LevelSource, OfflineSource, SourceError},
};

use config::{GameConfig, LoggingConfig};
use gemini::GeminiClient;

/// Longest the loop waits for input before checking the scheduler and workers.
const MAX_POLL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to robologic.toml if present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// API key for the level and hint generator
    #[arg(long, env = "ROBOLOGIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Difficulty requested from the level generator
    #[arg(short, long)]
    difficulty: Option<String>,

    /// Never call the generator; use the built-in levels and hints
    #[arg(long)]
    offline: bool,
}

/// Results coming back from worker threads.
enum Reply {
    Level(Result<LevelData, SourceError>),
    Hint {
        request: HintRequest,
        answer: Result<String, SourceError>,
    },
}

struct App {
    /// The game itself; everything else here is presentation.
    session: LevelSession,
    /// Epoch for the session's clock.
    started: Instant,
    /// Last thing worth telling the player.
    message: String,
    loading_level: bool,
    loading_hint: bool,
    replies: Receiver<Reply>,
    reply_tx: Sender<Reply>,
    /// Flag to control the main loop.
    should_quit: bool,
}

impl App {
    fn new(session: LevelSession) -> Self {
        let (reply_tx, replies) = mpsc::channel();
        App {
            session,
            started: Instant::now(),
            message: "Queue commands with the arrow keys, then press Enter.".to_string(),
            loading_level: false,
            loading_hint: false,
            replies,
            reply_tx,
            should_quit: false,
        }
    }

    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    /// How long the loop may wait for input.
    fn poll_timeout(&self) -> Duration {
        self.session
            .scheduler()
            .time_until(self.now())
            .map_or(MAX_POLL, |due| due.min(MAX_POLL))
    }

    /// Handles one step of the game: due ticks and finished worker calls.
    fn tick(&mut self) {
        let events = self.session.update(self.now());
        for event in &events {
            self.describe(event);
        }

        while let Ok(reply) = self.replies.try_recv() {
            match reply {
                Reply::Level(result) => {
                    self.loading_level = false;
                    let id = self.session.next_level_number();
                    self.message = match self.session.complete_advance(result) {
                        Ok(LevelOrigin::Generated) => format!("Level {id} generated."),
                        Ok(LevelOrigin::Fallback) => format!("Level {id} loaded."),
                        Err(err) => err.to_string(),
                    };
                }
                Reply::Hint { request, answer } => {
                    self.loading_hint = false;
                    self.session.accept_hint(&request, answer);
                }
            }
        }
    }

    fn describe(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::Moved { .. } => {}
            EngineEvent::CoinCollected { reward, .. } => {
                self.message = format!("Coin collected! +{reward}");
            }
            EngineEvent::Crashed { reason, at, .. } => {
                self.message = match reason {
                    CrashReason::OutOfBounds => format!("Robot left the grid at {at}. Press r to retry."),
                    CrashReason::Obstacle => format!("Robot hit a rock at {at}. Press r to retry."),
                };
            }
            EngineEvent::Won { bonus, .. } => {
                self.message = format!(
                    "Mission complete! +{bonus} bonus, {} coin(s). Press n for the next level.",
                    self.session.state().coins_collected
                );
            }
            EngineEvent::ProgramExhausted => {
                self.message = "Program finished before reaching the goal.".to_string();
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.quit(),
            KeyCode::Up | KeyCode::Char('w') => self.add_command(Command::Up),
            KeyCode::Down | KeyCode::Char('s') => self.add_command(Command::Down),
            KeyCode::Left | KeyCode::Char('a') => self.add_command(Command::Left),
            KeyCode::Right | KeyCode::Char('d') => self.add_command(Command::Right),
            KeyCode::Backspace => {
                if let Some(last) = self.session.program().len().checked_sub(1) {
                    self.remove_command(last);
                }
            }
            KeyCode::Char(c @ '1'..='9') => {
                // Digits are 1-based positions in the program list.
                let index = c as usize - '1' as usize;
                self.remove_command(index);
            }
            KeyCode::Char('c') => {
                if let Err(err) = self.session.clear_program() {
                    self.message = err.to_string();
                }
            }
            KeyCode::Enter | KeyCode::Char(' ') => self.run(),
            KeyCode::Char('r') => self.reset(),
            KeyCode::Char('n') => self.request_next_level(),
            KeyCode::Char('h') => self.request_hint(),
            _ => {}
        }
    }

    fn add_command(&mut self, command: Command) {
        if let Err(err) = self.session.add_command(command) {
            self.message = err.to_string();
        }
    }

    fn remove_command(&mut self, index: usize) {
        if let Err(err) = self.session.remove_command(index) {
            self.message = err.to_string();
        }
    }

    fn run(&mut self) {
        match self.session.run(self.now()) {
            Ok(()) => self.message = "Running...".to_string(),
            Err(err) => self.message = err.to_string(),
        }
    }

    fn reset(&mut self) {
        if self.loading_level {
            return;
        }
        self.session.reset();
        self.message = "Robot back at the start.".to_string();
    }

    /// Fetches the next level on a worker thread.
    fn request_next_level(&mut self) {
        if self.loading_level {
            return;
        }
        let request = match self.session.next_level_request() {
            Ok(request) => request,
            Err(err) => {
                self.message = err.to_string();
                return;
            }
        };
        self.loading_level = true;
        self.message = "Loading the next level...".to_string();

        let source = self.session.level_source();
        let tx = self.reply_tx.clone();
        thread::spawn(move || {
            let result = source.generate_level(&request.difficulty, request.level_number);
            // The receiver only disappears when the app is shutting down.
            let _ = tx.send(Reply::Level(result));
        });
    }

    /// Asks for a hint on a worker thread.
    fn request_hint(&mut self) {
        if self.loading_hint || self.session.state().is_running() {
            return;
        }
        self.loading_hint = true;

        let request = self.session.hint_request();
        let source = self.session.hint_source();
        let tx = self.reply_tx.clone();
        thread::spawn(move || {
            let answer = source.hint(&request.layout, &request.commands);
            let _ = tx.send(Reply::Hint { request, answer });
        });
    }

    fn status_label(&self) -> &'static str {
        match self.session.state().status {
            Status::Idle => "Ready",
            Status::Running => "Running",
            Status::Won => "Won",
            Status::Lost => "Crashed",
        }
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    let mut config = GameConfig::load(args.config.as_deref())?;
    if let Some(api_key) = args.api_key {
        config.generator.api_key = api_key;
    }
    if let Some(difficulty) = args.difficulty {
        config.game.difficulty = difficulty;
    }

    init_tracing(&config.logging)?;

    let (levels, hints) = build_sources(&config, args.offline);
    let session = LevelSession::new(config.session_config(), levels, hints)?;

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    // Create the application state
    let mut app = App::new(session);

    // Run the main application loop, restoring the terminal even on failure
    let result = run_app(&mut terminal, &mut app);
    restore_terminal(&mut terminal)?;

    info!(score = app.session.total_score(), "session ended");
    result
}

/// Installs a file-backed subscriber; the terminal itself is owned by the UI.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&logging.file)
        .with_context(|| format!("could not open log file {}", logging.file.display()))?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

/// Chooses the level and hint sources. The generator credential is handed to
/// the client explicitly.
fn build_sources(config: &GameConfig, offline: bool) -> (Arc<dyn LevelSource>, Arc<dyn HintSource>) {
    if !offline && !config.generator.api_key.trim().is_empty() {
        match GeminiClient::new(config.generator.clone()) {
            Ok(client) => {
                info!(model = %config.generator.model, "using generated levels");
                let client = Arc::new(client);
                let levels: Arc<dyn LevelSource> = client.clone();
                let hints: Arc<dyn HintSource> = client;
                return (levels, hints);
            }
            Err(err) => warn!(error = %err, "generator client unavailable"),
        }
    }

    info!("using built-in levels");
    let levels: Arc<dyn LevelSource> = Arc::new(OfflineSource);
    let hints: Arc<dyn HintSource> = Arc::new(OfflineSource);
    (levels, hints)
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?; // Put terminal in raw mode
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?; // Use alternate screen and enable mouse capture
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into) // Map io::Error to anyhow::Error
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        // Draw the UI
        terminal.draw(|f| ui::draw(f, app))?;

        // Poll for events (keyboard, mouse, etc.) until the next tick is due
        if crossterm::event::poll(app.poll_timeout())? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code);
                }
            }
        }

        // Apply due ticks and worker replies
        app.tick();

        // Exit loop if requested
        if app.should_quit {
            break;
        }
    }
    Ok(())
}
