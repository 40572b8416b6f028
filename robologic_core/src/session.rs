use std::{sync::Arc, time::Duration};

use tracing::{debug, info, warn};

use crate::{
    Command, GRID_SIZE,
    engine::{self, EngineError, EngineEvent, ExecutionState, Status, Tick},
    level::{LevelData, LevelError, LevelGrid},
    program::{ProgramBuffer, ProgramError},
    scheduler::{Pacing, TickScheduler},
    solver,
    source::{self, DEFAULT_HINT, HintSource, LevelSource, RECOVERY_HINT, SourceError},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("The program can only be edited while the robot is idle")]
    ProgramLocked,
    #[error("The current level has not been won yet")]
    LevelNotWon,
    #[error(transparent)]
    Program(#[from] ProgramError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Level(#[from] LevelError),
}

/// Settings a session is built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Difficulty asked of the level source.
    pub difficulty: String,
    /// Required side length of generated levels.
    pub grid_size: usize,
    pub pacing: Pacing,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            difficulty: "Medium".to_string(),
            grid_size: GRID_SIZE,
            pacing: Pacing::default(),
        }
    }
}

/// What to ask the level source for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelRequest {
    pub difficulty: String,
    pub level_number: u32,
}

/// What to send the hint source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintRequest {
    /// The level load this request was made for.
    pub serial: u64,
    pub layout: Vec<String>,
    pub commands: Vec<String>,
}

/// Where a newly loaded level came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelOrigin {
    Generated,
    Fallback,
}

/// Owns the active level and everything a player does with it.
///
/// Only [`LevelSession::update`] (through the engine) and the
/// initialize/reset paths replace the execution state and grid.
pub struct LevelSession {
    config: SessionConfig,
    levels: Arc<dyn LevelSource>,
    hints: Arc<dyn HintSource>,
    level: LevelData,
    /// The layout as loaded, used to restore coins on reset.
    pristine: LevelGrid,
    grid: LevelGrid,
    program: ProgramBuffer,
    state: ExecutionState,
    scheduler: TickScheduler,
    banked_score: u32,
    hint: Option<String>,
    /// Bumped on every level load.
    serial: u64,
}

impl LevelSession {
    /// Creates a session on the first fallback level.
    pub fn new(
        config: SessionConfig,
        levels: Arc<dyn LevelSource>,
        hints: Arc<dyn HintSource>,
    ) -> Result<Self, SessionError> {
        let level = source::fallback_level(1);
        let grid = level.grid()?;
        let state = ExecutionState::new(&grid, level.par);
        let scheduler = TickScheduler::new(config.pacing);
        info!(level = level.id, "session started");
        Ok(LevelSession {
            config,
            levels,
            hints,
            level,
            pristine: grid.clone(),
            grid,
            program: ProgramBuffer::new(),
            state,
            scheduler,
            banked_score: 0,
            hint: None,
            serial: 0,
        })
    }

    /// Loads `level`, replacing the grid, program and execution state.
    pub fn initialize(&mut self, level: LevelData) -> Result<(), SessionError> {
        let grid = level.grid()?;
        self.scheduler.cancel();
        self.state = ExecutionState::new(&grid, level.par);
        self.pristine = grid.clone();
        self.grid = grid;
        self.program.clear();
        self.hint = None;
        self.serial += 1;
        info!(
            level = level.id,
            coins = self.state.total_coins,
            par = level.par,
            "level loaded"
        );
        self.level = level;
        Ok(())
    }

    /// Puts the robot back on the start with every coin restored and an
    /// empty program.
    pub fn reset(&mut self) {
        self.scheduler.cancel();
        self.grid = self.pristine.clone();
        self.state = ExecutionState::new(&self.grid, self.level.par);
        self.program.clear();
        debug!(level = self.level.id, "level reset");
    }

    pub fn add_command(&mut self, command: Command) -> Result<(), SessionError> {
        self.ensure_editable()?;
        self.program.append(command);
        Ok(())
    }

    pub fn remove_command(&mut self, index: usize) -> Result<Command, SessionError> {
        self.ensure_editable()?;
        Ok(self.program.remove_at(index)?)
    }

    pub fn clear_program(&mut self) -> Result<(), SessionError> {
        self.ensure_editable()?;
        self.program.clear();
        Ok(())
    }

    /// Edits are only accepted while idle; a won or lost level needs a reset.
    fn ensure_editable(&self) -> Result<(), SessionError> {
        if self.state.is_running() || self.state.is_finished() {
            return Err(SessionError::ProgramLocked);
        }
        Ok(())
    }

    /// Starts executing the program; the first tick is due after the short
    /// initial delay.
    pub fn run(&mut self, now: Duration) -> Result<(), SessionError> {
        self.state = engine::start(&self.state, &self.program)?;
        self.scheduler.arm_first(now);
        info!(commands = self.program.len(), "program started");
        Ok(())
    }

    /// Applies at most one tick if one is due, then schedules the next.
    pub fn update(&mut self, now: Duration) -> Vec<EngineEvent> {
        if !self.scheduler.poll(now) || !self.state.is_running() {
            return Vec::new();
        }

        let Tick {
            state,
            grid,
            events,
        } = engine::tick(&self.state, &self.program, &self.grid);
        self.state = state;
        self.grid = grid;

        match self.state.status {
            Status::Running => self.scheduler.arm_next(now),
            Status::Won => info!(score = self.state.score, "level won"),
            Status::Lost => info!(
                step = ?self.state.executing_index,
                position = %self.state.position,
                "robot crashed"
            ),
            Status::Idle => debug!("program finished without reaching the goal"),
        }
        events
    }

    /// The id the next level will carry.
    pub fn next_level_number(&self) -> u32 {
        self.level.id + 1
    }

    /// Describes the next level to fetch. Only a won level can be left.
    pub fn next_level_request(&self) -> Result<LevelRequest, SessionError> {
        if self.state.status != Status::Won {
            return Err(SessionError::LevelNotWon);
        }
        Ok(LevelRequest {
            difficulty: self.config.difficulty.clone(),
            level_number: self.next_level_number(),
        })
    }

    /// Moves to the next level using whatever the level source returned.
    ///
    /// Only a won level can be left. Failures and unusable levels fall back to
    /// the predefined table, so a won level always advances.
    pub fn complete_advance(
        &mut self,
        generated: Result<LevelData, SourceError>,
    ) -> Result<LevelOrigin, SessionError> {
        if self.state.status != Status::Won {
            return Err(SessionError::LevelNotWon);
        }
        let level_number = self.next_level_number();
        self.banked_score = self.banked_score.saturating_add(self.state.score);

        let candidate = generated
            .map_err(|err| err.to_string())
            .and_then(|level| self.validate(level, level_number).map_err(|err| err.to_string()));

        let (level, origin) = match candidate {
            Ok(level) => (level, LevelOrigin::Generated),
            Err(reason) => {
                warn!(level_number, %reason, "using fallback level");
                (source::fallback_level(level_number), LevelOrigin::Fallback)
            }
        };

        if let Err(err) = self.initialize(level) {
            warn!(error = %err, "falling back after load failure");
            if let Err(err) = self.initialize(source::fallback_level(level_number)) {
                warn!(error = %err, "fallback level failed to load");
            }
            return Ok(LevelOrigin::Fallback);
        }
        Ok(origin)
    }

    /// Asks the level source for the next level and loads it. Blocks for as
    /// long as the source does.
    pub fn advance_level(&mut self) -> Result<LevelOrigin, SessionError> {
        let request = self.next_level_request()?;
        let generated = self
            .levels
            .generate_level(&request.difficulty, request.level_number);
        self.complete_advance(generated)
    }

    fn validate(&self, mut level: LevelData, level_number: u32) -> Result<LevelData, LevelError> {
        let grid = level.grid()?;
        grid.check_size(self.config.grid_size)?;
        if solver::solve(&grid).is_none() {
            return Err(LevelError::MalformedLevel(
                "goal is unreachable from start".to_string(),
            ));
        }
        level.id = level_number;
        level.grid_size = self.config.grid_size;
        Ok(level)
    }

    pub fn hint_request(&self) -> HintRequest {
        HintRequest {
            serial: self.serial,
            layout: self.grid.to_rows(),
            commands: self.program.tokens(),
        }
    }

    /// Stores the hint source's answer, degrading failures to a friendly default.
    pub fn resolve_hint(&mut self, answer: Result<String, SourceError>) -> &str {
        let text = match answer {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => RECOVERY_HINT.to_string(),
            Err(SourceError::Unavailable) => DEFAULT_HINT.to_string(),
            Err(err) => {
                warn!(error = %err, "hint request failed");
                RECOVERY_HINT.to_string()
            }
        };
        self.hint.insert(text)
    }

    /// Stores the answer to `request`, or drops it if another level has been
    /// loaded since the request was made.
    pub fn accept_hint(
        &mut self,
        request: &HintRequest,
        answer: Result<String, SourceError>,
    ) -> Option<&str> {
        if request.serial != self.serial {
            debug!(serial = request.serial, "dropping hint for an earlier level");
            return None;
        }
        Some(self.resolve_hint(answer))
    }

    /// Asks the hint source directly. Blocks for as long as the source does.
    pub fn request_hint(&mut self) -> &str {
        let request = self.hint_request();
        let answer = self.hints.hint(&request.layout, &request.commands);
        self.resolve_hint(answer)
    }

    pub fn level_source(&self) -> Arc<dyn LevelSource> {
        Arc::clone(&self.levels)
    }

    pub fn hint_source(&self) -> Arc<dyn HintSource> {
        Arc::clone(&self.hints)
    }

    pub fn level(&self) -> &LevelData {
        &self.level
    }

    pub fn grid(&self) -> &LevelGrid {
        &self.grid
    }

    pub fn program(&self) -> &ProgramBuffer {
        &self.program
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Score banked from levels already won.
    pub fn banked_score(&self) -> u32 {
        self.banked_score
    }

    /// Banked score plus the current level's score.
    pub fn total_score(&self) -> u32 {
        self.banked_score.saturating_add(self.state.score)
    }
}
