//! The program execution state machine.
//!
//! [`tick`] is a pure transition: it takes the previous [`ExecutionState`],
//! the queued program and the current grid, and returns the next state, the
//! next grid and the events the transition produced. Pacing lives in
//! [`crate::scheduler`], ownership in [`crate::session`].

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Direction, Position,
    level::{Cell, LevelGrid},
    program::ProgramBuffer,
};

/// Score awarded for each coin picked up.
pub const COIN_REWARD: u32 = 50;
/// Flat score for reaching the goal.
pub const WIN_BASE_BONUS: u32 = 100;
/// Extra score per queued command under par.
pub const PAR_BONUS_PER_MOVE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("The program is empty")]
    EmptyProgram,
    #[error("A program is already running")]
    AlreadyRunning,
    #[error("The level is finished; reset before running again")]
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Idle,
    Running,
    Won,
    Lost,
}

/// Why a move ended the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrashReason {
    OutOfBounds,
    Obstacle,
}

/// Represents the outcome of one tick, for anything that renders or logs play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Moved {
        step: usize,
        from: Position,
        to: Position,
        direction: Direction,
    },
    CoinCollected {
        step: usize,
        at: Position,
        reward: u32,
    },
    Crashed {
        step: usize,
        at: Position,
        direction: Direction,
        reason: CrashReason,
    },
    Won {
        step: usize,
        at: Position,
        bonus: u32,
    },
    ProgramExhausted,
}

/// Everything the engine tracks between ticks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub status: Status,
    /// The command being shown as executing, if any.
    pub executing_index: Option<usize>,
    /// The command the next tick will execute.
    pub next_step: usize,
    pub position: Position,
    pub direction: Direction,
    pub score: u32,
    pub coins_collected: u32,
    pub total_coins: u32,
    pub par: u32,
}

impl ExecutionState {
    /// A fresh idle state at the grid's start, facing right.
    pub fn new(grid: &LevelGrid, par: u32) -> Self {
        ExecutionState {
            status: Status::Idle,
            executing_index: None,
            next_step: 0,
            position: grid.start(),
            direction: Direction::Right,
            score: 0,
            coins_collected: 0,
            total_coins: u32::try_from(grid.coin_count()).unwrap_or(u32::MAX),
            par,
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    /// `Won` and `Lost` only leave through a reset.
    #[inline]
    pub fn is_finished(&self) -> bool {
        matches!(self.status, Status::Won | Status::Lost)
    }
}

/// The result of a single [`tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    pub state: ExecutionState,
    pub grid: LevelGrid,
    pub events: Vec<EngineEvent>,
}

/// Score for reaching the goal with `program_len` commands queued.
///
/// Counts every queued command, including ones after the goal-reaching step.
pub fn win_bonus(par: u32, program_len: usize) -> u32 {
    let queued = u32::try_from(program_len).unwrap_or(u32::MAX);
    WIN_BASE_BONUS.saturating_add(par.saturating_sub(queued).saturating_mul(PAR_BONUS_PER_MOVE))
}

/// Moves an idle state into `Running` from wherever the robot stands.
pub fn start(state: &ExecutionState, program: &ProgramBuffer) -> Result<ExecutionState, EngineError> {
    match state.status {
        Status::Running => return Err(EngineError::AlreadyRunning),
        Status::Won | Status::Lost => return Err(EngineError::Finished),
        Status::Idle => {}
    }
    if program.is_empty() {
        return Err(EngineError::EmptyProgram);
    }
    Ok(ExecutionState {
        status: Status::Running,
        executing_index: None,
        next_step: 0,
        ..state.clone()
    })
}

/// Executes one queued command.
///
/// States that are not `Running` come back unchanged with no events.
pub fn tick(state: &ExecutionState, program: &ProgramBuffer, grid: &LevelGrid) -> Tick {
    let mut next = state.clone();
    let mut events = Vec::new();

    if !state.is_running() {
        return Tick {
            state: next,
            grid: grid.clone(),
            events,
        };
    }

    let step = state.next_step;
    let Some(command) = program.get(step) else {
        debug!(step, "program exhausted");
        next.status = Status::Idle;
        next.executing_index = None;
        next.next_step = 0;
        events.push(EngineEvent::ProgramExhausted);
        return Tick {
            state: next,
            grid: grid.clone(),
            events,
        };
    };

    next.executing_index = Some(step);
    // Facing changes even when the move fails.
    next.direction = command.direction();

    let target = grid
        .neighbor(state.position, next.direction)
        .ok_or(CrashReason::OutOfBounds)
        .and_then(|pos| match grid.cell_at(pos) {
            Ok(Cell::Obstacle) => Err(CrashReason::Obstacle),
            Ok(_) => Ok(pos),
            Err(_) => Err(CrashReason::OutOfBounds),
        });

    let target = match target {
        Ok(pos) => pos,
        Err(reason) => {
            debug!(step, %command, at = %state.position, ?reason, "crashed");
            next.status = Status::Lost;
            events.push(EngineEvent::Crashed {
                step,
                at: state.position,
                direction: next.direction,
                reason,
            });
            return Tick {
                state: next,
                grid: grid.clone(),
                events,
            };
        }
    };

    next.position = target;
    events.push(EngineEvent::Moved {
        step,
        from: state.position,
        to: target,
        direction: next.direction,
    });
    debug!(step, %command, to = %target, "moved");

    let mut next_grid = None;
    match grid.cell_at(target) {
        Ok(Cell::Coin) => {
            next.coins_collected += 1;
            next.score += COIN_REWARD;
            next_grid = Some(grid.collect_coin_at(target));
            events.push(EngineEvent::CoinCollected {
                step,
                at: target,
                reward: COIN_REWARD,
            });
        }
        Ok(Cell::Goal) => {
            let bonus = win_bonus(state.par, program.len());
            next.score += bonus;
            next.status = Status::Won;
            events.push(EngineEvent::Won {
                step,
                at: target,
                bonus,
            });
            return Tick {
                state: next,
                grid: grid.clone(),
                events,
            };
        }
        _ => {}
    }

    // Exhaustion is picked up by the following tick, so the last command
    // stays highlighted for one interval.
    next.next_step = step + 1;

    Tick {
        state: next,
        grid: next_grid.unwrap_or_else(|| grid.clone()),
        events,
    }
}

/// Ticks until the state stops running. Ignores pacing; used by tests and
/// by tooling that only needs the outcome.
pub fn run_to_completion(
    state: &ExecutionState,
    program: &ProgramBuffer,
    grid: &LevelGrid,
) -> Tick {
    let mut current = Tick {
        state: state.clone(),
        grid: grid.clone(),
        events: Vec::new(),
    };
    while current.state.is_running() {
        let Tick {
            state,
            grid,
            mut events,
        } = tick(&current.state, program, &current.grid);
        current.events.append(&mut events);
        current.state = state;
        current.grid = grid;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Command::{self, *};

    const TUTORIAL: [&str; 5] = ["S....", ".XXX.", "....C", ".XXX.", "....G"];
    const PAR: u32 = 8;

    fn setup() -> (ExecutionState, LevelGrid) {
        let grid = LevelGrid::load(&TUTORIAL).unwrap();
        (ExecutionState::new(&grid, PAR), grid)
    }

    fn run(commands: Vec<Command>) -> (Tick, ProgramBuffer) {
        let (state, grid) = setup();
        let program = ProgramBuffer::from(commands);
        let running = start(&state, &program).unwrap();
        (run_to_completion(&running, &program, &grid), program)
    }

    #[test]
    fn new_state_starts_idle_at_start_facing_right() {
        let (state, _) = setup();
        assert_eq!(state.status, Status::Idle);
        assert_eq!(state.position, Position::new(0, 0));
        assert_eq!(state.direction, Direction::Right);
        assert_eq!(state.total_coins, 1);
        assert_eq!(state.executing_index, None);
    }

    #[test]
    fn start_rejects_empty_and_finished() {
        let (state, _) = setup();
        assert_eq!(
            start(&state, &ProgramBuffer::new()),
            Err(EngineError::EmptyProgram)
        );

        let program = ProgramBuffer::from(vec![Right]);
        let running = start(&state, &program).unwrap();
        assert_eq!(start(&running, &program), Err(EngineError::AlreadyRunning));

        let lost = ExecutionState {
            status: Status::Lost,
            ..state
        };
        assert_eq!(start(&lost, &program), Err(EngineError::Finished));
    }

    #[test]
    fn path_through_coin_wins_with_coin() {
        let (result, _) = run(vec![Right, Right, Right, Right, Down, Down, Down, Down]);
        assert_eq!(result.state.status, Status::Won);
        assert_eq!(result.state.position, Position::new(4, 4));
        assert_eq!(result.state.coins_collected, 1);
        assert_eq!(result.state.score, COIN_REWARD + WIN_BASE_BONUS);
        assert_eq!(result.state.executing_index, Some(7));
        assert_eq!(result.grid.coin_count(), 0);
        assert!(
            result
                .events
                .contains(&EngineEvent::CoinCollected {
                    step: 5,
                    at: Position::new(4, 2),
                    reward: COIN_REWARD
                })
        );
    }

    #[test]
    fn path_around_coin_wins_without_coin() {
        let (result, _) = run(vec![Down, Down, Down, Down, Right, Right, Right, Right]);
        assert_eq!(result.state.status, Status::Won);
        assert_eq!(result.state.coins_collected, 0);
        assert!(result.state.score >= WIN_BASE_BONUS);
        assert_eq!(result.grid.coin_count(), 1);
    }

    #[test]
    fn leaving_the_left_edge_loses_in_place() {
        let (result, _) = run(vec![Left]);
        assert_eq!(result.state.status, Status::Lost);
        assert_eq!(result.state.position, Position::new(0, 0));
        assert_eq!(result.state.executing_index, Some(0));
        assert_eq!(result.state.direction, Direction::Left);
        assert_eq!(
            result.events,
            vec![EngineEvent::Crashed {
                step: 0,
                at: Position::new(0, 0),
                direction: Direction::Left,
                reason: CrashReason::OutOfBounds,
            }]
        );
    }

    #[test]
    fn leaving_the_right_edge_loses_at_failing_step() {
        let (result, _) = run(vec![Right, Right, Right, Right, Right, Down]);
        assert_eq!(result.state.status, Status::Lost);
        assert_eq!(result.state.position, Position::new(4, 0));
        assert_eq!(result.state.executing_index, Some(4));
    }

    #[test]
    fn leaving_the_bottom_edge_loses() {
        let (result, _) = run(vec![Down, Down, Down, Down, Down]);
        assert_eq!(result.state.status, Status::Lost);
        assert_eq!(result.state.position, Position::new(0, 4));
        assert_eq!(result.state.executing_index, Some(4));
    }

    #[test]
    fn hitting_an_obstacle_loses_in_place() {
        let (result, _) = run(vec![Down, Right, Right]);
        assert_eq!(result.state.status, Status::Lost);
        assert_eq!(result.state.position, Position::new(0, 1));
        assert_eq!(result.state.executing_index, Some(1));
        assert!(matches!(
            result.events.last(),
            Some(EngineEvent::Crashed {
                reason: CrashReason::Obstacle,
                ..
            })
        ));
    }

    #[test]
    fn coin_is_only_collected_once() {
        let (result, _) = run(vec![Right, Right, Right, Right, Down, Down, Up, Down]);
        assert_eq!(result.state.status, Status::Idle);
        assert_eq!(result.state.coins_collected, 1);
        assert_eq!(result.state.score, COIN_REWARD);
    }

    #[test]
    fn exhausting_the_program_returns_to_idle() {
        let (result, _) = run(vec![
            Right, Right, Right, Right, Down, Down, Left, Left, Left, Left,
        ]);
        assert_eq!(result.state.status, Status::Idle);
        assert_eq!(result.state.executing_index, None);
        assert_eq!(result.state.position, Position::new(0, 2));
        assert_eq!(result.state.coins_collected, 1);
        assert_eq!(result.events.last(), Some(&EngineEvent::ProgramExhausted));
    }

    #[test]
    fn last_command_stays_highlighted_until_the_next_tick() {
        let (state, grid) = setup();
        let program = ProgramBuffer::from(vec![Down]);
        let running = start(&state, &program).unwrap();

        let first = tick(&running, &program, &grid);
        assert_eq!(first.state.status, Status::Running);
        assert_eq!(first.state.executing_index, Some(0));

        let second = tick(&first.state, &program, &first.grid);
        assert_eq!(second.state.status, Status::Idle);
        assert_eq!(second.state.executing_index, None);
        assert_eq!(second.state.position, Position::new(0, 1));
    }

    #[test]
    fn win_stops_before_trailing_commands() {
        let (result, program) = run(vec![
            Down, Down, Down, Down, Right, Right, Right, Right, Up, Up,
        ]);
        assert_eq!(result.state.status, Status::Won);
        assert_eq!(result.state.position, Position::new(4, 4));
        assert_eq!(result.state.executing_index, Some(7));
        // Trailing commands still count against the bonus.
        assert_eq!(result.state.score, win_bonus(PAR, program.len()));
        assert_eq!(result.state.score, WIN_BASE_BONUS);
    }

    #[test]
    fn ticking_a_stopped_state_changes_nothing() {
        let (state, grid) = setup();
        let program = ProgramBuffer::from(vec![Right]);
        let result = tick(&state, &program, &grid);
        assert_eq!(result.state, state);
        assert!(result.events.is_empty());
    }

    #[test]
    fn win_bonus_rewards_short_programs() {
        assert_eq!(win_bonus(8, 6), 120);
        assert_eq!(win_bonus(8, 8), WIN_BASE_BONUS);
        assert_eq!(win_bonus(8, 12), WIN_BASE_BONUS);
        assert!(win_bonus(8, 7) > win_bonus(8, 9));
        assert!(win_bonus(8, 8) >= win_bonus(8, 9));
        assert_eq!(win_bonus(0, usize::MAX), WIN_BASE_BONUS);
    }
}
