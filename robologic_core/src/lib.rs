use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod engine;
pub mod level;
pub mod map;
pub mod program;
pub mod scheduler;
pub mod session;
pub mod solver;
pub mod source;

/// Side length of every level grid.
pub const GRID_SIZE: usize = 5;

/// Represents a 2D coordinate (x = column, y = row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }

    /// Shifts the position one cell towards `direction`.
    ///
    /// Returns `None` when the shift would go below zero. The upper bound is
    /// the grid's concern.
    pub fn step(self, direction: Direction) -> Option<Position> {
        let (dx, dy) = direction.delta();
        Some(Position {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The way the robot is facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Column and row offset of a single step.
    #[inline]
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// A queued movement instruction.
///
/// Same vocabulary as [`Direction`], but an instruction rather than a facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Command {
    Up,
    Down,
    Left,
    Right,
}

impl Command {
    pub const ALL: [Command; 4] = [Command::Up, Command::Down, Command::Left, Command::Right];

    pub fn direction(self) -> Direction {
        match self {
            Command::Up => Direction::Up,
            Command::Down => Direction::Down,
            Command::Left => Direction::Left,
            Command::Right => Direction::Right,
        }
    }

    /// The wire token (`UP`, `DOWN`, `LEFT`, `RIGHT`).
    pub fn token(self) -> &'static str {
        match self {
            Command::Up => "UP",
            Command::Down => "DOWN",
            Command::Left => "LEFT",
            Command::Right => "RIGHT",
        }
    }
}

impl From<Direction> for Command {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Up => Command::Up,
            Direction::Down => Command::Down,
            Direction::Left => Command::Left,
            Direction::Right => Command::Right,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown command token '{0}'")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Ok(Command::Up),
            "DOWN" => Ok(Command::Down),
            "LEFT" => Ok(Command::Left),
            "RIGHT" => Ok(Command::Right),
            _ => Err(UnknownCommand(s.to_string())),
        }
    }
}
