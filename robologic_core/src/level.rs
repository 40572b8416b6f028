//! Level layouts: the cell vocabulary, the parsed grid and the level record
//! exchanged with level sources.

use serde::{Deserialize, Serialize};

use crate::{
    Direction, Position,
    map::{Grid, GridError},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LevelError {
    #[error("Malformed level: {0}")]
    MalformedLevel(String),
}

/// Represents the type of a cell in a level layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    Empty,
    Obstacle,
    Start,
    Goal,
    Coin,
}

impl Cell {
    pub fn from_char(c: char) -> Option<Cell> {
        match c {
            '.' => Some(Cell::Empty),
            'X' => Some(Cell::Obstacle),
            'S' => Some(Cell::Start),
            'G' => Some(Cell::Goal),
            'C' => Some(Cell::Coin),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::Obstacle => 'X',
            Cell::Start => 'S',
            Cell::Goal => 'G',
            Cell::Coin => 'C',
        }
    }
}

/// A parsed level layout.
///
/// Always holds exactly one start and one goal. The only change a grid ever
/// sees during play is a coin turning into [`Cell::Empty`], and that produces a
/// new value through [`LevelGrid::collect_coin_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelGrid {
    cells: Grid<Cell>,
    start: Position,
    goal: Position,
}

impl LevelGrid {
    /// Parses a layout given as rows of `S G X C .` characters.
    pub fn load<S: AsRef<str>>(rows: &[S]) -> Result<LevelGrid, LevelError> {
        let height = rows.len();
        if height == 0 {
            return Err(malformed("layout has no rows"));
        }

        let parsed: Vec<Vec<char>> = rows.iter().map(|r| r.as_ref().chars().collect()).collect();
        let width = parsed[0].len();
        if width == 0 {
            return Err(malformed("layout has zero width"));
        }
        for (y, row) in parsed.iter().enumerate() {
            if row.len() != width {
                return Err(malformed(format!(
                    "inconsistent width at row {}: expected {}, found {}",
                    y,
                    width,
                    row.len()
                )));
            }
        }

        let mut start: Option<Position> = None;
        let mut goal: Option<Position> = None;
        let cells = Grid::try_from_generator(width, height, |pos| {
            let c = parsed[pos.y][pos.x];
            let cell = Cell::from_char(c).ok_or_else(|| {
                malformed(format!("unknown cell code '{}' at position {}", c, pos))
            })?;
            match cell {
                Cell::Start if start.is_some() => {
                    return Err(malformed("multiple start positions ('S') found"));
                }
                Cell::Start => start = Some(pos),
                Cell::Goal if goal.is_some() => {
                    return Err(malformed("multiple goal positions ('G') found"));
                }
                Cell::Goal => goal = Some(pos),
                _ => {}
            }
            Ok(cell)
        })?;

        let start = start.ok_or_else(|| malformed("no start position ('S') found"))?;
        let goal = goal.ok_or_else(|| malformed("no goal position ('G') found"))?;

        Ok(LevelGrid { cells, start, goal })
    }

    /// Fails unless the grid is exactly `size` by `size`.
    pub fn check_size(&self, size: usize) -> Result<(), LevelError> {
        if self.width() != size || self.height() != size {
            return Err(malformed(format!(
                "expected a {size}x{size} grid, found {}x{}",
                self.width(),
                self.height()
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.cells.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.cells.height()
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn goal(&self) -> Position {
        self.goal
    }

    pub fn contains(&self, position: Position) -> bool {
        self.cells.contains(position)
    }

    pub fn cell_at(&self, position: Position) -> Result<Cell, GridError> {
        self.cells.try_get(position).copied()
    }

    /// The in-bounds neighbour of `position` towards `direction`, if any.
    pub fn neighbor(&self, position: Position, direction: Direction) -> Option<Position> {
        position.step(direction).filter(|p| self.contains(*p))
    }

    /// Number of coins still on the grid.
    pub fn coin_count(&self) -> usize {
        self.cells.iter().filter(|c| **c == Cell::Coin).count()
    }

    /// Returns a grid with the coin at `position` cleared.
    ///
    /// Anything other than an in-bounds coin yields an unchanged copy.
    pub fn collect_coin_at(&self, position: Position) -> LevelGrid {
        let mut next = self.clone();
        if self.cells.get(position) == Some(&Cell::Coin) {
            // In bounds, checked just above.
            let _ = next.cells.set(position, Cell::Empty);
        }
        next
    }

    /// Serializes back to the layout text format.
    pub fn to_rows(&self) -> Vec<String> {
        self.cells
            .rows()
            .map(|row| row.iter().map(|c| c.to_char()).collect())
            .collect()
    }

    pub fn enumerate(&self) -> impl Iterator<Item = (Position, Cell)> + '_ {
        self.cells.enumerate().map(|(p, c)| (p, *c))
    }
}

fn malformed(reason: impl Into<String>) -> LevelError {
    LevelError::MalformedLevel(reason.into())
}

/// A level as produced by a level source or the fallback table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelData {
    pub id: u32,
    pub grid_size: usize,
    pub layout: Vec<String>,
    pub story: String,
    pub difficulty: String,
    /// Target number of moves.
    pub par: u32,
}

impl LevelData {
    pub fn grid(&self) -> Result<LevelGrid, LevelError> {
        LevelGrid::load(&self.layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TUTORIAL: [&str; 5] = ["S....", ".XXX.", "....C", ".XXX.", "....G"];

    fn reason(err: LevelError) -> String {
        let LevelError::MalformedLevel(reason) = err;
        reason
    }

    #[test]
    fn load_finds_start_goal_and_coins() {
        let grid = LevelGrid::load(&TUTORIAL).unwrap();
        assert_eq!(grid.width(), 5);
        assert_eq!(grid.height(), 5);
        assert_eq!(grid.start(), Position::new(0, 0));
        assert_eq!(grid.goal(), Position::new(4, 4));
        assert_eq!(grid.coin_count(), 1);
        assert_eq!(grid.cell_at(Position::new(1, 1)), Ok(Cell::Obstacle));
        assert!(grid.check_size(5).is_ok());
    }

    #[test]
    fn enumerate_walks_rows_top_to_bottom() {
        let grid = LevelGrid::load(&["SC", "XG"]).unwrap();
        let cells: Vec<(Position, Cell)> = grid.enumerate().collect();
        assert_eq!(
            cells,
            vec![
                (Position::new(0, 0), Cell::Start),
                (Position::new(1, 0), Cell::Coin),
                (Position::new(0, 1), Cell::Obstacle),
                (Position::new(1, 1), Cell::Goal),
            ]
        );
    }

    #[test]
    fn load_rejects_ragged_rows() {
        let err = LevelGrid::load(&["S..", "..", "..G"]).unwrap_err();
        assert!(reason(err).contains("inconsistent width at row 1"));
    }

    #[test]
    fn load_requires_exactly_one_start() {
        assert!(reason(LevelGrid::load(&["...", ".G."]).unwrap_err()).contains("no start"));
        assert!(reason(LevelGrid::load(&["S.S", ".G."]).unwrap_err()).contains("multiple start"));
    }

    #[test]
    fn load_requires_exactly_one_goal() {
        assert!(reason(LevelGrid::load(&["S..", "..."]).unwrap_err()).contains("no goal"));
        assert!(reason(LevelGrid::load(&["S.G", "G.."]).unwrap_err()).contains("multiple goal"));
    }

    #[test]
    fn load_rejects_unknown_characters() {
        let err = LevelGrid::load(&["S.?", "..G"]).unwrap_err();
        assert!(reason(err).contains("unknown cell code '?' at position (2, 0)"));
    }

    #[test]
    fn load_rejects_empty_layouts() {
        let empty: [&str; 0] = [];
        assert!(LevelGrid::load(&empty).is_err());
        assert!(LevelGrid::load(&["", ""]).is_err());
    }

    #[test]
    fn cell_at_reports_out_of_bounds() {
        let grid = LevelGrid::load(&TUTORIAL).unwrap();
        assert!(matches!(
            grid.cell_at(Position::new(5, 0)),
            Err(GridError::OutOfBounds { x: 5, y: 0, .. })
        ));
    }

    #[test]
    fn collecting_a_coin_round_trips_through_text() {
        let grid = LevelGrid::load(&TUTORIAL).unwrap();
        let collected = grid.collect_coin_at(Position::new(4, 2));
        assert_eq!(collected.coin_count(), 0);
        assert_eq!(collected.to_rows()[2], ".....");
        assert_eq!(LevelGrid::load(&collected.to_rows()).unwrap(), collected);
        // The source grid is untouched.
        assert_eq!(grid.to_rows(), TUTORIAL.to_vec());
    }

    #[test]
    fn collecting_elsewhere_is_a_no_op() {
        let grid = LevelGrid::load(&TUTORIAL).unwrap();
        assert_eq!(grid.collect_coin_at(Position::new(1, 1)), grid);
        assert_eq!(grid.collect_coin_at(Position::new(9, 9)), grid);
    }

    #[test]
    fn check_size_rejects_other_dimensions() {
        let grid = LevelGrid::load(&["S.G"]).unwrap();
        assert!(grid.check_size(5).is_err());
    }

    #[test]
    fn neighbor_stays_inside() {
        let grid = LevelGrid::load(&TUTORIAL).unwrap();
        assert_eq!(grid.neighbor(Position::new(4, 0), Direction::Right), None);
        assert_eq!(grid.neighbor(Position::new(0, 0), Direction::Up), None);
        assert_eq!(
            grid.neighbor(Position::new(0, 0), Direction::Down),
            Some(Position::new(0, 1))
        );
    }

    #[test]
    fn level_data_uses_camel_case_on_the_wire() {
        let data = LevelData {
            id: 3,
            grid_size: 5,
            layout: TUTORIAL.iter().map(|r| r.to_string()).collect(),
            story: "go".to_string(),
            difficulty: "Easy".to_string(),
            par: 8,
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["gridSize"], 5);
        assert!(data.grid().is_ok());
    }
}
