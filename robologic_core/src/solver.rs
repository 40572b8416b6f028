//! Shortest programs from start to goal.

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap},
};

use crate::{
    Command, Direction, Position,
    level::{Cell, LevelGrid},
};

/// Returns manhattan distance between two positions
fn manhattan_distance(a: Position, b: Position) -> usize {
    a.x.abs_diff(b.x) + a.y.abs_diff(b.y)
}

/// Finds a shortest command sequence that walks the robot from start to goal
/// without leaving the grid or touching an obstacle.
///
/// Returns `None` if the goal is unreachable.
pub fn solve(grid: &LevelGrid) -> Option<Vec<Command>> {
    shortest_path(grid, grid.start(), grid.goal())
}

/// A* over the four move directions.
pub fn shortest_path(grid: &LevelGrid, start: Position, goal: Position) -> Option<Vec<Command>> {
    // For priority queue
    #[derive(Clone, Eq, PartialEq)]
    struct PrioritizedItem {
        priority: usize,
        position: Position,
    }

    impl Ord for PrioritizedItem {
        fn cmp(&self, other: &Self) -> Ordering {
            // Reverse ordering for min-heap behavior
            other.priority.cmp(&self.priority)
        }
    }

    impl PartialOrd for PrioritizedItem {
        fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
            Some(self.cmp(other))
        }
    }

    let mut frontier = BinaryHeap::new();
    let mut came_from: HashMap<Position, (Position, Direction)> = HashMap::new();
    let mut cost_so_far: HashMap<Position, usize> = HashMap::new();

    frontier.push(PrioritizedItem {
        priority: 0,
        position: start,
    });
    cost_so_far.insert(start, 0);

    while let Some(PrioritizedItem {
        position: current, ..
    }) = frontier.pop()
    {
        if current == goal {
            return Some(reconstruct(&came_from, start, goal));
        }

        let current_cost = cost_so_far.get(&current).copied().unwrap_or(usize::MAX);
        for direction in Direction::ALL {
            let Some(neighbor) = grid.neighbor(current, direction) else {
                continue;
            };
            if grid.cell_at(neighbor) == Ok(Cell::Obstacle) {
                continue;
            }

            let new_cost = current_cost + 1;
            if cost_so_far.get(&neighbor).is_none_or(|&known| new_cost < known) {
                cost_so_far.insert(neighbor, new_cost);
                frontier.push(PrioritizedItem {
                    priority: new_cost + manhattan_distance(neighbor, goal),
                    position: neighbor,
                });
                came_from.insert(neighbor, (current, direction));
            }
        }
    }

    None
}

fn reconstruct(
    came_from: &HashMap<Position, (Position, Direction)>,
    start: Position,
    goal: Position,
) -> Vec<Command> {
    let mut commands = Vec::new();
    let mut current = goal;
    while current != start {
        match came_from.get(&current) {
            Some(&(previous, direction)) => {
                commands.push(Command::from(direction));
                current = previous;
            }
            None => break,
        }
    }
    commands.reverse();
    commands
}
