use serde::{Deserialize, Serialize};

use crate::Command;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProgramError {
    #[error("Command index {index} is out of range for a program of {len} commands")]
    IndexOutOfRange { index: usize, len: usize },
}

/// The ordered list of commands a player has queued.
///
/// The buffer knows nothing about execution; keeping it unchanged while a
/// program runs is the session's job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramBuffer {
    commands: Vec<Command>,
}

impl ProgramBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, command: Command) {
        self.commands.push(command);
    }

    /// Removes and returns the command at `index`, shifting later commands down.
    pub fn remove_at(&mut self, index: usize) -> Result<Command, ProgramError> {
        if index >= self.commands.len() {
            return Err(ProgramError::IndexOutOfRange {
                index,
                len: self.commands.len(),
            });
        }
        Ok(self.commands.remove(index))
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Command> {
        self.commands.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Command> + '_ {
        self.commands.iter().copied()
    }

    /// The wire tokens of every queued command, in order.
    pub fn tokens(&self) -> Vec<String> {
        self.iter().map(|c| c.token().to_string()).collect()
    }
}

impl From<Vec<Command>> for ProgramBuffer {
    fn from(commands: Vec<Command>) -> Self {
        ProgramBuffer { commands }
    }
}
