use crate::types::{Role, Turn};

/// The ordered turns of one conversation.
///
/// The first turn is always the system turn and it is never removed.  Outside
/// of this crate the history is read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    /// Creates a history holding only the system turn.
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
        }
    }

    /// All turns, system turn first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// False for any history built by [`History::new`].
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The system prompt the conversation was started with.
    pub fn system(&self) -> &Turn {
        &self.turns[0]
    }

    pub fn last(&self) -> &Turn {
        &self.turns[self.turns.len() - 1]
    }

    /// True when the last turn is a user turn nobody answered.
    pub fn is_dangling(&self) -> bool {
        self.last().role() == Role::User
    }

    /// Number of answered user turns.
    pub fn exchanges(&self) -> usize {
        self.turns
            .iter()
            .filter(|turn| turn.role() == Role::Assistant)
            .count()
    }

    /// Drops everything but the system turn.
    pub fn reset(&mut self) {
        self.turns.truncate(1);
    }

    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Shrinks the history to `len` turns, never below the system turn.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.turns.truncate(len.max(1));
    }
}
