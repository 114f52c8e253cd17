use std::collections::VecDeque;

use super::{Action, Changes, EditError};
use crate::song::Song;

/// Strict LIFO undo/redo over applied actions. A new action throws away
/// whatever could have been redone. Unbounded unless built with a limit.
#[derive(Clone, Debug, Default)]
pub struct UndoHistory {
    undo: VecDeque<Action>,
    redo: Vec<Action>,
    limit: Option<usize>,
}

impl UndoHistory {
    /// Keeps at most `limit` undo steps, forgetting the oldest first.
    /// `None` keeps everything.
    pub fn with_limit(limit: Option<usize>) -> Self {
        Self {
            limit: limit.map(|l| l.max(1)),
            ..Self::default()
        }
    }

    /// Applies `action` to `song` and records it.
    pub fn execute(&mut self, action: Action, song: &mut Song) -> Result<Changes, EditError> {
        action.apply(song)?;
        let changes = action.changes();
        self.push(action);
        Ok(changes)
    }

    /// Records an action that has already been applied.
    pub fn push(&mut self, action: Action) {
        self.redo.clear();
        if self.limit.is_some_and(|limit| self.undo.len() >= limit) {
            self.undo.pop_front();
        }
        self.undo.push_back(action);
    }

    /// `Ok(None)` when there is nothing to undo. A record that no longer
    /// fits the song stays where it was and the error is returned.
    pub fn undo(&mut self, song: &mut Song) -> Result<Option<Changes>, EditError> {
        let Some(action) = self.undo.pop_back() else {
            return Ok(None);
        };
        if let Err(e) = action.revert(song) {
            self.undo.push_back(action);
            return Err(e);
        }
        let changes = action.changes();
        self.redo.push(action);
        Ok(Some(changes))
    }

    pub fn redo(&mut self, song: &mut Song) -> Result<Option<Changes>, EditError> {
        let Some(action) = self.redo.pop() else {
            return Ok(None);
        };
        if let Err(e) = action.apply(song) {
            self.redo.push(action);
            return Err(e);
        }
        let changes = action.changes();
        self.undo.push_back(action);
        Ok(Some(changes))
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_label(&self) -> Option<&'static str> {
        self.undo.back().map(Action::label)
    }

    pub fn redo_label(&self) -> Option<&'static str> {
        self.redo.last().map(Action::label)
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
