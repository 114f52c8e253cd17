//! Every structural change to a song goes through here.
//!
//! A front-end describes what it wants as an [`EditCommand`]. Preparing the
//! command against the current song checks its indices and captures
//! everything needed to take it back, producing an [`Action`]. Actions are
//! applied, then kept in the [`UndoHistory`].

mod action;
mod history;

use thiserror::Error;

pub use action::{Action, Changes};
pub use history::UndoHistory;

use crate::song::{Instrument, InstrumentId, Note, Pattern, Song};

#[derive(Error, Clone, Debug, PartialEq)]
pub enum EditError {
    #[error("no pattern at index {0}")]
    InvalidPattern(usize),

    #[error("no instrument at row {0}")]
    InvalidInstrumentRow(usize),

    #[error("instrument {0:?} does not exist")]
    UnknownInstrument(InstrumentId),

    #[error("arrangement column {0} is out of range")]
    InvalidColumn(usize),

    #[error("tick {position} is outside the pattern (length {length})")]
    PositionOutOfRange { position: u32, length: u32 },

    #[error("a note already exists at tick {position}")]
    NoteExists { position: u32 },

    #[error("no note at tick {position}")]
    NoteMissing { position: u32 },

    #[error("the last pattern cannot be deleted")]
    LastPattern,

    /// An undo record no longer fits the song it is applied to.
    #[error("edit history does not match the song")]
    HistoryMismatch,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EditCommand {
    AddNote { pattern: usize, note: Note },
    RemoveNote { pattern: usize, position: u32, instrument: InstrumentId },
    // swaps the note at the same (position, instrument) for this one
    ReplaceNote { pattern: usize, note: Note },
    AddInstrument { row: Option<usize>, instrument: Instrument }, // None appends
    DeleteInstrument { row: usize },
    RenameInstrument { row: usize, name: String },
    AddPattern { index: Option<usize>, pattern: Pattern }, // None appends
    DeletePattern { index: usize },
    RenamePattern { index: usize, name: String },
    ToggleArrangementCell { column: usize, pattern: usize },
}

fn pattern_of(song: &Song, index: usize) -> Result<&Pattern, EditError> {
    song.patterns.get(index).ok_or(EditError::InvalidPattern(index))
}

fn checked_note(song: &Song, pattern: &Pattern, note: Note) -> Result<Note, EditError> {
    if !song.instruments.contains(note.instrument) {
        return Err(EditError::UnknownInstrument(note.instrument));
    }
    if note.position >= pattern.length() {
        return Err(EditError::PositionOutOfRange { position: note.position, length: pattern.length() });
    }
    Ok(note.clamped())
}

impl EditCommand {
    /// Checks the command against `song` and turns it into an action that
    /// can be applied and reverted. Nothing is changed yet.
    pub fn prepare(self, song: &Song) -> Result<Action, EditError> {
        match self {
            EditCommand::AddNote { pattern, note } => {
                let p = pattern_of(song, pattern)?;
                let note = checked_note(song, p, note)?;
                if p.note_at(note.position, note.instrument).is_some() {
                    return Err(EditError::NoteExists { position: note.position });
                }
                Ok(Action::AddNote { pattern, note })
            }
            EditCommand::RemoveNote { pattern, position, instrument } => {
                let p = pattern_of(song, pattern)?;
                let note = *p
                    .note_at(position, instrument)
                    .ok_or(EditError::NoteMissing { position })?;
                Ok(Action::RemoveNote { pattern, note })
            }
            EditCommand::ReplaceNote { pattern, note } => {
                let p = pattern_of(song, pattern)?;
                let new = checked_note(song, p, note)?;
                let old = *p
                    .note_at(new.position, new.instrument)
                    .ok_or(EditError::NoteMissing { position: new.position })?;
                Ok(Action::ReplaceNote { pattern, old, new })
            }
            EditCommand::AddInstrument { row, instrument } => {
                let len = song.instruments.len();
                let row = row.unwrap_or(len);
                if row > len {
                    return Err(EditError::InvalidInstrumentRow(row));
                }
                Ok(Action::AddInstrument { row, id: song.instruments.next_id(), instrument })
            }
            EditCommand::DeleteInstrument { row } => {
                let id = song.instrument_id(row).ok_or(EditError::InvalidInstrumentRow(row))?;
                let instrument = song.instruments.get(id).ok_or(EditError::UnknownInstrument(id))?.clone();
                let detached = song
                    .patterns
                    .iter()
                    .enumerate()
                    .flat_map(|(i, p)| p.notes().iter().filter(|n| n.instrument == id).map(move |n| (i, *n)))
                    .collect();
                Ok(Action::DeleteInstrument { row, id, instrument, detached })
            }
            EditCommand::RenameInstrument { row, name } => {
                let inst = song.instruments.at(row).ok_or(EditError::InvalidInstrumentRow(row))?;
                let id = song.instrument_id(row).ok_or(EditError::InvalidInstrumentRow(row))?;
                Ok(Action::RenameInstrument { id, old: inst.name.clone(), new: name })
            }
            EditCommand::AddPattern { index, pattern } => {
                let count = song.pattern_count();
                let index = index.unwrap_or(count);
                if index > count {
                    return Err(EditError::InvalidPattern(index));
                }
                let after = song
                    .arrangement
                    .iter()
                    .map(|g| g.iter().map(|&p| if p >= index { p + 1 } else { p }).collect())
                    .collect();
                Ok(Action::AddPattern { index, pattern, before: song.arrangement.clone(), after })
            }
            EditCommand::DeletePattern { index } => {
                let pattern = pattern_of(song, index)?.clone();
                if song.pattern_count() == 1 {
                    return Err(EditError::LastPattern);
                }
                let after = song
                    .arrangement
                    .iter()
                    .map(|g| {
                        g.iter()
                            .filter(|&&p| p != index)
                            .map(|&p| if p > index { p - 1 } else { p })
                            .collect()
                    })
                    .collect();
                Ok(Action::DeletePattern { index, pattern, before: song.arrangement.clone(), after })
            }
            EditCommand::RenamePattern { index, name } => {
                let p = pattern_of(song, index)?;
                Ok(Action::RenamePattern { index, old: p.name.clone(), new: name })
            }
            EditCommand::ToggleArrangementCell { column, pattern } => {
                pattern_of(song, pattern)?;
                // one past the end opens a new column
                if column > song.column_count() {
                    return Err(EditError::InvalidColumn(column));
                }
                let mut new = song.arrangement.clone();
                if column == new.len() {
                    new.push(Vec::new());
                }
                let group = &mut new[column];
                match group.binary_search(&pattern) {
                    Ok(i) => {
                        group.remove(i);
                    }
                    Err(i) => group.insert(i, pattern),
                }
                // trailing empty columns are dropped
                while new.len() > 1 && new.last().is_some_and(|g| g.is_empty()) {
                    new.pop();
                }
                Ok(Action::SetArrangement { old: song.arrangement.clone(), new })
            }
        }
    }
}
