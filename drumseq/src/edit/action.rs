use super::EditError;
use crate::song::{Instrument, InstrumentId, Note, Pattern, PatternGroup, Song};

/// What an edit touched, so the caller knows which events to send and what
/// to revalidate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Changes {
    pub notes: bool,
    pub instruments: bool,
    pub patterns: bool,
    pub arrangement: bool,
}

// Each variant carries enough to go both ways. Apply and revert check
// everything first and only then mutate, so a failed step leaves the song
// as it was.
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    AddNote { pattern: usize, note: Note },
    RemoveNote { pattern: usize, note: Note },
    ReplaceNote { pattern: usize, old: Note, new: Note },
    AddInstrument { row: usize, id: InstrumentId, instrument: Instrument },
    DeleteInstrument {
        row: usize,
        id: InstrumentId,
        instrument: Instrument,
        detached: Vec<(usize, Note)>, // (pattern index, note)
    },
    RenameInstrument { id: InstrumentId, old: String, new: String },
    AddPattern { index: usize, pattern: Pattern, before: Vec<PatternGroup>, after: Vec<PatternGroup> },
    DeletePattern { index: usize, pattern: Pattern, before: Vec<PatternGroup>, after: Vec<PatternGroup> },
    RenamePattern { index: usize, old: String, new: String },
    SetArrangement { old: Vec<PatternGroup>, new: Vec<PatternGroup> },
}

fn pattern_mut(song: &mut Song, index: usize) -> Result<&mut Pattern, EditError> {
    song.patterns.get_mut(index).ok_or(EditError::InvalidPattern(index))
}

fn insert_note(song: &mut Song, pattern: usize, note: Note) -> Result<(), EditError> {
    if !song.instruments.contains(note.instrument) {
        return Err(EditError::UnknownInstrument(note.instrument));
    }
    pattern_mut(song, pattern)?
        .insert_note(note)
        .map_err(|n| EditError::NoteExists { position: n.position })
}

fn remove_note(song: &mut Song, pattern: usize, note: &Note) -> Result<(), EditError> {
    pattern_mut(song, pattern)?
        .remove_note(note.position, note.instrument)
        .map(|_| ())
        .ok_or(EditError::NoteMissing { position: note.position })
}

fn replace_note(song: &mut Song, pattern: usize, with: Note) -> Result<(), EditError> {
    pattern_mut(song, pattern)?
        .replace_note(with)
        .map(|_| ())
        .ok_or(EditError::NoteMissing { position: with.position })
}

fn arrangement_fits(arrangement: &[PatternGroup], pattern_count: usize) -> bool {
    arrangement.iter().flatten().all(|&p| p < pattern_count)
}

impl Action {
    pub fn changes(&self) -> Changes {
        match self {
            Action::AddNote { .. } | Action::RemoveNote { .. } | Action::ReplaceNote { .. } => Changes {
                notes: true,
                ..Changes::default()
            },
            Action::AddInstrument { .. } | Action::RenameInstrument { .. } => Changes {
                instruments: true,
                ..Changes::default()
            },
            Action::DeleteInstrument { detached, .. } => Changes {
                instruments: true,
                notes: !detached.is_empty(),
                ..Changes::default()
            },
            Action::AddPattern { .. } | Action::DeletePattern { .. } => Changes {
                patterns: true,
                arrangement: true,
                ..Changes::default()
            },
            Action::RenamePattern { .. } => Changes { patterns: true, ..Changes::default() },
            Action::SetArrangement { .. } => Changes { arrangement: true, ..Changes::default() },
        }
    }

    /// Short name for logs and the status line.
    pub fn label(&self) -> &'static str {
        match self {
            Action::AddNote { .. } => "add note",
            Action::RemoveNote { .. } => "remove note",
            Action::ReplaceNote { .. } => "edit note",
            Action::AddInstrument { .. } => "add instrument",
            Action::DeleteInstrument { .. } => "delete instrument",
            Action::RenameInstrument { .. } => "rename instrument",
            Action::AddPattern { .. } => "add pattern",
            Action::DeletePattern { .. } => "delete pattern",
            Action::RenamePattern { .. } => "rename pattern",
            Action::SetArrangement { .. } => "edit arrangement",
        }
    }

    pub fn apply(&self, song: &mut Song) -> Result<(), EditError> {
        match self {
            Action::AddNote { pattern, note } => insert_note(song, *pattern, *note),
            Action::RemoveNote { pattern, note } => remove_note(song, *pattern, note),
            Action::ReplaceNote { pattern, new, .. } => replace_note(song, *pattern, *new),
            Action::AddInstrument { row, id, instrument } => {
                if song.instruments.insert_with_id(*row, *id, instrument.clone()) {
                    Ok(())
                } else {
                    Err(EditError::HistoryMismatch)
                }
            }
            Action::DeleteInstrument { row, id, detached, .. } => {
                if song.instrument_id(*row) != Some(*id) {
                    return Err(EditError::HistoryMismatch);
                }
                if detached.iter().any(|(p, _)| *p >= song.pattern_count()) {
                    return Err(EditError::HistoryMismatch);
                }
                for pattern in &mut song.patterns {
                    pattern.detach_instrument(*id);
                }
                song.instruments.remove(*row);
                Ok(())
            }
            Action::RenameInstrument { id, new, .. } => {
                song.instruments.get_mut(*id).ok_or(EditError::UnknownInstrument(*id))?.name = new.clone();
                Ok(())
            }
            Action::AddPattern { index, pattern, after, .. } => {
                if *index > song.pattern_count() || !arrangement_fits(after, song.pattern_count() + 1) {
                    return Err(EditError::HistoryMismatch);
                }
                song.patterns.insert(*index, pattern.clone());
                song.arrangement = after.clone();
                Ok(())
            }
            Action::DeletePattern { index, after, .. } => {
                if *index >= song.pattern_count() || !arrangement_fits(after, song.pattern_count() - 1) {
                    return Err(EditError::HistoryMismatch);
                }
                song.patterns.remove(*index);
                song.arrangement = after.clone();
                Ok(())
            }
            Action::RenamePattern { index, new, .. } => {
                pattern_mut(song, *index)?.name = new.clone();
                Ok(())
            }
            Action::SetArrangement { new, .. } => {
                if !arrangement_fits(new, song.pattern_count()) {
                    return Err(EditError::HistoryMismatch);
                }
                song.arrangement = new.clone();
                Ok(())
            }
        }
    }

    pub fn revert(&self, song: &mut Song) -> Result<(), EditError> {
        match self {
            Action::AddNote { pattern, note } => remove_note(song, *pattern, note),
            Action::RemoveNote { pattern, note } => insert_note(song, *pattern, *note),
            Action::ReplaceNote { pattern, old, .. } => replace_note(song, *pattern, *old),
            Action::AddInstrument { row, id, .. } => {
                if song.instrument_id(*row) != Some(*id) {
                    return Err(EditError::HistoryMismatch);
                }
                song.instruments.remove(*row);
                Ok(())
            }
            Action::DeleteInstrument { row, id, instrument, detached } => {
                let taken = |(p, note): &(usize, Note)| {
                    song.patterns
                        .get(*p)
                        .is_none_or(|pattern| pattern.note_at(note.position, note.instrument).is_some())
                };
                if detached.iter().any(taken) {
                    return Err(EditError::HistoryMismatch);
                }
                if !song.instruments.insert_with_id(*row, *id, instrument.clone()) {
                    return Err(EditError::HistoryMismatch);
                }
                for (i, (p, note)) in detached.iter().enumerate() {
                    if song.patterns[*p].insert_note(*note).is_err() {
                        // the record names one slot twice; take back what went in
                        for (p, note) in &detached[..i] {
                            song.patterns[*p].remove_note(note.position, note.instrument);
                        }
                        song.instruments.remove(*row);
                        return Err(EditError::HistoryMismatch);
                    }
                }
                Ok(())
            }
            Action::RenameInstrument { id, old, .. } => {
                song.instruments.get_mut(*id).ok_or(EditError::UnknownInstrument(*id))?.name = old.clone();
                Ok(())
            }
            Action::AddPattern { index, before, .. } => {
                if *index >= song.pattern_count() || !arrangement_fits(before, song.pattern_count() - 1) {
                    return Err(EditError::HistoryMismatch);
                }
                song.patterns.remove(*index);
                song.arrangement = before.clone();
                Ok(())
            }
            Action::DeletePattern { index, pattern, before, .. } => {
                if *index > song.pattern_count() || !arrangement_fits(before, song.pattern_count() + 1) {
                    return Err(EditError::HistoryMismatch);
                }
                song.patterns.insert(*index, pattern.clone());
                song.arrangement = before.clone();
                Ok(())
            }
            Action::RenamePattern { index, old, .. } => {
                pattern_mut(song, *index)?.name = old.clone();
                Ok(())
            }
            Action::SetArrangement { old, .. } => {
                if !arrangement_fits(old, song.pattern_count()) {
                    return Err(EditError::HistoryMismatch);
                }
                song.arrangement = old.clone();
                Ok(())
            }
        }
    }
}
