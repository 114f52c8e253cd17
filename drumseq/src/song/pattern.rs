use serde::{Deserialize, Serialize};

use super::instrument::InstrumentId;
use super::note::Note;
use crate::shared::DEFAULT_PATTERN_LENGTH;

/// A named bar (or several) of notes. Notes stay sorted by position so the
/// audio thread can slice out a tick range without searching the whole list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    pub name: String,
    pub category: String,
    length: u32,
    notes: Vec<Note>,
}

impl Default for Pattern {
    fn default() -> Self {
        Self::new("Pattern", DEFAULT_PATTERN_LENGTH)
    }
}

impl Pattern {
    pub fn new(name: impl Into<String>, length: u32) -> Self {
        Self {
            name: name.into(),
            category: String::from("not_categorized"),
            length: length.max(1),
            notes: Vec::new(),
        }
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    // notes past the new end are kept but never reached
    pub fn set_length(&mut self, length: u32) {
        self.length = length.max(1);
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    fn search(&self, position: u32, instrument: InstrumentId) -> Result<usize, usize> {
        self.notes
            .binary_search_by(|n| n.sort_key().cmp(&(position, instrument)))
    }

    pub fn note_at(&self, position: u32, instrument: InstrumentId) -> Option<&Note> {
        self.search(position, instrument).ok().map(|i| &self.notes[i])
    }

    /// Adds a note; gives it back if that instrument already has one there.
    pub fn insert_note(&mut self, note: Note) -> Result<(), Note> {
        match self.search(note.position, note.instrument) {
            Ok(_) => Err(note),
            Err(i) => {
                self.notes.insert(i, note);
                Ok(())
            }
        }
    }

    pub fn remove_note(&mut self, position: u32, instrument: InstrumentId) -> Option<Note> {
        let i = self.search(position, instrument).ok()?;
        Some(self.notes.remove(i))
    }

    /// Swaps in `note` for the one at the same slot, returning the old one.
    pub fn replace_note(&mut self, note: Note) -> Option<Note> {
        let i = self.search(note.position, note.instrument).ok()?;
        Some(std::mem::replace(&mut self.notes[i], note))
    }

    /// Notes whose position lies in `[start, end)`.
    pub fn notes_in(&self, start: u32, end: u32) -> &[Note] {
        let lo = self.notes.partition_point(|n| n.position < start);
        let hi = self.notes.partition_point(|n| n.position < end);
        if lo >= hi {
            return &[];
        }
        &self.notes[lo..hi]
    }

    pub fn references(&self, instrument: InstrumentId) -> bool {
        self.notes.iter().any(|n| n.instrument == instrument)
    }

    /// Pulls out every note that plays `instrument`.
    pub fn detach_instrument(&mut self, instrument: InstrumentId) -> Vec<Note> {
        let mut detached = Vec::new();
        self.notes.retain(|n| {
            if n.instrument == instrument {
                detached.push(*n);
                false
            } else {
                true
            }
        });
        detached
    }

    /// Fixes what the derived `Deserialize` lets through: a zero length,
    /// notes out of order or doubled up, note fields out of range.
    /// Returns how many things were changed.
    pub(crate) fn repair(&mut self) -> usize {
        let mut fixed = 0;
        if self.length == 0 {
            self.length = 1;
            fixed += 1;
        }
        for note in &mut self.notes {
            let clamped = note.clamped();
            if clamped != *note {
                *note = clamped;
                fixed += 1;
            }
        }
        if !self.notes.is_sorted_by_key(Note::sort_key) {
            self.notes.sort_by_key(Note::sort_key);
            fixed += 1;
        }
        let before = self.notes.len();
        self.notes.dedup_by_key(|n| n.sort_key());
        fixed + before - self.notes.len()
    }

    pub(crate) fn retain_notes(&mut self, keep: impl FnMut(&Note) -> bool) -> usize {
        let before = self.notes.len();
        self.notes.retain(keep);
        before - self.notes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::{Instrument, InstrumentList};

    fn two_ids() -> (InstrumentId, InstrumentId) {
        let mut list = InstrumentList::new();
        (list.push(Instrument::new("Kick")), list.push(Instrument::new("Hat")))
    }

    #[test]
    fn one_note_per_instrument_and_position() {
        let (kick, hat) = two_ids();
        let mut p = Pattern::default();
        assert!(p.insert_note(Note::new(kick, 0, 1.0)).is_ok());
        assert!(p.insert_note(Note::new(hat, 0, 1.0)).is_ok());
        assert!(p.insert_note(Note::new(kick, 0, 0.5)).is_err());
        assert_eq!(p.notes().len(), 2);
    }

    #[test]
    fn tick_range_is_half_open() {
        let (kick, hat) = two_ids();
        let mut p = Pattern::default();
        for pos in [0, 12, 24, 36] {
            p.insert_note(Note::new(kick, pos, 1.0)).unwrap();
        }
        p.insert_note(Note::new(hat, 12, 1.0)).unwrap();
        let hits = p.notes_in(12, 36);
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|n| (12..36).contains(&n.position)));
        assert!(p.notes_in(37, 48).is_empty());
        assert!(p.notes_in(40, 20).is_empty());
    }

    #[test]
    fn detach_leaves_other_instruments() {
        let (kick, hat) = two_ids();
        let mut p = Pattern::default();
        p.insert_note(Note::new(kick, 0, 1.0)).unwrap();
        p.insert_note(Note::new(hat, 6, 1.0)).unwrap();
        p.insert_note(Note::new(kick, 24, 1.0)).unwrap();
        let gone = p.detach_instrument(kick);
        assert_eq!(gone.len(), 2);
        assert!(!p.references(kick));
        assert!(p.references(hat));
    }

    #[test]
    fn repair_fixes_a_hand_edited_pattern() {
        let (kick, hat) = two_ids();
        let mut loud = Note::new(kick, 24, 1.0);
        loud.velocity = 5.0;
        let mut p = Pattern {
            name: String::from("Broken"),
            category: String::new(),
            length: 0,
            notes: vec![loud, Note::new(hat, 0, 1.0), Note::new(hat, 0, 0.5)],
        };
        assert_eq!(p.repair(), 4);
        assert_eq!(p.length(), 1);
        assert_eq!(p.notes().len(), 2);
        assert_eq!(p.notes()[0].instrument, hat);
        assert_eq!(p.note_at(24, kick).unwrap().velocity, 1.0);
        assert_eq!(p.repair(), 0);
    }

    #[test]
    fn replace_returns_previous_note() {
        let (kick, _) = two_ids();
        let mut p = Pattern::default();
        p.insert_note(Note::new(kick, 12, 0.5)).unwrap();
        let old = p.replace_note(Note::new(kick, 12, 0.9)).unwrap();
        assert_eq!(old.velocity, 0.5);
        assert_eq!(p.note_at(12, kick).unwrap().velocity, 0.9);
        assert!(p.replace_note(Note::new(kick, 13, 0.9)).is_none());
    }
}
