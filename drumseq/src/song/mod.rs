// The song model: what plays, in what order, at what tempo.

mod instrument;
mod note;
mod pattern;
pub mod persistence;
mod song_state;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use instrument::{Instrument, InstrumentId, InstrumentList, Layer};
pub use note::{MAX_OCTAVE, MIN_OCTAVE, Note};
pub use pattern::Pattern;
pub use song_state::{EngineState, SharedState};

use crate::shared::{DEFAULT_BPM, DEFAULT_PATTERN_LENGTH, SongMode, clamp_bpm};

/// One column of the arrangement: the patterns that play together.
pub type PatternGroup = Vec<usize>;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Song {
    pub name: String,
    pub author: String,
    pub notes: String,
    bpm: f32,
    pub volume: f32,
    pub metronome_volume: f32,
    pub instruments: InstrumentList,
    pub patterns: Vec<Pattern>,
    pub arrangement: Vec<PatternGroup>,
    pub mode: SongMode,
    pub loop_enabled: bool,

    // runtime only
    #[serde(skip)]
    modified: bool,
    #[serde(skip)]
    filename: Option<PathBuf>,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            name: String::from("Untitled Song"),
            author: String::new(),
            notes: String::new(),
            bpm: DEFAULT_BPM,
            volume: 0.8,
            metronome_volume: 0.5,
            instruments: InstrumentList::new(),
            patterns: vec![Pattern::new("Pattern 1", DEFAULT_PATTERN_LENGTH)],
            arrangement: vec![vec![0]],
            mode: SongMode::Pattern,
            loop_enabled: false,
            modified: false,
            filename: None,
        }
    }
}

// The modified flag and filename describe the editing session, not the song.
impl PartialEq for Song {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.author == other.author
            && self.notes == other.notes
            && self.bpm == other.bpm
            && self.volume == other.volume
            && self.metronome_volume == other.metronome_volume
            && self.instruments == other.instruments
            && self.patterns == other.patterns
            && self.arrangement == other.arrangement
            && self.mode == other.mode
            && self.loop_enabled == other.loop_enabled
    }
}

impl Song {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The default song, carrying `instruments` in the given order.
    pub fn with_instruments(name: impl Into<String>, instruments: impl IntoIterator<Item = Instrument>) -> Self {
        let mut song = Self::new(name);
        for inst in instruments {
            song.instruments.push(inst);
        }
        song
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        self.bpm = clamp_bpm(bpm);
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    pub fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    pub fn set_filename(&mut self, path: Option<PathBuf>) {
        self.filename = path;
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    pub fn column_count(&self) -> usize {
        self.arrangement.len()
    }

    pub fn instrument_id(&self, row: usize) -> Option<InstrumentId> {
        self.instruments.id_at(row)
    }

    /// True if no note in any pattern plays `id`.
    pub fn is_unreferenced(&self, id: InstrumentId) -> bool {
        !self.patterns.iter().any(|p| p.references(id))
    }

    /// Repairs what a hand-edited or older file can get wrong: out of range
    /// tempo, zero-length patterns, note fields out of range, arrangement
    /// cells naming missing patterns, notes naming missing instruments.
    /// Returns how many things were fixed.
    pub fn sanitize(&mut self) -> usize {
        let mut fixed = 0;
        let clamped = clamp_bpm(self.bpm);
        if clamped != self.bpm {
            self.bpm = clamped;
            fixed += 1;
        }
        let count = self.patterns.len();
        for group in &mut self.arrangement {
            let before = group.len();
            group.retain(|&p| p < count);
            group.sort_unstable();
            group.dedup();
            fixed += before - group.len();
        }
        let instruments = &self.instruments;
        for pattern in &mut self.patterns {
            fixed += pattern.repair();
            fixed += pattern.retain_notes(|n| instruments.contains(n.instrument));
        }
        fixed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_song_has_one_pattern_in_one_column() {
        let song = Song::default();
        assert_eq!(song.pattern_count(), 1);
        assert_eq!(song.arrangement, vec![vec![0]]);
        assert_eq!(song.bpm(), DEFAULT_BPM);
        assert!(!song.is_modified());
    }

    #[test]
    fn equality_ignores_session_state() {
        let a = Song::new("A");
        let mut b = a.clone();
        b.set_modified(true);
        b.set_filename(Some(PathBuf::from("/tmp/a.dsong")));
        assert_eq!(a, b);
        b.set_bpm(90.0);
        assert_ne!(a, b);
    }

    #[test]
    fn sanitize_drops_dangling_references() {
        let mut song = Song::with_instruments("S", [Instrument::new("Kick")]);
        let kick = song.instrument_id(0).unwrap();
        song.patterns[0].insert_note(Note::new(kick, 0, 1.0)).unwrap();
        let (gone, _) = song.instruments.remove(0).unwrap();
        assert_eq!(gone, kick);
        song.arrangement.push(vec![0, 4, 0]);
        song.bpm = 999.0;

        assert_eq!(song.sanitize(), 4);
        assert!(song.patterns[0].is_empty());
        assert_eq!(song.arrangement[1], vec![0]);
        assert_eq!(song.bpm(), crate::shared::MAX_BPM);
    }
}
