use serde::{Deserialize, Serialize};

use super::instrument::InstrumentId;

pub const MIN_OCTAVE: i8 = -3;
pub const MAX_OCTAVE: i8 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub instrument: InstrumentId,
    pub position: u32,       // tick within the pattern
    pub length: Option<u32>, // ticks; None lets the sample ring out
    pub velocity: f32,       // 0.0 to 1.0
    pub pan_l: f32,          // 0.5 = centre
    pub pan_r: f32,
    pub key: u8,    // 0..=11
    pub octave: i8, // MIN_OCTAVE..=MAX_OCTAVE
    pub midi: bool, // recorded from live input
    pub instrument_mode: bool, // key/octave transpose the sample
}

impl Note {
    pub fn new(instrument: InstrumentId, position: u32, velocity: f32) -> Self {
        Self {
            instrument,
            position,
            length: None,
            velocity: velocity.clamp(0.0, 1.0),
            pan_l: 0.5,
            pan_r: 0.5,
            key: 0,
            octave: 0,
            midi: false,
            instrument_mode: false,
        }
    }

    pub fn with_length(mut self, ticks: u32) -> Self {
        self.length = Some(ticks.max(1));
        self
    }

    pub fn with_pan(mut self, pan_l: f32, pan_r: f32) -> Self {
        self.pan_l = pan_l;
        self.pan_r = pan_r;
        self.clamped()
    }

    pub fn with_key(mut self, key: u8, octave: i8) -> Self {
        self.key = key;
        self.octave = octave;
        self.instrument_mode = true;
        self.clamped()
    }

    /// Pulls every field back into its legal range.
    pub fn clamped(mut self) -> Self {
        self.velocity = self.velocity.clamp(0.0, 1.0);
        self.pan_l = self.pan_l.clamp(0.0, 1.0);
        self.pan_r = self.pan_r.clamp(0.0, 1.0);
        self.key = self.key.min(11);
        self.octave = self.octave.clamp(MIN_OCTAVE, MAX_OCTAVE);
        self.length = self.length.map(|l| l.max(1));
        self
    }

    pub fn pitch_ratio(&self) -> f32 {
        if !self.instrument_mode {
            return 1.0;
        }
        let semis = self.octave as f32 * 12.0 + self.key as f32;
        2.0_f32.powf(semis / 12.0)
    }

    // notes in a pattern are kept sorted by this
    pub(crate) fn sort_key(&self) -> (u32, InstrumentId) {
        (self.position, self.instrument)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::InstrumentList;
    use crate::song::Instrument;

    #[test]
    fn transposition_only_in_instrument_mode() {
        let mut list = InstrumentList::new();
        let id = list.push(Instrument::new("Tom"));
        let plain = Note::new(id, 0, 0.8);
        assert_eq!(plain.pitch_ratio(), 1.0);

        let up = plain.with_key(0, 1);
        assert!((up.pitch_ratio() - 2.0).abs() < 1e-6);
        let fifth = plain.with_key(7, 0);
        assert!((fifth.pitch_ratio() - 1.4983).abs() < 1e-3);
    }

    #[test]
    fn clamped_pulls_values_into_range() {
        let mut list = InstrumentList::new();
        let id = list.push(Instrument::new("Tom"));
        let mut note = Note::new(id, 0, 0.8);
        note.velocity = 3.0;
        note.octave = 9;
        note.pan_l = -1.0;
        let note = note.clamped();
        assert_eq!(note.velocity, 1.0);
        assert_eq!(note.octave, MAX_OCTAVE);
        assert_eq!(note.pan_l, 0.0);
    }
}
