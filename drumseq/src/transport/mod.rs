// Where playback is and whether it is moving.
//
// The transport only ever changes under the engine lock: the audio thread
// advances it once per buffer, the control thread repositions it between
// buffers.

mod tap_tempo;

pub use tap_tempo::TapTempo;

pub use crate::shared::PlaybackState;
use crate::shared::{DEFAULT_PATTERN_LENGTH, SongMode};
use crate::song::Song;

/// What happened when the current column ran out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnStep {
    Next,    // moved on to the following arrangement column
    Wrapped, // song looped back to column 0
    Looped,  // pattern mode, same patterns again
    Ended,   // song mode without loop, nothing left
}

#[derive(Clone, Debug)]
pub struct Transport {
    state: PlaybackState,
    frame: u64,          // frames rendered since the last play()
    tick: f64,           // position within the current column
    pattern_pos: usize,  // arrangement column (song mode)
    selected_pattern: usize,
    plays_selected: bool, // single pattern mode when true
    stacked: Vec<usize>,  // patterns looped together in stacked mode
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Stopped,
            frame: 0,
            tick: 0.0,
            pattern_pos: 0,
            selected_pattern: 0,
            plays_selected: true,
            stacked: Vec::new(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    pub fn set_state(&mut self, state: PlaybackState) {
        if state == PlaybackState::Playing && self.state != PlaybackState::Playing {
            self.frame = 0;
        }
        self.state = state;
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub(crate) fn add_frames(&mut self, frames: usize) {
        self.frame += frames as u64;
    }

    pub fn tick(&self) -> f64 {
        self.tick
    }

    pub(crate) fn set_tick(&mut self, tick: f64) {
        self.tick = tick.max(0.0);
    }

    pub fn pattern_pos(&self) -> usize {
        self.pattern_pos
    }

    /// Moves to arrangement column `pos`, clamped into
    /// `[0, column_count - 1]` (0 for an empty arrangement), and restarts
    /// the column. Returns the position actually taken.
    pub fn set_pattern_pos(&mut self, pos: i64, column_count: usize) -> usize {
        let last = column_count.saturating_sub(1) as i64;
        self.pattern_pos = pos.clamp(0, last) as usize;
        self.tick = 0.0;
        self.pattern_pos
    }

    pub fn selected_pattern(&self) -> usize {
        self.selected_pattern
    }

    pub fn set_selected_pattern(&mut self, index: usize) {
        self.selected_pattern = index;
    }

    pub fn plays_selected(&self) -> bool {
        self.plays_selected
    }

    pub fn set_plays_selected(&mut self, single: bool) {
        self.plays_selected = single;
    }

    pub fn stacked(&self) -> &[usize] {
        &self.stacked
    }

    /// Adds or removes `index` from the stacked set; true if it is now in.
    pub fn toggle_stacked(&mut self, index: usize) -> bool {
        match self.stacked.binary_search(&index) {
            Ok(i) => {
                self.stacked.remove(i);
                false
            }
            Err(i) => {
                self.stacked.insert(i, index);
                true
            }
        }
    }

    /// Pattern indices sounding right now. May name patterns that no longer
    /// exist; readers skip those.
    pub fn active_patterns<'a>(&'a self, song: &'a Song) -> &'a [usize] {
        match song.mode {
            SongMode::Song => song
                .arrangement
                .get(self.pattern_pos)
                .map(|g| g.as_slice())
                .unwrap_or(&[]),
            SongMode::Pattern if self.plays_selected => std::slice::from_ref(&self.selected_pattern),
            SongMode::Pattern => &self.stacked,
        }
    }

    /// Length of the current column: its longest pattern, or one default
    /// bar when nothing is playing.
    pub fn column_length(&self, song: &Song) -> u32 {
        self.active_patterns(song)
            .iter()
            .filter_map(|&i| song.patterns.get(i))
            .map(|p| p.length())
            .max()
            .unwrap_or(DEFAULT_PATTERN_LENGTH)
    }

    /// Called when the tick runs off the end of the column.
    pub(crate) fn advance_column(&mut self, song: &Song) -> ColumnStep {
        self.tick = 0.0;
        if song.mode == SongMode::Pattern {
            return ColumnStep::Looped;
        }
        if self.pattern_pos + 1 < song.column_count() {
            self.pattern_pos += 1;
            ColumnStep::Next
        } else if song.loop_enabled && song.column_count() > 0 {
            self.pattern_pos = 0;
            ColumnStep::Wrapped
        } else {
            self.pattern_pos = 0;
            ColumnStep::Ended
        }
    }

    /// Pulls every index back inside the song after a structural edit.
    /// Returns true if the selected pattern had to move.
    pub(crate) fn revalidate(&mut self, song: &Song) -> bool {
        let count = song.pattern_count();
        self.stacked.retain(|&p| p < count);
        if self.pattern_pos >= song.column_count() {
            self.set_pattern_pos(self.pattern_pos as i64, song.column_count());
        }
        let selected = self.selected_pattern.min(count.saturating_sub(1));
        let moved = selected != self.selected_pattern;
        self.selected_pattern = selected;
        moved
    }

    /// Back to the top with nothing sounding.
    pub(crate) fn reset(&mut self) {
        self.state = PlaybackState::Stopped;
        self.frame = 0;
        self.tick = 0.0;
        self.pattern_pos = 0;
        self.selected_pattern = 0;
        self.stacked.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::Pattern;

    fn song_with_columns(columns: usize) -> Song {
        let mut song = Song::new("cols");
        song.patterns = (0..columns).map(|i| Pattern::new(format!("P{i}"), 192)).collect();
        song.arrangement = (0..columns).map(|i| vec![i]).collect();
        song.mode = SongMode::Song;
        song
    }

    #[test]
    fn pattern_pos_clamps_both_ends() {
        let mut t = Transport::new();
        assert_eq!(t.set_pattern_pos(-1, 3), 0);
        assert_eq!(t.set_pattern_pos(3, 3), 2);
        assert_eq!(t.set_pattern_pos(1, 3), 1);
        assert_eq!(t.set_pattern_pos(5, 0), 0);
    }

    #[test]
    fn song_mode_walks_then_ends_or_wraps() {
        let mut song = song_with_columns(2);
        let mut t = Transport::new();
        assert_eq!(t.advance_column(&song), ColumnStep::Next);
        assert_eq!(t.pattern_pos(), 1);
        assert_eq!(t.advance_column(&song), ColumnStep::Ended);
        assert_eq!(t.pattern_pos(), 0);

        song.loop_enabled = true;
        t.advance_column(&song);
        assert_eq!(t.advance_column(&song), ColumnStep::Wrapped);
    }

    #[test]
    fn single_and_stacked_modes_pick_different_patterns() {
        let mut song = song_with_columns(3);
        song.mode = SongMode::Pattern;
        let mut t = Transport::new();
        t.set_selected_pattern(1);
        assert_eq!(t.active_patterns(&song), &[1]);

        t.set_plays_selected(false);
        assert!(t.toggle_stacked(2));
        assert!(t.toggle_stacked(0));
        assert_eq!(t.active_patterns(&song), &[0, 2]);
        assert!(!t.toggle_stacked(0));
        assert_eq!(t.active_patterns(&song), &[2]);
    }

    #[test]
    fn column_length_is_longest_pattern() {
        let mut song = song_with_columns(2);
        song.patterns[1].set_length(96);
        song.arrangement = vec![vec![0, 1]];
        let t = Transport::new();
        assert_eq!(t.column_length(&song), 192);
        song.arrangement.clear();
        assert_eq!(t.column_length(&song), DEFAULT_PATTERN_LENGTH);
    }

    #[test]
    fn revalidate_pulls_selection_back() {
        let mut song = song_with_columns(3);
        let mut t = Transport::new();
        t.set_selected_pattern(2);
        t.set_pattern_pos(2, 3);
        song.patterns.truncate(1);
        song.arrangement.truncate(1);
        assert!(t.revalidate(&song));
        assert_eq!(t.selected_pattern(), 0);
        assert_eq!(t.pattern_pos(), 0);
    }
}
