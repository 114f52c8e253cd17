// Engine-wide constants and the handful of small types everything agrees on.

use serde::{Deserialize, Serialize};

// 48 ticks per quarter note; 12 ticks is a sixteenth
pub const TICKS_PER_BEAT: u32 = 48;
pub const DEFAULT_PATTERN_LENGTH: u32 = 4 * TICKS_PER_BEAT; // one bar of 4/4

pub const MIN_BPM: f32 = 40.0;
pub const MAX_BPM: f32 = 300.0;
pub const DEFAULT_BPM: f32 = 120.0;

pub const MAX_FX: usize = 4; // fx send slots per instrument
pub const MAX_VOICES: usize = 64; // hard cap so we wont malloc in audio callback
pub const MAX_BUFFER_FRAMES: usize = 8192; // bigger host buffers get chunked

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SongMode {
    #[default]
    Pattern, // loop the selected (or stacked) patterns
    Song,    // walk the arrangement column by column
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Playing,
}

pub fn clamp_bpm(bpm: f32) -> f32 {
    if bpm.is_nan() {
        return DEFAULT_BPM;
    }
    bpm.clamp(MIN_BPM, MAX_BPM)
}

// how far the sequencer moves per output frame
pub fn ticks_per_frame(bpm: f32, sample_rate: u32) -> f64 {
    bpm as f64 * TICKS_PER_BEAT as f64 / (sample_rate as f64 * 60.0)
}

pub fn frames_per_tick(bpm: f32, sample_rate: u32) -> f64 {
    1.0 / ticks_per_frame(bpm, sample_rate)
}

// Keyboard layout (the terminal front-end; see tui/input.rs):
//
// Instrument pads, two piano-style rows, rows 0-23 of the kit:
//   z s x d c v g b h n j m     //  Pad(0) ... Pad(11)
//   q 2 w 3 e r 5 t 6 y 7 u     //  Pad(12) ... Pad(23)
//
// Transport:
//   Space          //  PlayPress
//   Backspace      //  Restart
//   F12            //  Panic
//   + / -          //  BpmUp / BpmDown
//   \              //  TapTempo
//
// Editing the selected pattern:
//   Left / Right   //  CursorLeft / CursorRight (grid step)
//   Up / Down      //  InstrumentUp / InstrumentDown
//   Enter          //  ToggleStep
//   0              //  ToggleMute
//   PgUp / PgDn    //  PatternPrev / PatternNext
//   Ctrl-n         //  NewPattern
//   Ctrl-d         //  DeletePattern
//
// Modes and arrangement:
//   F4             //  ToggleMetronome
//   F5             //  ToggleSongMode
//   F6             //  ToggleLoop
//   F7             //  TogglePlaysSelected
//   F8             //  ToggleStacked (selected pattern)
//   F9             //  ToggleArrangement (selected pattern in the current column)
//   F10            //  ToggleRecord
//   F11            //  ToggleQuantize
//   [ / ]          //  ColumnPrev / ColumnNext
//
// Session:
//   Ctrl-z / Ctrl-y  //  Undo / Redo
//   Ctrl-s           //  Save
//   Ctrl-e           //  Export
//   Esc / Ctrl-c     //  Quit

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    Pad(usize),
    PlayPress,
    Restart,
    Panic,
    BpmUp,
    BpmDown,
    TapTempo,

    CursorLeft,
    CursorRight,
    InstrumentUp,
    InstrumentDown,
    ToggleStep,
    ToggleMute,
    PatternPrev,
    PatternNext,
    NewPattern,
    DeletePattern,

    ToggleMetronome,
    ToggleSongMode,
    ToggleLoop,
    TogglePlaysSelected,
    ToggleStacked,
    ToggleArrangement,
    ToggleRecord,
    ToggleQuantize,
    ColumnPrev,
    ColumnNext,

    Undo,
    Redo,
    Save,
    Export,
    Quit,
}

/// One instrument row of the pattern grid.
#[derive(Clone, Debug, PartialEq)]
pub struct GridRow {
    pub name: String,
    pub muted: bool,
    pub steps: Vec<Option<f32>>, // loudest note inside each grid step
}

/// Everything the front-end draws, built fresh each frame by the middle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayState {
    pub song_name: String,
    pub modified: bool,
    pub playing: bool,
    pub bpm: f32,
    pub mode: SongMode,
    pub loop_enabled: bool,
    pub plays_selected: bool,
    pub stacked: Vec<usize>,
    pub metronome: bool,
    pub record: bool,
    pub quantize: bool,

    pub pattern_pos: usize,
    pub arrangement: Vec<Vec<usize>>,
    pub selected_pattern: usize,
    pub pattern_names: Vec<String>,
    pub pattern_length: u32,
    pub grid_ticks: u32, // ticks per grid step
    pub playhead: Option<usize>, // grid step sounding in the selected pattern
    pub cursor: usize,
    pub rows: Vec<GridRow>,
    pub selected_instrument: Option<usize>,

    pub undo_label: Option<&'static str>,
    pub redo_label: Option<&'static str>,
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bpm_is_clamped_to_control_range() {
        assert_eq!(clamp_bpm(10.0), MIN_BPM);
        assert_eq!(clamp_bpm(1000.0), MAX_BPM);
        assert_eq!(clamp_bpm(133.5), 133.5);
        assert_eq!(clamp_bpm(f32::NAN), DEFAULT_BPM);
    }

    #[test]
    fn one_beat_of_frames_is_one_beat_of_ticks() {
        // 120 bpm at 48k: half a second per beat
        let frames = 24_000.0;
        let ticks = frames * ticks_per_frame(120.0, 48_000);
        assert!((ticks - TICKS_PER_BEAT as f64).abs() < 1e-9);
    }
}
