use std::time::{Duration, Instant};

use crate::audio::DriverError;
use crate::events::{EventListener, HistoryStep};
use crate::shared::PlaybackState;
use crate::song::InstrumentId;

const FLASH: Duration = Duration::from_millis(120);

// state local to the tui, fed by engine events between frames;
// everything about the song itself comes from DisplayState
#[derive(Clone, Debug, Default)]
pub struct TuiState {
    pub message: Option<String>, // latest notice, shown under the grid
    pub xruns: u64,
    pub export_progress: Option<u8>,
    pub driver_error: Option<DriverError>,
    // when the last beat / note landed, for the blinking lights
    pub beat_at: Option<(Instant, bool)>,
    pub note_at: Option<Instant>,
    pub last_note: Option<InstrumentId>,
}

impl TuiState {
    pub fn beat_lit(&self, now: Instant) -> Option<bool> {
        self.beat_at
            .filter(|(at, _)| now.duration_since(*at) < FLASH)
            .map(|(_, accent)| accent)
    }

    pub fn note_lit(&self, now: Instant) -> bool {
        self.note_at.is_some_and(|at| now.duration_since(at) < FLASH)
    }
}

impl EventListener for TuiState {
    fn on_state_changed(&mut self, state: PlaybackState) {
        if state == PlaybackState::Stopped {
            self.beat_at = None;
        }
    }

    fn on_note_on(&mut self, instrument: InstrumentId, _velocity: f32) {
        self.note_at = Some(Instant::now());
        self.last_note = Some(instrument);
    }

    fn on_error(&mut self, error: DriverError) {
        self.driver_error = Some(error);
        self.message = Some(format!("audio: {error} (code {})", error.code()));
    }

    fn on_xrun(&mut self) {
        self.xruns += 1;
    }

    fn on_metronome(&mut self, accent: bool) {
        self.beat_at = Some((Instant::now(), accent));
    }

    fn on_progress(&mut self, percent: u8) {
        self.export_progress = (percent < 100).then_some(percent);
        if percent == 100 {
            self.message = Some(String::from("export finished"));
        }
    }

    fn on_undo_redo(&mut self, step: HistoryStep) {
        self.message = Some(format!("{step:?}").to_lowercase());
    }
}
