//! The control context. Owns everything on the non real-time side of the
//! engine lock: edit history, tap tempo, the selection, and the sending
//! ends of the command and event channels. Front-ends talk to this and
//! nothing else.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::{Sender, TrySendError};

use crate::audio::{DriverError, Engine, EngineStats, FailureReporter, Hit};
use crate::audio_api::{AudioCommand, TriggerParams};
use crate::config::EngineConfig;
use crate::edit::{Changes, EditCommand, EditError, UndoHistory};
use crate::events::{self, Event, EventReceiver, EventSender, HistoryStep};
use crate::export;
use crate::shared::{DEFAULT_PATTERN_LENGTH, DisplayState, GridRow, InputEvent, PlaybackState, SongMode};
use crate::song::persistence::{self, PersistenceError};
use crate::song::{EngineState, Note, Pattern, SharedState, Song};
use crate::transport::TapTempo;

const BPM_STEP: f32 = 0.1;
const PAD_VELOCITY: f32 = 0.8;

pub struct Middle {
    shared: SharedState,
    events: EventSender,
    audio_tx: Sender<AudioCommand>,
    history: UndoHistory,
    tap: TapTempo,
    selected_instrument: Option<usize>,
    config: EngineConfig,
    stats: Arc<EngineStats>,
    cursor: usize, // grid step in the selected pattern
    status: String,
}

impl Middle {
    /// A context for an empty default song. Hand the engine to
    /// `audio::start_audio` and poll the receiver from the front-end.
    pub fn new(config: EngineConfig) -> (Middle, Engine, EventReceiver) {
        Self::for_song(config, Song::default())
    }

    pub fn for_song(config: EngineConfig, song: Song) -> (Middle, Engine, EventReceiver) {
        let selected_instrument = (!song.instruments.is_empty()).then_some(0);
        let shared = EngineState::new_shared(song);
        let (audio_tx, audio_rx) = crossbeam_channel::bounded(config.command_capacity.max(1));
        let (events, receiver) = events::channel(config.event_capacity);
        let engine = Engine::new(shared.clone(), audio_rx, events.clone(), &config);
        let middle = Middle {
            shared,
            events,
            audio_tx,
            history: UndoHistory::with_limit(config.history_limit),
            tap: TapTempo::new(config.tap_window, config.tap_timeout()),
            selected_instrument,
            stats: engine.stats(),
            config,
            cursor: 0,
            status: String::new(),
        };
        (middle, engine, receiver)
    }

    fn send(&self, cmd: AudioCommand) {
        match self.audio_tx.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(cmd)) => log::warn!("audio command queue full, dropped {cmd:?}"),
            Err(TrySendError::Disconnected(_)) => log::debug!("audio engine gone, command ignored"),
        }
    }

    // ── transport ──────────────────────────────────────────────────

    pub fn state(&self) -> PlaybackState {
        self.shared.lock().transport.state()
    }

    /// False if it was already playing.
    pub fn play(&mut self) -> bool {
        {
            let mut state = self.shared.lock();
            if state.transport.is_playing() {
                return false;
            }
            state.transport.set_state(PlaybackState::Playing);
        }
        log::debug!("play");
        self.events.push(Event::State(PlaybackState::Playing));
        true
    }

    /// False if it was already stopped. Voices are cut at the next buffer.
    pub fn stop(&mut self) -> bool {
        {
            let mut state = self.shared.lock();
            if !state.transport.is_playing() {
                return false;
            }
            state.transport.set_state(PlaybackState::Stopped);
        }
        self.send(AudioCommand::AllNotesOff);
        log::debug!("stop");
        self.events.push(Event::State(PlaybackState::Stopped));
        true
    }

    pub fn toggle_play(&mut self) {
        if !self.play() {
            self.stop();
        }
    }

    /// Clamped into the legal range; returns the tempo actually set.
    pub fn set_bpm(&mut self, bpm: f32) -> f32 {
        let bpm = {
            let mut state = self.shared.lock();
            state.song.set_bpm(bpm);
            state.song.set_modified(true);
            state.song.bpm()
        };
        self.events.push(Event::TempoChanged(bpm));
        self.events.push(Event::SongModified);
        bpm
    }

    pub fn bpm(&self) -> f32 {
        self.shared.lock().song.bpm()
    }

    pub fn bpm_step(&mut self, up: bool) -> f32 {
        let delta = if up { BPM_STEP } else { -BPM_STEP };
        let bpm = self.bpm();
        self.set_bpm(bpm + delta)
    }

    /// Jumps to arrangement column `pos`, clamped to the columns that exist.
    pub fn set_pattern_pos(&mut self, pos: i64) -> usize {
        let (old, new) = {
            let mut state = self.shared.lock();
            let EngineState { song, transport } = &mut *state;
            let old = transport.pattern_pos();
            (old, transport.set_pattern_pos(pos, song.column_count()))
        };
        if old != new {
            self.events.push(Event::PatternChanged { pattern_pos: new });
        }
        new
    }

    pub fn pattern_pos(&self) -> usize {
        self.shared.lock().transport.pattern_pos()
    }

    pub fn restart(&mut self) -> usize {
        self.set_pattern_pos(0)
    }

    pub fn set_selected_pattern_number(&mut self, index: usize) -> Result<(), EditError> {
        {
            let mut state = self.shared.lock();
            if index >= state.song.pattern_count() {
                return Err(EditError::InvalidPattern(index));
            }
            state.transport.set_selected_pattern(index);
        }
        self.events.push(Event::SelectedPatternChanged(index));
        Ok(())
    }

    pub fn selected_pattern_number(&self) -> usize {
        self.shared.lock().transport.selected_pattern()
    }

    pub fn select_instrument(&mut self, row: Option<usize>) -> Result<(), EditError> {
        if let Some(row) = row {
            if row >= self.shared.lock().song.instruments.len() {
                return Err(EditError::InvalidInstrumentRow(row));
            }
        }
        if self.selected_instrument != row {
            self.selected_instrument = row;
            self.events.push(Event::SelectedInstrumentChanged(row));
        }
        Ok(())
    }

    pub fn selected_instrument(&self) -> Option<usize> {
        self.selected_instrument
    }

    /// Registers a tap now; see [`Middle::tap_tempo_at`].
    pub fn tap_tempo(&mut self) -> Option<f32> {
        self.tap_tempo_at(Instant::now())
    }

    /// Sets the tempo from the taps so far, once there are at least two.
    pub fn tap_tempo_at(&mut self, now: Instant) -> Option<f32> {
        let bpm = self.tap.tap(now)?;
        Some(self.set_bpm(bpm))
    }

    /// Stops the transport and cuts every voice, sequenced or live.
    pub fn panic(&mut self) {
        self.stop();
        self.send(AudioCommand::AllNotesOff);
        log::info!("panic: all notes off");
    }

    pub fn set_metronome(&mut self, on: bool) {
        self.config.metronome = on;
        self.send(AudioCommand::SetMetronome(on));
    }

    /// Switching mode restarts from the first column.
    pub fn set_song_mode(&mut self, mode: SongMode) {
        let moved = {
            let mut state = self.shared.lock();
            if state.song.mode == mode {
                return;
            }
            let EngineState { song, transport } = &mut *state;
            song.mode = mode;
            song.set_modified(true);
            let old = transport.pattern_pos();
            transport.set_pattern_pos(0, song.column_count());
            old != 0
        };
        log::debug!("song mode {mode:?}");
        if moved {
            self.events.push(Event::PatternChanged { pattern_pos: 0 });
        }
        self.events.push(Event::SongModified);
    }

    pub fn set_loop(&mut self, enabled: bool) {
        {
            let mut state = self.shared.lock();
            state.song.loop_enabled = enabled;
            state.song.set_modified(true);
        }
        self.events.push(Event::SongModified);
    }

    /// Flips between playing the selected pattern and the stacked set.
    /// Returns true when single pattern mode is now on.
    pub fn toggle_plays_selected(&mut self) -> bool {
        let mut state = self.shared.lock();
        let single = !state.transport.plays_selected();
        state.transport.set_plays_selected(single);
        single
    }

    pub fn toggle_stacked_pattern(&mut self, index: usize) -> Result<bool, EditError> {
        let mut state = self.shared.lock();
        if index >= state.song.pattern_count() {
            return Err(EditError::InvalidPattern(index));
        }
        Ok(state.transport.toggle_stacked(index))
    }

    // ── live input ─────────────────────────────────────────────────

    pub fn set_record_mode(&mut self, on: bool) {
        self.config.record = on;
    }

    pub fn set_quantize(&mut self, on: bool) {
        self.config.quantize = on;
    }

    /// Plays the instrument at `row` and, when recording while the
    /// transport runs, writes the hit into the pattern under the playhead.
    /// `pitch` is in semitones. Returns the tick the note was recorded at.
    pub fn add_realtime_note(
        &mut self,
        row: usize,
        velocity: f32,
        pan_l: f32,
        pan_r: f32,
        pitch: f32,
    ) -> Result<Option<u32>, EditError> {
        let grid = self.config.quantize_grid();
        let record = self.config.record;
        let quantize = self.config.quantize;

        let mut state = self.shared.lock();
        let EngineState { song, transport } = &mut *state;
        let id = song.instrument_id(row).ok_or(EditError::InvalidInstrumentRow(row))?;

        let mut note = Note::new(id, 0, velocity).with_pan(pan_l, pan_r);
        if pitch != 0.0 {
            let semis = pitch.round() as i32;
            note = note.with_key(semis.rem_euclid(12) as u8, semis.div_euclid(12) as i8);
        }
        note.midi = true;

        let mut recorded = None;
        let mut ahead = false;
        let mut changes = None;
        if record && transport.is_playing() {
            let target = match song.mode {
                SongMode::Song => transport.active_patterns(song).first().copied(),
                SongMode::Pattern => None,
            }
            .unwrap_or(transport.selected_pattern());
            if let Some(pattern) = song.patterns.get(target) {
                let len = pattern.length();
                let tick = transport.tick();
                let raw = tick % len as f64;
                let (position, later) = if quantize {
                    let q = ((raw / grid as f64).round() * grid as f64) as u32;
                    if q >= len {
                        (0, true) // rounds onto the next pass
                    } else {
                        (q, tick < len as f64 && q as f64 > raw)
                    }
                } else {
                    (raw.floor() as u32, false)
                };
                note.position = position;
                ahead = later;

                let cmd = if pattern.note_at(position, id).is_some() {
                    EditCommand::ReplaceNote { pattern: target, note }
                } else {
                    EditCommand::AddNote { pattern: target, note }
                };
                let action = cmd.prepare(song)?;
                changes = Some(self.history.execute(action, song)?);
                song.set_modified(true);
                recorded = Some(position);
            }
        }
        drop(state);

        if !ahead {
            let hit = Hit {
                velocity: note.velocity,
                pan_l: note.pan_l,
                pan_r: note.pan_r,
                pitch: note.pitch_ratio(),
                length: None,
            };
            self.send(AudioCommand::Trigger(TriggerParams { instrument: id, hit }));
            self.events.push(Event::NoteOn { instrument: id, velocity: note.velocity });
        }
        if let Some(changes) = changes {
            log::debug!("recorded row {row} at tick {recorded:?}");
            self.announce(changes, false);
        }
        Ok(recorded)
    }

    // ── song ───────────────────────────────────────────────────────

    /// A snapshot of the song. Cheap enough for a save or an export, too
    /// heavy to call every frame.
    pub fn song(&self) -> Song {
        self.shared.lock().song.clone()
    }

    /// Runs `f` against the live song under the engine lock. Keep it short,
    /// the audio thread renders silence while this runs.
    pub fn with_song<R>(&self, f: impl FnOnce(&Song) -> R) -> R {
        f(&self.shared.lock().song)
    }

    /// Replaces the song, resetting the transport and forgetting history.
    pub fn set_song(&mut self, song: Song) {
        let (was_playing, bpm, has_instruments) = {
            let mut state = self.shared.lock();
            let was_playing = state.transport.is_playing();
            state.transport.reset();
            state.song = song;
            (was_playing, state.song.bpm(), !state.song.instruments.is_empty())
        };
        self.send(AudioCommand::AllNotesOff);
        self.history.clear();
        self.tap.reset();
        self.cursor = 0;
        self.selected_instrument = has_instruments.then_some(0);
        log::info!("song replaced");

        if was_playing {
            self.events.push(Event::State(PlaybackState::Stopped));
        }
        self.events.push(Event::PatternChanged { pattern_pos: 0 });
        self.events.push(Event::SelectedPatternChanged(0));
        self.events.push(Event::SelectedInstrumentChanged(self.selected_instrument));
        self.events.push(Event::TempoChanged(bpm));
        self.events.push(Event::SongModified);
    }

    /// The one way structural edits reach the song.
    pub fn execute(&mut self, cmd: EditCommand) -> Result<(), EditError> {
        let (changes, label, pattern_moved) = {
            let mut state = self.shared.lock();
            let EngineState { song, transport } = &mut *state;
            let action = cmd.prepare(song)?;
            let label = action.label();
            let changes = self.history.execute(action, song)?;
            song.set_modified(true);
            (changes, label, transport.revalidate(song))
        };
        log::debug!("edit: {label}");
        self.announce(changes, pattern_moved);
        Ok(())
    }

    /// `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool, EditError> {
        self.step_history(HistoryStep::Undo)
    }

    pub fn redo(&mut self) -> Result<bool, EditError> {
        self.step_history(HistoryStep::Redo)
    }

    fn step_history(&mut self, step: HistoryStep) -> Result<bool, EditError> {
        let (changes, pattern_moved) = {
            let mut state = self.shared.lock();
            let EngineState { song, transport } = &mut *state;
            let changes = match step {
                HistoryStep::Undo => self.history.undo(song)?,
                HistoryStep::Redo => self.history.redo(song)?,
            };
            let Some(changes) = changes else {
                return Ok(false);
            };
            song.set_modified(true);
            (changes, transport.revalidate(song))
        };
        log::debug!("{step:?}");
        self.events.push(Event::UndoRedo(step));
        self.announce(changes, pattern_moved);
        Ok(true)
    }

    /// Deletes every instrument, one undoable step each. Returns how many.
    pub fn clear_instruments(&mut self) -> Result<usize, EditError> {
        let count = self.with_song(|s| s.instruments.len());
        for _ in 0..count {
            self.execute(EditCommand::DeleteInstrument { row: 0 })?;
        }
        Ok(count)
    }

    /// Mute is a mixer setting, not an edit; it skips the history.
    pub fn set_instrument_muted(&mut self, row: usize, muted: bool) -> Result<(), EditError> {
        {
            let mut state = self.shared.lock();
            let inst = state
                .song
                .instruments
                .at_mut(row)
                .ok_or(EditError::InvalidInstrumentRow(row))?;
            inst.muted = muted;
            state.song.set_modified(true);
        }
        self.events.push(Event::SongModified);
        Ok(())
    }

    fn announce(&mut self, changes: Changes, pattern_moved: bool) {
        self.events.push(Event::SongModified);
        if changes.notes || changes.patterns {
            self.events.push(Event::PatternModified);
        }
        if pattern_moved {
            let index = self.selected_pattern_number();
            self.events.push(Event::SelectedPatternChanged(index));
        }
        if changes.instruments {
            let rows = self.with_song(|s| s.instruments.len());
            let fixed = match self.selected_instrument {
                _ if rows == 0 => None,
                Some(row) => Some(row.min(rows - 1)),
                None => None,
            };
            if fixed != self.selected_instrument {
                self.selected_instrument = fixed;
                self.events.push(Event::SelectedInstrumentChanged(fixed));
            }
        }
    }

    // ── files ──────────────────────────────────────────────────────

    /// On failure the current song is left alone.
    pub fn load_song(&mut self, path: &Path) -> Result<(), PersistenceError> {
        let song = persistence::load_song(path, self.config.sample_rate)?;
        self.set_song(song);
        Ok(())
    }

    /// Saves to the file the song came from.
    pub fn save_song(&mut self) -> Result<PathBuf, PersistenceError> {
        let path = self
            .with_song(|s| s.filename().map(Path::to_path_buf))
            .ok_or(PersistenceError::NoFilename)?;
        self.save_song_as(&path)?;
        Ok(path)
    }

    pub fn save_song_as(&mut self, path: &Path) -> Result<(), PersistenceError> {
        let song = self.song();
        persistence::save_song(&song, path)?;
        {
            let mut state = self.shared.lock();
            state.song.set_filename(Some(path.to_path_buf()));
            state.song.set_modified(false);
        }
        log::info!("saved song to {}", path.display());
        Ok(())
    }

    pub fn save_pattern(&self, path: &Path) -> Result<(), PersistenceError> {
        let index = self.selected_pattern_number();
        let (pattern, instruments) = self.with_song(|s| (s.patterns.get(index).cloned(), s.instruments.clone()));
        let pattern = pattern.unwrap_or_default();
        persistence::save_pattern(&pattern, &instruments, path)?;
        log::info!("saved pattern '{}' to {}", pattern.name, path.display());
        Ok(())
    }

    /// Appends the pattern in `path` as an undoable edit; returns its index.
    pub fn import_pattern(&mut self, path: &Path) -> anyhow::Result<usize> {
        let instruments = self.with_song(|s| s.instruments.clone());
        let pattern = persistence::load_pattern(path, &instruments)?;
        self.execute(EditCommand::AddPattern { index: None, pattern })?;
        let index = self.with_song(|s| s.pattern_count() - 1);
        log::info!("imported {} as pattern {index}", path.display());
        Ok(index)
    }

    /// Bounces the song to `path`; `Progress` events report how far it got.
    pub fn export_wav(&self, path: &Path) -> anyhow::Result<u64> {
        let song = self.song();
        export::export_wav(&song, path, &self.config, &self.events)
    }

    // ── plumbing ───────────────────────────────────────────────────

    pub fn report_driver_error(&self, error: DriverError) {
        self.failure_reporter().report(error);
    }

    pub fn failure_reporter(&self) -> FailureReporter {
        FailureReporter::new(self.shared.clone(), self.events.clone())
    }

    pub fn events(&self) -> &EventSender {
        &self.events
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    // ── front-end ──────────────────────────────────────────────────

    pub fn display_state(&self) -> DisplayState {
        let grid = self.config.quantize_grid();
        let state = self.shared.lock();
        let EngineState { song, transport } = &*state;
        let selected = transport.selected_pattern();
        let pattern = song.patterns.get(selected);
        let length = pattern.map(|p| p.length()).unwrap_or(DEFAULT_PATTERN_LENGTH);
        let steps = length.div_ceil(grid) as usize;

        let rows = song
            .instruments
            .iter()
            .map(|(id, inst)| {
                let mut cells = vec![None; steps];
                for note in pattern.map(|p| p.notes()).unwrap_or(&[]) {
                    if note.instrument != id {
                        continue;
                    }
                    let cell: &mut Option<f32> = &mut cells[(note.position / grid) as usize];
                    *cell = Some(cell.map_or(note.velocity, |v| v.max(note.velocity)));
                }
                GridRow { name: inst.name.clone(), muted: inst.muted, steps: cells }
            })
            .collect();

        let playhead = (transport.is_playing() && transport.active_patterns(song).contains(&selected))
            .then(|| ((transport.tick() as u32 % length) / grid) as usize);

        DisplayState {
            song_name: song.name.clone(),
            modified: song.is_modified(),
            playing: transport.is_playing(),
            bpm: song.bpm(),
            mode: song.mode,
            loop_enabled: song.loop_enabled,
            plays_selected: transport.plays_selected(),
            stacked: transport.stacked().to_vec(),
            metronome: self.config.metronome,
            record: self.config.record,
            quantize: self.config.quantize,
            pattern_pos: transport.pattern_pos(),
            arrangement: song.arrangement.clone(),
            selected_pattern: selected,
            pattern_names: song.patterns.iter().map(|p| p.name.clone()).collect(),
            pattern_length: length,
            grid_ticks: grid,
            playhead,
            cursor: self.cursor.min(steps.saturating_sub(1)),
            rows,
            selected_instrument: self.selected_instrument,
            undo_label: self.history.undo_label(),
            redo_label: self.history.redo_label(),
            status: self.status.clone(),
        }
    }

    /// Applies one key press from the front-end. Saving, exporting and
    /// quitting need the project directory and are left to the caller.
    pub fn handle_input(&mut self, input: InputEvent) {
        if let Err(e) = self.apply_input(input) {
            log::warn!("{input:?}: {e}");
            self.status = e.to_string();
        }
    }

    fn apply_input(&mut self, input: InputEvent) -> Result<(), EditError> {
        let grid = self.config.quantize_grid();
        match input {
            InputEvent::Pad(row) => {
                self.add_realtime_note(row, PAD_VELOCITY, 0.5, 0.5, 0.0)?;
                self.select_instrument(Some(row))?;
            }
            InputEvent::PlayPress => self.toggle_play(),
            InputEvent::Restart => {
                self.restart();
            }
            InputEvent::Panic => self.panic(),
            InputEvent::BpmUp => {
                self.bpm_step(true);
            }
            InputEvent::BpmDown => {
                self.bpm_step(false);
            }
            InputEvent::TapTempo => {
                if let Some(bpm) = self.tap_tempo() {
                    self.status = format!("tap tempo {bpm:.1}");
                }
            }

            InputEvent::CursorLeft => self.cursor = self.cursor.saturating_sub(1),
            InputEvent::CursorRight => {
                let index = self.selected_pattern_number();
                let length = self.with_song(|s| s.patterns.get(index).map(|p| p.length()));
                let length = length.unwrap_or(DEFAULT_PATTERN_LENGTH);
                let last = (length.div_ceil(grid) as usize).saturating_sub(1);
                self.cursor = (self.cursor + 1).min(last);
            }
            InputEvent::InstrumentUp => {
                let row = self.selected_instrument.map(|r| r.saturating_sub(1)).unwrap_or(0);
                self.select_instrument(Some(row))?;
            }
            InputEvent::InstrumentDown => {
                let row = self.selected_instrument.map(|r| r + 1).unwrap_or(0);
                self.select_instrument(Some(row))?;
            }
            InputEvent::ToggleStep => {
                let row = self.selected_instrument.ok_or(EditError::InvalidInstrumentRow(0))?;
                let pattern = self.selected_pattern_number();
                let position = self.cursor as u32 * grid;
                let (id, exists) = self.with_song(|s| {
                    let id = s.instrument_id(row);
                    let exists = id.and_then(|id| s.patterns.get(pattern)?.note_at(position, id)).is_some();
                    (id, exists)
                });
                let instrument = id.ok_or(EditError::InvalidInstrumentRow(row))?;
                if exists {
                    self.execute(EditCommand::RemoveNote { pattern, position, instrument })?;
                } else {
                    let note = Note::new(instrument, position, PAD_VELOCITY);
                    self.execute(EditCommand::AddNote { pattern, note })?;
                }
            }
            InputEvent::ToggleMute => {
                let row = self.selected_instrument.ok_or(EditError::InvalidInstrumentRow(0))?;
                let muted = self.with_song(|s| s.instruments.at(row).map(|i| i.muted));
                let muted = muted.ok_or(EditError::InvalidInstrumentRow(row))?;
                self.set_instrument_muted(row, !muted)?;
            }
            InputEvent::PatternPrev => {
                let index = self.selected_pattern_number().saturating_sub(1);
                self.set_selected_pattern_number(index)?;
            }
            InputEvent::PatternNext => {
                let index = self.selected_pattern_number() + 1;
                self.set_selected_pattern_number(index)?;
            }
            InputEvent::NewPattern => {
                let index = self.selected_pattern_number() + 1;
                let name = format!("Pattern {}", self.with_song(|s| s.pattern_count()) + 1);
                let pattern = Pattern::new(name, DEFAULT_PATTERN_LENGTH);
                self.execute(EditCommand::AddPattern { index: Some(index), pattern })?;
                self.set_selected_pattern_number(index)?;
            }
            InputEvent::DeletePattern => {
                let index = self.selected_pattern_number();
                self.execute(EditCommand::DeletePattern { index })?;
            }

            InputEvent::ToggleMetronome => self.set_metronome(!self.config.metronome),
            InputEvent::ToggleSongMode => {
                let mode = match self.with_song(|s| s.mode) {
                    SongMode::Pattern => SongMode::Song,
                    SongMode::Song => SongMode::Pattern,
                };
                self.set_song_mode(mode);
            }
            InputEvent::ToggleLoop => {
                let enabled = self.with_song(|s| s.loop_enabled);
                self.set_loop(!enabled);
            }
            InputEvent::TogglePlaysSelected => {
                self.toggle_plays_selected();
            }
            InputEvent::ToggleStacked => {
                let index = self.selected_pattern_number();
                self.toggle_stacked_pattern(index)?;
            }
            InputEvent::ToggleArrangement => {
                let column = self.pattern_pos();
                let pattern = self.selected_pattern_number();
                self.execute(EditCommand::ToggleArrangementCell { column, pattern })?;
            }
            InputEvent::ToggleRecord => self.set_record_mode(!self.config.record),
            InputEvent::ToggleQuantize => self.set_quantize(!self.config.quantize),
            InputEvent::ColumnPrev => {
                let pos = self.pattern_pos() as i64 - 1;
                self.set_pattern_pos(pos);
            }
            InputEvent::ColumnNext => {
                let pos = self.pattern_pos() as i64 + 1;
                self.set_pattern_pos(pos);
            }

            InputEvent::Undo => {
                if !self.undo()? {
                    self.status = String::from("nothing to undo");
                }
            }
            InputEvent::Redo => {
                if !self.redo()? {
                    self.status = String::from("nothing to redo");
                }
            }
            InputEvent::Save | InputEvent::Export | InputEvent::Quit => {}
        }
        Ok(())
    }
}
