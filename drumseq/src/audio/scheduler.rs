// Turns transport time into voices. Runs on the audio thread with the engine
// lock held: no allocation, no logging, events go out through try_send.

use super::voice::{Voice, VoicePool, VoiceSource, pan_gain};
use crate::events::{Event, EventSender};
use crate::shared::{TICKS_PER_BEAT, frames_per_tick, ticks_per_frame};
use crate::song::{EngineState, InstrumentId, Song};
use crate::transport::{ColumnStep, PlaybackState};

/// What a single hit needs besides the instrument's own settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hit {
    pub velocity: f32,
    pub pan_l: f32,
    pub pan_r: f32,
    pub pitch: f32,
    pub length: Option<usize>, // frames
}

/// Builds the voice for `instrument` playing `hit`, or `None` if the
/// instrument is gone, muted or has no layers.
pub fn instrument_voice(song: &Song, instrument: InstrumentId, hit: Hit) -> Option<Voice> {
    let inst = song.instruments.get(instrument)?;
    if inst.muted {
        return None;
    }
    let (layer_index, layer) = inst.layer_for(hit.velocity)?;
    let gain = hit.velocity * inst.volume * layer.gain;
    let voice = Voice::new(
        VoiceSource::Layer { instrument, layer: layer_index },
        gain * pan_gain(hit.pan_l) * pan_gain(inst.pan_l),
        gain * pan_gain(hit.pan_r) * pan_gain(inst.pan_r),
        hit.pitch * layer.pitch,
    );
    Some(voice.lasting(hit.length))
}

pub struct Scheduler {
    sample_rate: u32,
    pub metronome: bool,
}

impl Scheduler {
    pub fn new(sample_rate: u32, metronome: bool) -> Self {
        Self { sample_rate, metronome }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Moves the transport `frames` forward, starting a voice for every note
    /// and metronome beat passed on the way. Offsets are relative to the
    /// block about to be rendered.
    pub fn advance(&mut self, state: &mut EngineState, frames: usize, voices: &mut VoicePool, events: &EventSender) {
        let EngineState { song, transport } = state;
        if !transport.is_playing() || frames == 0 {
            return;
        }
        let tpf = ticks_per_frame(song.bpm(), self.sample_rate);
        let fpt = frames_per_tick(song.bpm(), self.sample_rate);

        let mut done = 0usize;
        while done < frames {
            // a zero-length column would never let the loop finish
            let column_len = transport.column_length(song).max(1) as f64;
            let tick = transport.tick();
            let left = frames - done;

            let to_end = ((column_len - tick) / tpf).max(0.0);
            let crossing = to_end <= left as f64;
            let (end, used) = if crossing {
                (column_len, (to_end.ceil() as usize).min(left))
            } else {
                (tick + left as f64 * tpf, left)
            };

            // integer tick p lies in [tick, end) iff ceil(tick) <= p < ceil(end)
            let lo = tick.ceil() as u32;
            let hi = end.ceil() as u32;
            let offset_of = |p: u32| done + (((p as f64 - tick) / tpf).max(0.0) as usize).min(left - 1);

            for &index in transport.active_patterns(song) {
                let Some(pattern) = song.patterns.get(index) else { continue };
                for note in pattern.notes_in(lo, hi) {
                    if !song.instruments.contains(note.instrument) {
                        continue;
                    }
                    let hit = Hit {
                        velocity: note.velocity,
                        pan_l: note.pan_l,
                        pan_r: note.pan_r,
                        pitch: note.pitch_ratio(),
                        length: note.length.map(|l| (l as f64 * fpt).round() as usize),
                    };
                    if let Some(voice) = instrument_voice(song, note.instrument, hit) {
                        voices.trigger(voice.starting_at(offset_of(note.position)));
                    }
                    events.push(Event::NoteOn { instrument: note.instrument, velocity: note.velocity });
                }
            }

            let mut beat = lo.div_ceil(TICKS_PER_BEAT) * TICKS_PER_BEAT;
            while beat < hi {
                let accent = beat == 0;
                events.push(Event::Metronome { accent });
                if self.metronome {
                    let gain = song.metronome_volume;
                    let click = Voice::new(VoiceSource::Click { accent }, gain, gain, 1.0);
                    voices.trigger(click.starting_at(offset_of(beat)));
                }
                beat += TICKS_PER_BEAT;
            }

            done += used;
            if !crossing {
                transport.set_tick(end);
                break;
            }

            // the next column starts on a whole frame; the fraction is dropped
            match transport.advance_column(song) {
                ColumnStep::Ended => {
                    transport.set_state(PlaybackState::Stopped);
                    events.push(Event::PatternChanged { pattern_pos: transport.pattern_pos() });
                    events.push(Event::State(PlaybackState::Stopped));
                    break;
                }
                ColumnStep::Next | ColumnStep::Wrapped | ColumnStep::Looped => {
                    events.push(Event::PatternChanged { pattern_pos: transport.pattern_pos() });
                }
            }
        }
        transport.add_frames(done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{SampleBuffer, StereoFrame};
    use crate::events::{self, EventReceiver};
    use crate::shared::SongMode;
    use crate::song::{Instrument, Layer, Note, Pattern};

    fn kit() -> Song {
        let buf = SampleBuffer::from_frames(vec![StereoFrame::mono(0.5); 32]);
        Song::with_instruments(
            "sched",
            [
                Instrument::new("Kick").with_layer(Layer::with_buffer(buf.clone())),
                Instrument::new("Hat").with_layer(Layer::with_buffer(buf)),
            ],
        )
    }

    fn playing(song: Song) -> EngineState {
        let mut state = EngineState::new(song);
        state.transport.set_state(PlaybackState::Playing);
        state
    }

    fn drain(rx: &EventReceiver) -> Vec<Event> {
        std::iter::from_fn(|| rx.pop()).collect()
    }

    #[test]
    fn stopped_transport_does_not_move() {
        let mut state = EngineState::new(kit());
        let (tx, rx) = events::channel(64);
        let mut voices = VoicePool::new();
        Scheduler::new(48_000, false).advance(&mut state, 512, &mut voices, &tx);
        assert_eq!(state.transport.tick(), 0.0);
        assert_eq!(state.transport.frame(), 0);
        assert!(rx.is_empty());
    }

    #[test]
    fn tick_span_follows_bpm() {
        let mut state = playing(kit());
        let (tx, _rx) = events::channel(1024);
        let mut voices = VoicePool::new();
        Scheduler::new(44_100, false).advance(&mut state, 512, &mut voices, &tx);
        let expected = 512.0 / 44_100.0 * 120.0 / 60.0 * TICKS_PER_BEAT as f64;
        assert!((state.transport.tick() - expected).abs() < 1e-9);
        assert_eq!(state.transport.frame(), 512);
    }

    #[test]
    fn tick_span_follows_bpm_over_the_whole_range() {
        for sample_rate in [44_100u32, 48_000] {
            for bpm in (40..=300).step_by(20) {
                let mut song = kit();
                song.set_bpm(bpm as f32);
                let mut state = playing(song);
                let (tx, _rx) = events::channel(1024);
                let mut voices = VoicePool::new();
                Scheduler::new(sample_rate, false).advance(&mut state, 512, &mut voices, &tx);
                let expected = 512.0 * bpm as f64 * TICKS_PER_BEAT as f64 / (sample_rate as f64 * 60.0);
                let tick = state.transport.tick();
                assert!((tick - expected).abs() < 1e-6, "{bpm} bpm at {sample_rate} Hz: {tick} != {expected}");
            }
        }
    }

    #[test]
    fn notes_start_at_their_frame() {
        let mut song = kit();
        let kick = song.instrument_id(0).unwrap();
        // 120 bpm at 48k: one tick is 500 frames
        song.patterns[0].insert_note(Note::new(kick, 1, 1.0)).unwrap();
        let mut state = playing(song);
        let (tx, rx) = events::channel(64);
        let mut voices = VoicePool::new();
        Scheduler::new(48_000, false).advance(&mut state, 1024, &mut voices, &tx);

        assert_eq!(voices.active_count(), 1);
        let mut out = vec![StereoFrame::zero(); 1024];
        let v = voices.active_mut().next().unwrap();
        v.render_into(&SampleBuffer::from_frames(vec![StereoFrame::mono(1.0); 4]), &mut out);
        assert_eq!(out[498], StereoFrame::zero());
        assert!(out[501].left > 0.0);
        assert!(drain(&rx).contains(&Event::NoteOn { instrument: kick, velocity: 1.0 }));
    }

    #[test]
    fn muted_instrument_is_announced_but_silent() {
        let mut song = kit();
        let hat = song.instrument_id(1).unwrap();
        song.instruments.get_mut(hat).unwrap().muted = true;
        song.patterns[0].insert_note(Note::new(hat, 0, 0.7)).unwrap();
        let mut state = playing(song);
        let (tx, rx) = events::channel(64);
        let mut voices = VoicePool::new();
        Scheduler::new(48_000, false).advance(&mut state, 256, &mut voices, &tx);
        assert_eq!(voices.active_count(), 0);
        assert!(drain(&rx).iter().any(|e| matches!(e, Event::NoteOn { .. })));
    }

    #[test]
    fn beat_zero_is_accented() {
        let mut state = playing(kit());
        let (tx, rx) = events::channel(64);
        let mut voices = VoicePool::new();
        // 48 ticks at 120 bpm / 48k is 24000 frames; cover beats 0 and 1
        Scheduler::new(48_000, true).advance(&mut state, 24_001, &mut voices, &tx);
        let clicks: Vec<_> = drain(&rx)
            .into_iter()
            .filter_map(|e| match e {
                Event::Metronome { accent } => Some(accent),
                _ => None,
            })
            .collect();
        assert_eq!(clicks, vec![true, false]);
        assert_eq!(voices.active_count(), 2);
    }

    #[test]
    fn pattern_boundary_reports_once() {
        let mut song = kit();
        song.patterns.push(Pattern::new("Pattern 2", 192));
        song.arrangement = vec![vec![0], vec![1]];
        song.mode = SongMode::Song;
        let mut state = playing(song);
        let (tx, rx) = events::channel(4096);
        let mut voices = VoicePool::new();
        let mut sched = Scheduler::new(44_100, false);

        // 192 ticks take 172.27 buffers of 512 frames
        for _ in 0..200 {
            sched.advance(&mut state, 512, &mut voices, &tx);
        }
        let changes: Vec<_> = drain(&rx)
            .into_iter()
            .filter(|e| matches!(e, Event::PatternChanged { .. }))
            .collect();
        assert_eq!(changes, vec![Event::PatternChanged { pattern_pos: 1 }]);
        assert_eq!(state.transport.pattern_pos(), 1);
    }

    #[test]
    fn song_end_without_loop_stops() {
        let mut song = kit();
        song.patterns[0].set_length(1);
        song.mode = SongMode::Song;
        let mut state = playing(song);
        let (tx, rx) = events::channel(64);
        let mut voices = VoicePool::new();
        Scheduler::new(48_000, false).advance(&mut state, 2048, &mut voices, &tx);

        assert_eq!(state.transport.state(), PlaybackState::Stopped);
        assert_eq!(state.transport.pattern_pos(), 0);
        assert!(drain(&rx).contains(&Event::State(PlaybackState::Stopped)));
    }

    #[test]
    fn pattern_mode_loop_replays_first_note() {
        let mut song = kit();
        let kick = song.instrument_id(0).unwrap();
        song.patterns[0].set_length(2);
        song.patterns[0].insert_note(Note::new(kick, 0, 1.0)).unwrap();
        let mut state = playing(song);
        let (tx, rx) = events::channel(64);
        let mut voices = VoicePool::new();
        // 2 ticks are 1000 frames; 2500 frames cross the loop twice
        Scheduler::new(48_000, false).advance(&mut state, 2500, &mut voices, &tx);

        let events = drain(&rx);
        let notes = events.iter().filter(|e| matches!(e, Event::NoteOn { .. })).count();
        let loops = events.iter().filter(|e| matches!(e, Event::PatternChanged { .. })).count();
        assert_eq!(notes, 3);
        assert_eq!(loops, 2);
        assert!(state.transport.is_playing());
    }
}
