//! Notifications from the engine to whoever is watching.
//!
//! Producers (the audio callback, the control context, the driver error
//! hook) push [`Event`]s through an [`EventSender`]; the front-end drains
//! the single [`EventReceiver`] on its own timer. Pushing never blocks and
//! never allocates: the channel is bounded and pre-sized, and an event that
//! does not fit is dropped and counted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError};

use crate::audio::DriverError;
use crate::shared::PlaybackState;
use crate::song::InstrumentId;

pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryStep {
    Undo,
    Redo,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    State(PlaybackState),
    PatternChanged { pattern_pos: usize },
    PatternModified,
    SongModified,
    SelectedPatternChanged(usize),
    SelectedInstrumentChanged(Option<usize>),
    NoteOn { instrument: InstrumentId, velocity: f32 },
    Error(DriverError),
    Xrun,
    Metronome { accent: bool },
    TempoChanged(f32),
    Progress(u8), // export, percent
    UndoRedo(HistoryStep),
}

/// One method per event kind; implement the ones you care about.
pub trait EventListener {
    fn on_state_changed(&mut self, _state: PlaybackState) {}
    fn on_pattern_changed(&mut self, _pattern_pos: usize) {}
    fn on_pattern_modified(&mut self) {}
    fn on_song_modified(&mut self) {}
    fn on_selected_pattern_changed(&mut self, _index: usize) {}
    fn on_selected_instrument_changed(&mut self, _row: Option<usize>) {}
    fn on_note_on(&mut self, _instrument: InstrumentId, _velocity: f32) {}
    fn on_error(&mut self, _error: DriverError) {}
    fn on_xrun(&mut self) {}
    fn on_metronome(&mut self, _accent: bool) {}
    fn on_tempo_changed(&mut self, _bpm: f32) {}
    fn on_progress(&mut self, _percent: u8) {}
    fn on_undo_redo(&mut self, _step: HistoryStep) {}
}

impl Event {
    pub fn dispatch(self, listener: &mut dyn EventListener) {
        match self {
            Event::State(s) => listener.on_state_changed(s),
            Event::PatternChanged { pattern_pos } => listener.on_pattern_changed(pattern_pos),
            Event::PatternModified => listener.on_pattern_modified(),
            Event::SongModified => listener.on_song_modified(),
            Event::SelectedPatternChanged(i) => listener.on_selected_pattern_changed(i),
            Event::SelectedInstrumentChanged(row) => listener.on_selected_instrument_changed(row),
            Event::NoteOn { instrument, velocity } => listener.on_note_on(instrument, velocity),
            Event::Error(e) => listener.on_error(e),
            Event::Xrun => listener.on_xrun(),
            Event::Metronome { accent } => listener.on_metronome(accent),
            Event::TempoChanged(bpm) => listener.on_tempo_changed(bpm),
            Event::Progress(p) => listener.on_progress(p),
            Event::UndoRedo(step) => listener.on_undo_redo(step),
        }
    }
}

pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = crossbeam_channel::bounded(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        EventSender { tx, dropped: Arc::clone(&dropped) },
        EventReceiver { rx, dropped },
    )
}

#[derive(Clone)]
pub struct EventSender {
    tx: Sender<Event>,
    dropped: Arc<AtomicU64>,
}

impl EventSender {
    /// Queues `event` if there is room. Safe to call from the audio thread.
    pub fn push(&self, event: Event) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

pub struct EventReceiver {
    rx: Receiver<Event>,
    dropped: Arc<AtomicU64>,
}

impl EventReceiver {
    /// Next queued event, or `None` when there is nothing waiting.
    pub fn pop(&self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Events lost to a full queue since startup.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Drains what is queued right now into `listener`; returns how many.
    /// Events pushed while draining wait for the next call.
    pub fn dispatch_pending(&self, listener: &mut dyn EventListener) -> usize {
        let pending = self.rx.len();
        let mut handled = 0;
        while handled < pending {
            let Some(event) = self.pop() else { break };
            event.dispatch(listener);
            handled += 1;
        }
        handled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[derive(Default)]
    struct Recorder {
        states: Vec<PlaybackState>,
        patterns: Vec<usize>,
        xruns: usize,
    }

    impl EventListener for Recorder {
        fn on_state_changed(&mut self, state: PlaybackState) {
            self.states.push(state);
        }
        fn on_pattern_changed(&mut self, pattern_pos: usize) {
            self.patterns.push(pattern_pos);
        }
        fn on_xrun(&mut self) {
            self.xruns += 1;
        }
    }

    #[test]
    fn empty_queue_pops_none() {
        let (_tx, rx) = channel(4);
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn fifo_per_producer() {
        let (tx, rx) = channel(8);
        for pos in 0..5 {
            tx.push(Event::PatternChanged { pattern_pos: pos });
        }
        let got: Vec<_> = std::iter::from_fn(|| rx.pop()).collect();
        assert_eq!(
            got,
            (0..5).map(|p| Event::PatternChanged { pattern_pos: p }).collect::<Vec<_>>()
        );
    }

    #[test]
    fn overflow_drops_and_counts() {
        let (tx, rx) = channel(2);
        assert!(tx.push(Event::Xrun));
        assert!(tx.push(Event::Xrun));
        assert!(!tx.push(Event::SongModified));
        assert_eq!(rx.dropped(), 1);
        assert_eq!(rx.len(), 2);
    }

    #[test]
    fn dispatch_routes_to_listener() {
        let (tx, rx) = channel(8);
        tx.push(Event::State(PlaybackState::Playing));
        tx.push(Event::PatternChanged { pattern_pos: 3 });
        tx.push(Event::Xrun);
        tx.push(Event::SongModified); // recorder ignores it
        let mut rec = Recorder::default();
        assert_eq!(rx.dispatch_pending(&mut rec), 4);
        assert_eq!(rec.states, vec![PlaybackState::Playing]);
        assert_eq!(rec.patterns, vec![3]);
        assert_eq!(rec.xruns, 1);
    }

    #[test]
    fn producer_never_blocks_under_a_slow_consumer() {
        const PUSHES: u64 = 100_000;
        let (tx, rx) = channel(64);
        let producer = thread::spawn(move || {
            let mut accepted = 0u64;
            for i in 0..PUSHES {
                if tx.push(Event::PatternChanged { pattern_pos: i as usize }) {
                    accepted += 1;
                }
            }
            accepted
        });

        let mut received = 0u64;
        let mut last = None;
        while !producer.is_finished() || !rx.is_empty() {
            if let Some(Event::PatternChanged { pattern_pos }) = rx.pop() {
                // whatever survives keeps its order
                if let Some(prev) = last {
                    assert!(pattern_pos > prev);
                }
                last = Some(pattern_pos);
                received += 1;
            }
            thread::yield_now();
        }
        let accepted = producer.join().unwrap();
        assert_eq!(accepted, received);
        assert_eq!(accepted + rx.dropped(), PUSHES);
    }
}
