use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::Receiver;

use super::click::Clicks;
use super::frame::StereoFrame;
use super::mixer::Mixer;
use super::scheduler::{Scheduler, instrument_voice};
use super::voice::VoicePool;
use crate::audio_api::AudioCommand;
use crate::config::EngineConfig;
use crate::events::{Event, EventSender};
use crate::shared::MAX_BUFFER_FRAMES;
use crate::song::SharedState;

/// Counters the audio thread bumps and anyone may read.
#[derive(Debug, Default)]
pub struct EngineStats {
    xruns: AtomicU64,
    contended: AtomicU64,
}

impl EngineStats {
    pub fn xruns(&self) -> u64 {
        self.xruns.load(Ordering::Relaxed)
    }

    /// Buffers rendered silent because the control thread held the lock.
    pub fn contended_buffers(&self) -> u64 {
        self.contended.load(Ordering::Relaxed)
    }
}

// Lives on the audio thread. Everything it touches per buffer is allocated
// here in `new`.
pub struct Engine {
    shared: SharedState,
    commands: Receiver<AudioCommand>,
    events: EventSender,
    stats: Arc<EngineStats>,
    scheduler: Scheduler,
    voices: VoicePool,
    clicks: Clicks,
    mixer: Mixer,
    scratch: Vec<StereoFrame>,
}

impl Engine {
    pub fn new(shared: SharedState, commands: Receiver<AudioCommand>, events: EventSender, config: &EngineConfig) -> Self {
        Self {
            shared,
            commands,
            events,
            stats: Arc::new(EngineStats::default()),
            scheduler: Scheduler::new(config.sample_rate, config.metronome),
            voices: VoicePool::new(),
            clicks: Clicks::new(config.sample_rate),
            mixer: Mixer::new(&config.fx),
            scratch: vec![StereoFrame::zero(); MAX_BUFFER_FRAMES],
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.scheduler.sample_rate()
    }

    pub fn stats(&self) -> Arc<EngineStats> {
        Arc::clone(&self.stats)
    }

    pub fn active_voices(&self) -> usize {
        self.voices.active_count()
    }

    /// One hardware buffer. Silence if the song is being edited right now.
    pub fn process(&mut self, out: &mut [StereoFrame]) {
        out.fill(StereoFrame::zero());
        let Some(mut guard) = self.shared.try_lock() else {
            self.stats.contended.fetch_add(1, Ordering::Relaxed);
            return;
        };
        let state = &mut *guard;

        while let Ok(cmd) = self.commands.try_recv() {
            match cmd {
                AudioCommand::Trigger(t) => {
                    if let Some(voice) = instrument_voice(&state.song, t.instrument, t.hit) {
                        self.voices.trigger(voice);
                    }
                }
                AudioCommand::AllNotesOff => self.voices.release_all(),
                AudioCommand::SetMetronome(on) => self.scheduler.metronome = on,
            }
        }

        for chunk in out.chunks_mut(MAX_BUFFER_FRAMES) {
            self.scheduler.advance(state, chunk.len(), &mut self.voices, &self.events);
            self.mixer.render(&state.song, &mut self.voices, &self.clicks, chunk);
        }
    }

    /// `process` for an interleaved f32 device buffer. Mono gets the mean of
    /// both sides, channels past the second get silence.
    pub fn process_interleaved(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let mut scratch = std::mem::take(&mut self.scratch);
        for chunk in data.chunks_mut(MAX_BUFFER_FRAMES * channels) {
            let frames = chunk.len() / channels;
            let block = &mut scratch[..frames];
            self.process(block);
            for (dst, src) in chunk.chunks_exact_mut(channels).zip(block.iter()) {
                if channels == 1 {
                    dst[0] = 0.5 * (src.left + src.right);
                    continue;
                }
                dst[0] = src.left;
                dst[1] = src.right;
                dst[2..].fill(0.0);
            }
        }
        self.scratch = scratch;
    }

    pub fn report_xrun(&self) {
        self.stats.xruns.fetch_add(1, Ordering::Relaxed);
        self.events.push(Event::Xrun);
    }
}
