use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::config::EngineConfig;
use crate::events::{Event, EventSender};
use crate::shared::{MAX_BUFFER_FRAMES, PlaybackState};
use crate::song::SharedState;

mod click;
mod effect;
mod engine;
mod error;
mod frame;
mod mixer;
mod sample_buffer;
mod scheduler;
mod voice;
mod xrun;

pub use click::Clicks;
pub use effect::{Bitcrusher, Distortion, Effect, EffectSpec};
pub use engine::{Engine, EngineStats};
pub use error::DriverError;
pub use frame::StereoFrame;
pub use mixer::Mixer;
pub use sample_buffer::SampleBuffer;
pub use scheduler::{Hit, Scheduler, instrument_voice};
pub use voice::{Voice, VoicePool, VoiceSource, pan_gain};
pub use xrun::{DEFAULT_XRUN_TOLERANCE, XrunDetector};

/// Turns a driver failure into the stopped state plus an `Error` event.
/// Called from driver threads and from the control thread, never from
/// inside the audio callback.
#[derive(Clone)]
pub struct FailureReporter {
    shared: SharedState,
    events: EventSender,
}

impl FailureReporter {
    pub fn new(shared: SharedState, events: EventSender) -> Self {
        Self { shared, events }
    }

    pub fn report(&self, error: DriverError) {
        log::error!("{error} (code {})", error.code());
        let was_playing = {
            let mut state = self.shared.lock();
            let playing = state.transport.is_playing();
            state.transport.set_state(PlaybackState::Stopped);
            playing
        };
        if was_playing {
            self.events.push(Event::State(PlaybackState::Stopped));
        }
        self.events.push(Event::Error(error));
    }
}

// Keeps the audio running for as long as it is alive.
pub struct AudioHandle {
    driver: &'static str,
    _stream: Option<cpal::Stream>,
    _null: Option<NullDriver>,
}

impl AudioHandle {
    pub fn driver_name(&self) -> &'static str {
        self.driver
    }
}

pub fn start_audio(engine: Engine, config: &EngineConfig, reporter: FailureReporter) -> Result<AudioHandle, DriverError> {
    let sample_rate = engine.sample_rate();
    let handle = match config.driver.as_str() {
        "cpal" => AudioHandle {
            driver: "cpal",
            _stream: Some(start_cpal(engine, config, reporter)?),
            _null: None,
        },
        "null" => AudioHandle {
            driver: "null",
            _stream: None,
            _null: Some(NullDriver::start(engine, config)?),
        },
        other => {
            log::error!("unknown audio driver '{other}'");
            return Err(DriverError::UnknownDriver);
        }
    };
    log::info!("audio driver '{}' running at {sample_rate} Hz", handle.driver);
    Ok(handle)
}

/// The rate the output will really run at: the configured one when the
/// default device can play it, else the device's own. Build the engine
/// and load samples at this rate before calling [`start_audio`].
pub fn negotiate_sample_rate(config: &EngineConfig) -> u32 {
    if config.driver != "cpal" {
        return config.sample_rate;
    }
    let Some(device) = cpal::default_host().default_output_device() else {
        return config.sample_rate;
    };
    match device_rate(&device, config.sample_rate) {
        Ok(rate) => {
            if rate != config.sample_rate {
                log::warn!("output device cannot run at {} Hz, using {rate} Hz", config.sample_rate);
            }
            rate
        }
        Err(e) => {
            log::warn!("cannot query output device rates: {e}");
            config.sample_rate
        }
    }
}

// `wanted` if some f32 range with the default channel count covers it,
// else the default config's rate
fn device_rate(device: &cpal::Device, wanted: u32) -> Result<u32, String> {
    let default = device.default_output_config().map_err(|e| e.to_string())?;
    let channels = default.channels();
    let ranges = device
        .supported_output_configs()
        .map_err(|e| e.to_string())?
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32 && c.channels() == channels)
        .map(|c| (c.min_sample_rate(), c.max_sample_rate()));
    Ok(pick_rate(wanted, ranges, default.sample_rate()))
}

fn pick_rate(wanted: u32, mut ranges: impl Iterator<Item = (u32, u32)>, fallback: u32) -> u32 {
    if ranges.any(|(lo, hi)| (lo..=hi).contains(&wanted)) {
        wanted
    } else {
        fallback
    }
}

// ── cpal ──────────────────────────────────────────────────────────

fn start_cpal(mut engine: Engine, config: &EngineConfig, reporter: FailureReporter) -> Result<cpal::Stream, DriverError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or_else(|| {
        log::error!("no default output device");
        DriverError::ErrorStartingDriver
    })?;
    let supported = device.default_output_config().map_err(|e| {
        log::error!("no default output config: {e}");
        DriverError::ErrorStartingDriver
    })?;
    if supported.sample_format() != cpal::SampleFormat::F32 {
        log::error!("unsupported sample format {:?} (only f32)", supported.sample_format());
        return Err(DriverError::ErrorInPortRegister);
    }

    let rate = device_rate(&device, engine.sample_rate()).map_err(|e| {
        log::error!("cannot query output device rates: {e}");
        DriverError::ErrorStartingDriver
    })?;
    if rate != engine.sample_rate() {
        log::error!("engine runs at {} Hz but the output device wants {rate} Hz", engine.sample_rate());
        return Err(DriverError::ErrorStartingDriver);
    }

    let channels = supported.channels() as usize;
    let mut stream_config: cpal::StreamConfig = supported.into();
    stream_config.sample_rate = rate;

    let mut xruns = XrunDetector::new(engine.sample_rate(), config.xrun_tolerance);
    let mut origin: Option<cpal::StreamInstant> = None;
    let mut shutdown_reported = false;

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], info: &cpal::OutputCallbackInfo| {
                let now = info.timestamp().callback;
                let first = *origin.get_or_insert(now);
                if let Some(at) = now.duration_since(&first)
                    && xruns.observe(at, data.len() / channels.max(1))
                {
                    engine.report_xrun();
                }
                engine.process_interleaved(data, channels);
            },
            move |err: cpal::StreamError| match err {
                cpal::StreamError::DeviceNotAvailable => {
                    if !shutdown_reported {
                        shutdown_reported = true;
                        reporter.report(DriverError::ServerShutdown);
                    }
                }
                other => log::warn!("audio stream error: {other}"),
            },
            None,
        )
        .map_err(|e| {
            log::error!("failed to build output stream: {e}");
            DriverError::CannotActivateClient
        })?;

    stream.play().map_err(|e| {
        log::error!("failed to play output stream: {e}");
        DriverError::CannotConnectOutputPort
    })?;
    Ok(stream)
}

// ── null ──────────────────────────────────────────────────────────

// Calls the engine on its own thread at the buffer period and throws the
// audio away. For machines without a sound card, and for tests.
struct NullDriver {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl NullDriver {
    fn start(mut engine: Engine, config: &EngineConfig) -> Result<Self, DriverError> {
        let frames = config.buffer_frames.clamp(16, MAX_BUFFER_FRAMES);
        let sample_rate = engine.sample_rate().max(1);
        let period = Duration::from_secs_f64(frames as f64 / sample_rate as f64);
        let tolerance = config.xrun_tolerance;

        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let thread = std::thread::Builder::new()
            .name(String::from("drumseq-null-audio"))
            .spawn(move || {
                let mut out = vec![StereoFrame::zero(); frames];
                let mut xruns = XrunDetector::new(sample_rate, tolerance);
                let start = Instant::now();
                let mut deadline = start;
                while !flag.load(Ordering::Relaxed) {
                    if xruns.observe(start.elapsed(), frames) {
                        engine.report_xrun();
                    }
                    engine.process(&mut out);
                    deadline += period;
                    let now = Instant::now();
                    if deadline > now {
                        std::thread::sleep(deadline - now);
                    } else {
                        deadline = now; // fell behind, do not try to catch up
                    }
                }
            })
            .map_err(|e| {
                log::error!("failed to spawn null audio thread: {e}");
                DriverError::ErrorStartingDriver
            })?;

        Ok(Self { stop, thread: Some(thread) })
    }
}

impl Drop for NullDriver {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events;
    use crate::song::{EngineState, Song};

    fn engine_for(config: &EngineConfig) -> (SharedState, Engine, events::EventReceiver, EventSender) {
        let shared = EngineState::new_shared(Song::default());
        let (_cmd_tx, cmd_rx) = crossbeam_channel::bounded(4);
        let (tx, rx) = events::channel(64);
        let engine = Engine::new(shared.clone(), cmd_rx, tx.clone(), config);
        (shared, engine, rx, tx)
    }

    #[test]
    fn unknown_driver_is_rejected() {
        let mut config = EngineConfig::headless();
        config.driver = String::from("jack2000");
        let (shared, engine, _rx, tx) = engine_for(&config);
        let err = start_audio(engine, &config, FailureReporter::new(shared, tx)).err();
        assert_eq!(err, Some(DriverError::UnknownDriver));
    }

    #[test]
    fn null_driver_moves_the_transport() {
        let mut config = EngineConfig::headless();
        config.buffer_frames = 64;
        let (shared, engine, _rx, tx) = engine_for(&config);
        shared.lock().transport.set_state(PlaybackState::Playing);
        let handle = start_audio(engine, &config, FailureReporter::new(shared.clone(), tx)).unwrap();
        assert_eq!(handle.driver_name(), "null");

        let deadline = Instant::now() + Duration::from_secs(5);
        while shared.lock().transport.frame() == 0 && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        drop(handle);
        assert!(shared.lock().transport.frame() > 0);
    }

    #[test]
    fn configured_rate_is_kept_only_when_the_device_can_play_it() {
        let ranges = [(8_000, 48_000), (96_000, 96_000)];
        assert_eq!(pick_rate(44_100, ranges.into_iter(), 48_000), 44_100);
        assert_eq!(pick_rate(96_000, ranges.into_iter(), 48_000), 96_000);
        assert_eq!(pick_rate(44_100, [(48_000, 48_000)].into_iter(), 48_000), 48_000);
        assert_eq!(pick_rate(44_100, std::iter::empty(), 48_000), 48_000);
    }

    #[test]
    fn null_driver_runs_at_the_configured_rate() {
        let mut config = EngineConfig::headless();
        config.sample_rate = 22_050;
        assert_eq!(negotiate_sample_rate(&config), 22_050);
    }

    #[test]
    fn failure_stops_playback_and_reports_code() {
        let (shared, _engine, rx, tx) = engine_for(&EngineConfig::headless());
        shared.lock().transport.set_state(PlaybackState::Playing);
        FailureReporter::new(shared.clone(), tx).report(DriverError::ServerShutdown);

        assert!(!shared.lock().transport.is_playing());
        assert_eq!(rx.pop(), Some(Event::State(PlaybackState::Stopped)));
        assert_eq!(rx.pop(), Some(Event::Error(DriverError::ServerShutdown)));
        assert_eq!(DriverError::ServerShutdown.code(), 2);
    }
}
