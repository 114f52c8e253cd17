// Offline bounce: play the arrangement once through a private engine and
// write what comes out to a WAV file.
use std::path::Path;

use anyhow::Context;

use crate::audio::{Engine, StereoFrame};
use crate::config::EngineConfig;
use crate::events::{self, Event, EventSender};
use crate::shared::{MAX_BUFFER_FRAMES, PlaybackState, SongMode, TICKS_PER_BEAT};
use crate::song::{EngineState, Song};
use crate::transport::Transport;

const MAX_TAIL_SECONDS: u32 = 4; // let ringing samples finish, up to this long

/// Frames one pass over the arrangement takes, without the release tail.
pub fn song_length_frames(song: &Song, sample_rate: u32) -> u64 {
    let song = song_mode(song);
    let mut transport = Transport::new();
    let mut ticks = 0u64;
    for column in 0..song.column_count().max(1) {
        transport.set_pattern_pos(column as i64, song.column_count());
        ticks += transport.column_length(&song) as u64;
    }
    let frames = ticks as f64 * sample_rate as f64 * 60.0 / (song.bpm() as f64 * TICKS_PER_BEAT as f64);
    frames.ceil() as u64
}

fn song_mode(song: &Song) -> Song {
    let mut song = song.clone();
    song.mode = SongMode::Song;
    song.loop_enabled = false;
    song
}

/// Renders `song` once from the first column to a 32-bit float stereo WAV
/// at `path`, sending `Progress` events as it goes. Returns frames written.
pub fn export_wav(song: &Song, path: &Path, config: &EngineConfig, progress: &EventSender) -> anyhow::Result<u64> {
    let song = song_mode(song);
    let sample_rate = config.sample_rate;
    let total = song_length_frames(&song, sample_rate).max(1);

    let shared = EngineState::new_shared(song);
    shared.lock().transport.set_state(PlaybackState::Playing);

    // the bounce gets its own engine, so the live one keeps running
    let (_cmd_tx, cmd_rx) = crossbeam_channel::bounded(1);
    let (ev_tx, ev_rx) = events::channel(events::DEFAULT_EVENT_CAPACITY);
    let mut render_config = config.clone();
    render_config.metronome = false;
    let mut engine = Engine::new(shared.clone(), cmd_rx, ev_tx, &render_config);

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).with_context(|| format!("cannot create {}", path.display()))?;

    let block_len = config.buffer_frames.clamp(64, MAX_BUFFER_FRAMES);
    let mut block = vec![StereoFrame::zero(); block_len];
    let mut written = 0u64;
    let mut last_percent = None;

    let mut write_block = |block: &[StereoFrame], written: &mut u64| -> anyhow::Result<()> {
        for f in block {
            writer.write_sample(f.left)?;
            writer.write_sample(f.right)?;
        }
        *written += block.len() as u64;
        Ok(())
    };

    progress.push(Event::Progress(0));
    while shared.lock().transport.is_playing() {
        engine.process(&mut block);
        write_block(&block, &mut written)?;
        while ev_rx.pop().is_some() {}

        let percent = ((written * 100 / total).min(99)) as u8;
        if last_percent != Some(percent) {
            progress.push(Event::Progress(percent));
            last_percent = Some(percent);
        }
    }

    let max_tail = (MAX_TAIL_SECONDS * sample_rate) as u64;
    let mut tail = 0u64;
    while engine.active_voices() > 0 && tail < max_tail {
        engine.process(&mut block);
        write_block(&block, &mut written)?;
        tail += block.len() as u64;
    }
    drop(write_block);

    writer.finalize().with_context(|| format!("cannot finish {}", path.display()))?;
    progress.push(Event::Progress(100));
    log::info!("exported {written} frames to {}", path.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SampleBuffer;
    use crate::song::{Instrument, Layer, Note, Pattern};

    #[test]
    fn length_sums_the_longest_pattern_of_each_column() {
        let mut song = Song::default();
        song.patterns.push(Pattern::new("Short", 96));
        song.arrangement = vec![vec![0], vec![1], vec![0, 1]];
        // 192 + 96 + 192 ticks, 500 frames each at 120 bpm / 48k
        assert_eq!(song_length_frames(&song, 48_000), 480 * 500);
    }

    #[test]
    fn bounce_writes_float_stereo_and_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bounce.wav");
        let buf = SampleBuffer::from_frames(vec![StereoFrame::mono(0.5); 100]);
        let mut song = Song::with_instruments("bounce", [Instrument::new("Kick").with_layer(Layer::with_buffer(buf))]);
        let kick = song.instrument_id(0).unwrap();
        song.patterns[0].set_length(48);
        song.patterns[0].insert_note(Note::new(kick, 0, 1.0)).unwrap();
        // a looping live song still bounces once
        song.loop_enabled = true;

        let config = EngineConfig::headless();
        let (tx, rx) = events::channel(256);
        let frames = export_wav(&song, &path, &config, &tx).unwrap();
        // one beat at 120 bpm is 22050 frames at 44.1k, rounded up to whole blocks
        assert!(frames >= 22_050);
        assert!(frames < 22_050 + 2 * 512);

        let reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_format, hound::SampleFormat::Float);
        assert_eq!(reader.duration() as u64, frames);

        let progress: Vec<u8> = std::iter::from_fn(|| rx.pop())
            .filter_map(|e| match e {
                Event::Progress(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(progress.first(), Some(&0));
        assert_eq!(progress.last(), Some(&100));
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    }
}
