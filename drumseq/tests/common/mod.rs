#![allow(dead_code)]

use std::path::Path;

use drumseq::audio::{SampleBuffer, StereoFrame};
use drumseq::events::{Event, EventReceiver};
use drumseq::song::{Instrument, Layer, Song};

/// Two instruments with short, loud in-memory samples.
pub fn kit(name: &str) -> Song {
    let buf = SampleBuffer::from_frames(vec![StereoFrame::mono(0.5); 256]);
    Song::with_instruments(
        name,
        [
            Instrument::new("Kick").with_layer(Layer::with_buffer(buf.clone())),
            Instrument::new("Snare").with_layer(Layer::with_buffer(buf)),
        ],
    )
}

pub fn drain(rx: &EventReceiver) -> Vec<Event> {
    std::iter::from_fn(|| rx.pop()).collect()
}

pub fn write_wav(path: &Path, frames: usize) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 44_100,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..frames {
        writer.write_sample((i as i16).wrapping_mul(64)).unwrap();
    }
    writer.finalize().unwrap();
}
