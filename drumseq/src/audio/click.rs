// Metronome clicks, synthesized once at startup so the callback only reads.

use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;

pub struct Clicks {
    pub accent: SampleBuffer,
    pub beat: SampleBuffer,
}

impl Clicks {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            accent: sine_burst(sample_rate, 1760.0, 0.030),
            beat: sine_burst(sample_rate, 880.0, 0.025),
        }
    }

    pub fn get(&self, accent: bool) -> &SampleBuffer {
        if accent { &self.accent } else { &self.beat }
    }
}

// short decaying sine, the classic click
fn sine_burst(sample_rate: u32, freq: f32, seconds: f32) -> SampleBuffer {
    let len = (sample_rate as f32 * seconds) as usize;
    let sr = sample_rate as f32;
    let frames = (0..len)
        .map(|i| {
            let t = i as f32 / sr;
            let env = (-t * 150.0).exp();
            StereoFrame::mono((std::f32::consts::TAU * freq * t).sin() * env)
        })
        .collect();
    SampleBuffer::from_frames(frames)
}
