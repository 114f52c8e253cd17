use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use crate::shared::MAX_VOICES;
use crate::song::InstrumentId;

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// 0.5 is unity, 0 is silent, anything from 1 up is unity again; with the
/// other side at 0 that is a hard pan.
#[inline]
pub fn pan_gain(pan: f32) -> f32 {
    (pan * 2.0).clamp(0.0, 1.0)
}

// Voices never own audio. They name where their samples live and the mixer
// looks the buffer up under the engine lock each block, so a deleted
// instrument silences its voices instead of dangling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum VoiceSource {
    Layer { instrument: InstrumentId, layer: usize },
    Click { accent: bool },
}

#[derive(Clone, Copy, Debug)]
pub struct Voice {
    pub source: VoiceSource,
    pub pos: f32,
    pub pitch: f32,
    pub gain_l: f32,
    pub gain_r: f32,
    pub active: bool,
    offset: usize,            // frames to wait before the first sample
    remaining: Option<usize>, // frames until note-off, None = to the end
    age: u64,
}

impl Voice {
    const IDLE: Voice = Voice {
        source: VoiceSource::Click { accent: false },
        pos: 0.0,
        pitch: 1.0,
        gain_l: 0.0,
        gain_r: 0.0,
        active: false,
        offset: 0,
        remaining: None,
        age: 0,
    };

    pub fn new(source: VoiceSource, gain_l: f32, gain_r: f32, pitch: f32) -> Self {
        Self {
            source,
            pitch: pitch.max(0.01),
            gain_l,
            gain_r,
            active: true,
            ..Self::IDLE
        }
    }

    /// Starts this many frames into the next rendered block.
    pub fn starting_at(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn lasting(mut self, frames: Option<usize>) -> Self {
        self.remaining = frames;
        self
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    // Adds this voice into `out`, starting at its offset.
    pub fn render_into(&mut self, buffer: &SampleBuffer, out: &mut [StereoFrame]) {
        if !self.active {
            return;
        }
        let len = buffer.data.len();
        if len == 0 {
            self.active = false;
            return;
        }

        let skip = self.offset.min(out.len());
        self.offset -= skip;
        let data = &buffer.data;

        for frame in out[skip..].iter_mut() {
            if self.remaining == Some(0) || self.pos >= len as f32 {
                self.active = false;
                break;
            }

            // read sample at current position
            let i = self.pos as usize;
            let frac = self.pos - i as f32;
            let s0 = data[i];
            let s1 = data.get(i + 1).copied().unwrap_or(s0);
            frame.left += lerp(s0.left, s1.left, frac) * self.gain_l;
            frame.right += lerp(s0.right, s1.right, frac) * self.gain_r;

            self.pos += self.pitch;
            if let Some(r) = self.remaining.as_mut() {
                *r -= 1;
            }
        }
    }
}

/// Fixed pool so triggering never allocates. When full, the oldest voice
/// is taken over.
pub struct VoicePool {
    voices: [Voice; MAX_VOICES],
    clock: u64,
}

impl Default for VoicePool {
    fn default() -> Self {
        Self::new()
    }
}

impl VoicePool {
    pub fn new() -> Self {
        Self {
            voices: [Voice::IDLE; MAX_VOICES],
            clock: 0,
        }
    }

    pub fn trigger(&mut self, mut voice: Voice) {
        let slot = match self.voices.iter().position(|v| !v.active) {
            Some(free) => free,
            None => self
                .voices
                .iter()
                .enumerate()
                .min_by_key(|(_, v)| v.age)
                .map(|(i, _)| i)
                .unwrap_or(0),
        };
        self.clock += 1;
        voice.age = self.clock;
        self.voices[slot] = voice;
    }

    pub fn release_all(&mut self) {
        for v in &mut self.voices {
            v.active = false;
        }
    }

    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.active).count()
    }

    pub fn active_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.voices.iter_mut().filter(|v| v.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> SampleBuffer {
        SampleBuffer::from_frames((0..n).map(|i| StereoFrame::mono(i as f32)).collect())
    }

    #[test]
    fn offset_delays_the_first_sample() {
        let buf = ramp(4);
        let mut v = Voice::new(VoiceSource::Click { accent: true }, 1.0, 1.0, 1.0).starting_at(2);
        let mut out = [StereoFrame::zero(); 8];
        v.render_into(&buf, &mut out);
        assert_eq!(out[0], StereoFrame::zero());
        assert_eq!(out[1], StereoFrame::zero());
        assert_eq!(out[3].left, 1.0);
        assert_eq!(out[5].left, 3.0);
        assert!(!v.active);
    }

    #[test]
    fn offset_past_block_carries_over() {
        let buf = ramp(4);
        let mut v = Voice::new(VoiceSource::Click { accent: true }, 1.0, 1.0, 1.0).starting_at(6);
        let mut out = [StereoFrame::zero(); 4];
        v.render_into(&buf, &mut out);
        assert!(out.iter().all(|f| *f == StereoFrame::zero()));
        let mut out = [StereoFrame::zero(); 4];
        v.render_into(&buf, &mut out);
        assert_eq!(out[2].left, 0.0);
        assert_eq!(out[3].left, 1.0);
    }

    #[test]
    fn note_length_cuts_the_sample() {
        let buf = ramp(100);
        let mut v = Voice::new(VoiceSource::Click { accent: false }, 1.0, 0.0, 1.0).lasting(Some(3));
        let mut out = [StereoFrame::zero(); 10];
        v.render_into(&buf, &mut out);
        assert_eq!(out[2].left, 2.0);
        assert_eq!(out[3].left, 0.0);
        assert!(out.iter().all(|f| f.right == 0.0));
        assert!(!v.active);
    }

    #[test]
    fn full_pool_steals_the_oldest() {
        let mut pool = VoicePool::new();
        for i in 0..MAX_VOICES {
            pool.trigger(Voice::new(VoiceSource::Click { accent: false }, i as f32, 0.0, 1.0));
        }
        assert_eq!(pool.active_count(), MAX_VOICES);
        pool.trigger(Voice::new(VoiceSource::Click { accent: true }, 99.0, 0.0, 1.0));
        assert_eq!(pool.active_count(), MAX_VOICES);
        let gains: Vec<f32> = pool.active_mut().map(|v| v.gain_l).collect();
        assert!(!gains.contains(&0.0));
        assert!(gains.contains(&99.0));
    }

    #[test]
    fn pan_gain_is_unity_at_centre() {
        assert_eq!(pan_gain(0.5), 1.0);
        assert_eq!(pan_gain(0.0), 0.0);
        assert_eq!(pan_gain(1.0), 1.0);
        assert_eq!(pan_gain(0.25), 0.5);
    }
}
