// Sums the voice pool into the output block. Every buffer here is sized at
// construction; `render` only reads and writes them.

use super::click::Clicks;
use super::effect::{Effect, EffectSpec};
use super::frame::StereoFrame;
use super::sample_buffer::SampleBuffer;
use super::voice::{VoicePool, VoiceSource};
use crate::shared::{MAX_BUFFER_FRAMES, MAX_FX};
use crate::song::Song;

pub struct Mixer {
    scratch: Vec<StereoFrame>,
    buses: [Vec<StereoFrame>; MAX_FX],
    effects: [Option<Box<dyn Effect>>; MAX_FX],
}

impl Mixer {
    pub fn new(fx: &[EffectSpec]) -> Self {
        Self {
            scratch: vec![StereoFrame::zero(); MAX_BUFFER_FRAMES],
            buses: std::array::from_fn(|_| vec![StereoFrame::zero(); MAX_BUFFER_FRAMES]),
            effects: std::array::from_fn(|k| fx.get(k).map(EffectSpec::to_effect)),
        }
    }

    /// Mixes every active voice into `out` (at most MAX_BUFFER_FRAMES long),
    /// runs the fx slots on what the instruments sent them, applies the song
    /// volume.
    pub fn render(&mut self, song: &Song, voices: &mut VoicePool, clicks: &Clicks, out: &mut [StereoFrame]) {
        let n = out.len().min(MAX_BUFFER_FRAMES);
        let out = &mut out[..n];
        for bus in &mut self.buses {
            bus[..n].fill(StereoFrame::zero());
        }

        for voice in voices.active_mut() {
            let (buffer, sends): (&SampleBuffer, [f32; MAX_FX]) = match voice.source {
                VoiceSource::Layer { instrument, layer } => {
                    let found = song.instruments.get(instrument).and_then(|inst| {
                        let buf = inst.layers.get(layer)?.buffer.as_deref()?;
                        Some((buf, inst.fx_sends))
                    });
                    match found {
                        Some(f) => f,
                        None => {
                            voice.stop(); // instrument or sample is gone
                            continue;
                        }
                    }
                }
                VoiceSource::Click { accent } => (clicks.get(accent), [0.0; MAX_FX]),
            };

            let scratch = &mut self.scratch[..n];
            scratch.fill(StereoFrame::zero());
            voice.render_into(buffer, scratch);

            for (o, s) in out.iter_mut().zip(scratch.iter()) {
                o.mix(*s, 1.0);
            }
            for (k, send) in sends.iter().enumerate() {
                if *send <= 0.0 || self.effects[k].is_none() {
                    continue;
                }
                for (b, s) in self.buses[k][..n].iter_mut().zip(scratch.iter()) {
                    b.mix(*s, *send);
                }
            }
        }

        for (fx, bus) in self.effects.iter_mut().zip(self.buses.iter_mut()) {
            let Some(fx) = fx else { continue };
            let bus = &mut bus[..n];
            fx.process(bus);
            for (o, b) in out.iter_mut().zip(bus.iter()) {
                o.mix(*b, 1.0);
            }
        }

        let master = song.volume.max(0.0);
        for o in out.iter_mut() {
            o.scale(master);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::voice::Voice;
    use crate::song::{Instrument, Layer};

    fn song_with_constant_sample(level: f32) -> Song {
        let buf = SampleBuffer::from_frames(vec![StereoFrame::mono(level); 64]);
        let mut song = Song::with_instruments("mix", [Instrument::new("Pad").with_layer(Layer::with_buffer(buf))]);
        song.volume = 1.0;
        song
    }

    #[test]
    fn voices_sum_and_master_scales() {
        let mut song = song_with_constant_sample(0.25);
        let id = song.instrument_id(0).unwrap();
        let mut voices = VoicePool::new();
        for _ in 0..2 {
            voices.trigger(Voice::new(VoiceSource::Layer { instrument: id, layer: 0 }, 1.0, 1.0, 1.0));
        }
        let mut mixer = Mixer::new(&[]);
        let clicks = Clicks::new(44_100);
        let mut out = vec![StereoFrame::zero(); 16];
        mixer.render(&song, &mut voices, &clicks, &mut out);
        assert!((out[0].left - 0.5).abs() < 1e-6);

        song.volume = 0.5;
        let mut out = vec![StereoFrame::zero(); 16];
        mixer.render(&song, &mut voices, &clicks, &mut out);
        assert!((out[0].left - 0.25).abs() < 1e-6);
    }

    #[test]
    fn voice_of_a_deleted_instrument_goes_quiet() {
        let mut song = song_with_constant_sample(0.25);
        let id = song.instrument_id(0).unwrap();
        let mut voices = VoicePool::new();
        voices.trigger(Voice::new(VoiceSource::Layer { instrument: id, layer: 0 }, 1.0, 1.0, 1.0));
        song.instruments.remove(0);

        let mut mixer = Mixer::new(&[]);
        let mut out = vec![StereoFrame::zero(); 16];
        mixer.render(&song, &mut voices, &Clicks::new(44_100), &mut out);
        assert!(out.iter().all(|f| *f == StereoFrame::zero()));
        assert_eq!(voices.active_count(), 0);
    }

    #[test]
    fn fx_send_adds_processed_copy() {
        let mut song = song_with_constant_sample(0.4);
        let id = song.instrument_id(0).unwrap();
        song.instruments.get_mut(id).unwrap().fx_sends[0] = 1.0;
        let mut voices = VoicePool::new();
        voices.trigger(Voice::new(VoiceSource::Layer { instrument: id, layer: 0 }, 1.0, 1.0, 1.0));

        // 3 levels snaps 0.4 to 0.0, so the wet path adds nothing
        let mut mixer = Mixer::new(&[EffectSpec::Bitcrusher { levels: 3 }]);
        let mut out = vec![StereoFrame::zero(); 8];
        mixer.render(&song, &mut voices, &Clicks::new(44_100), &mut out);
        assert!((out[0].left - 0.4).abs() < 1e-6);

        // 2 levels snaps it to 1.0
        let mut voices = VoicePool::new();
        voices.trigger(Voice::new(VoiceSource::Layer { instrument: id, layer: 0 }, 1.0, 1.0, 1.0));
        let mut mixer = Mixer::new(&[EffectSpec::Bitcrusher { levels: 2 }]);
        let mut out = vec![StereoFrame::zero(); 8];
        mixer.render(&song, &mut voices, &Clicks::new(44_100), &mut out);
        assert!((out[0].left - 1.4).abs() < 1e-6);
    }
}
