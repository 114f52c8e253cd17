use std::path::Path;
use super::frame::StereoFrame;

// Decoded audio for one instrument layer, already at the engine sample rate
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>,
}

impl SampleBuffer {
    pub fn from_frames(data: Vec<StereoFrame>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Load a WAV file from disk and bring it to the engine rate
    pub fn load_wav(path: &Path, target_rate: u32) -> anyhow::Result<Self> {
        let mut reader = hound::WavReader::open(path)?;
        let spec = reader.spec();
        let file_rate = spec.sample_rate;
        let file_channels = spec.channels as usize;

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => { // int, convert to float
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        if file_channels == 0 {
            anyhow::bail!("{} has no channels", path.display());
        }

        // mono is duplicated, anything wider keeps its first two channels
        let mut frames: Vec<StereoFrame> = samples
            .chunks_exact(file_channels)
            .map(|c| StereoFrame {
                left: c[0],
                right: if file_channels > 1 { c[1] } else { c[0] },
            })
            .collect();

        if file_rate != target_rate {
            frames = resample_linear(&frames, file_rate, target_rate);
        }

        Ok(Self { data: frames })
    }
}

pub(crate) fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    if source_rate == target_rate || frames.is_empty() {
        return frames.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (frames.len() as f64 * ratio).ceil() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 / ratio; // fractional position in the source, ex. 3.7
        let idx = src_pos.floor() as usize;
        let frac = (src_pos - idx as f64) as f32;
        if idx >= frames.len() - 1 {
            out.push(frames[frames.len() - 1]);
        } else {
            let a = frames[idx];
            let b = frames[idx + 1];
            out.push(StereoFrame {
                left: a.left * (1.0 - frac) + b.left * frac,
                right: a.right * (1.0 - frac) + b.right * frac,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsampling_doubles_length_and_interpolates() {
        let frames = vec![StereoFrame::mono(0.0), StereoFrame::mono(1.0)];
        let out = resample_linear(&frames, 22_050, 44_100);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], StereoFrame::mono(0.0));
        assert!((out[1].left - 0.5).abs() < 1e-6);
        assert_eq!(out[3], StereoFrame::mono(1.0));
    }

    #[test]
    fn loads_int_wav_and_duplicates_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("click.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for s in [0i16, 16384, -16384, 0] {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = SampleBuffer::load_wav(&path, 44_100).unwrap();
        assert_eq!(buffer.len(), 4);
        assert!((buffer.data[1].left - 0.5).abs() < 1e-4);
        assert_eq!(buffer.data[2].left, buffer.data[2].right);
    }
}
