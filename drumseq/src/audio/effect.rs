use serde::{Deserialize, Serialize};

use super::frame::StereoFrame;

// What goes in an fx slot. Instruments feed the slots through their send
// levels; the effect itself is built once when the engine starts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EffectSpec {
    Bitcrusher { levels: u32 },
    Distortion { drive: f32 },
}

impl EffectSpec {
    pub fn to_effect(&self) -> Box<dyn Effect> {
        match self {
            EffectSpec::Bitcrusher { levels } => Box::new(Bitcrusher::new(*levels)),
            EffectSpec::Distortion { drive } => Box::new(Distortion::new(*drive)),
        }
    }

    pub fn label(&self) -> String {
        match self {
            EffectSpec::Bitcrusher { levels } => format!("Bitcrush({})", levels),
            EffectSpec::Distortion { drive } => format!("Distortion({})", drive),
        }
    }
}

pub trait Effect: Send {
    fn process(&mut self, buf: &mut [StereoFrame]);
}

pub struct Bitcrusher {
    levels: f32,
}

impl Bitcrusher {
    pub fn new(levels: u32) -> Self {
        Self {
            levels: levels.clamp(2, 65536) as f32,
        }
    }
}

impl Effect for Bitcrusher {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        let scale = (self.levels - 1.0) * 0.5;
        let inv = 1.0 / scale;
        for f in buf.iter_mut() {
            f.left = (f.left.clamp(-1.0, 1.0) * scale).round() * inv;
            f.right = (f.right.clamp(-1.0, 1.0) * scale).round() * inv;
        }
    }
}

pub struct Distortion {
    drive: f32,
}

impl Distortion {
    pub fn new(drive: f32) -> Self {
        Self {
            drive: drive.clamp(0.0, 1.0),
        }
    }
}

impl Effect for Distortion {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        let pre_gain = 1.0 + self.drive * 10.0;
        for f in buf.iter_mut() {
            f.left = (pre_gain * f.left.clamp(-1.0, 1.0)).tanh();
            f.right = (pre_gain * f.right.clamp(-1.0, 1.0)).tanh();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitcrusher_snaps_to_levels() {
        let mut fx = EffectSpec::Bitcrusher { levels: 3 }.to_effect();
        let mut buf = [StereoFrame::mono(0.4), StereoFrame::mono(-0.6)];
        fx.process(&mut buf);
        assert_eq!(buf[0].left, 0.0);
        assert_eq!(buf[1].left, -1.0);
    }

    #[test]
    fn distortion_stays_bounded() {
        let mut fx = Distortion::new(1.0);
        let mut buf = [StereoFrame::mono(0.9), StereoFrame::mono(-5.0)];
        fx.process(&mut buf);
        assert!(buf.iter().all(|f| f.peak() <= 1.0));
        assert!(buf[0].left > 0.9);
    }

    #[test]
    fn spec_reads_from_config_json() {
        let spec: EffectSpec = serde_json::from_str(r#"{"kind":"distortion","drive":0.25}"#).unwrap();
        assert_eq!(spec, EffectSpec::Distortion { drive: 0.25 });
        assert_eq!(spec.label(), "Distortion(0.25)");
    }
}
