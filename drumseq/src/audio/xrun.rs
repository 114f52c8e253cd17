use std::time::Duration;

pub const DEFAULT_XRUN_TOLERANCE: f32 = 1.5;

/// Spots callbacks that arrive later than the buffer period allows. Fed the
/// callback timestamp each period; a gap longer than `tolerance` periods
/// means the previous buffer underran.
#[derive(Clone, Debug)]
pub struct XrunDetector {
    sample_rate: u32,
    tolerance: f64,
    last: Option<(Duration, usize)>, // timestamp and frames of the previous callback
}

impl XrunDetector {
    pub fn new(sample_rate: u32, tolerance: f32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            tolerance: (tolerance as f64).max(1.0),
            last: None,
        }
    }

    pub fn observe(&mut self, at: Duration, frames: usize) -> bool {
        let Some((prev_at, prev_frames)) = self.last.replace((at, frames)) else {
            return false;
        };
        let Some(gap) = at.checked_sub(prev_at) else {
            return false; // clock went backwards, start over
        };
        let period = prev_frames as f64 / self.sample_rate as f64;
        gap.as_secs_f64() > period * self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_time_callbacks_are_fine() {
        let mut d = XrunDetector::new(48_000, 1.5);
        // 480 frames at 48k = 10ms
        assert!(!d.observe(Duration::from_millis(0), 480));
        assert!(!d.observe(Duration::from_millis(10), 480));
        assert!(!d.observe(Duration::from_millis(24), 480));
    }

    #[test]
    fn late_callback_is_an_xrun() {
        let mut d = XrunDetector::new(48_000, 1.5);
        d.observe(Duration::from_millis(0), 480);
        assert!(d.observe(Duration::from_millis(30), 480));
        // back on schedule after that
        assert!(!d.observe(Duration::from_millis(40), 480));
    }

    #[test]
    fn backwards_clock_is_ignored() {
        let mut d = XrunDetector::new(48_000, 1.5);
        d.observe(Duration::from_millis(50), 480);
        assert!(!d.observe(Duration::from_millis(10), 480));
    }
}
