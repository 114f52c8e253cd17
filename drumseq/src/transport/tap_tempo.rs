use std::time::{Duration, Instant};

use crate::shared::clamp_bpm;

pub const DEFAULT_TAP_WINDOW: usize = 8;
pub const DEFAULT_TAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Turns a run of taps into a tempo. Keeps the last `window` gaps between
/// taps; a pause longer than `timeout` starts a fresh run.
#[derive(Clone, Debug)]
pub struct TapTempo {
    intervals: Vec<f64>, // seconds, oldest first, never longer than window
    window: usize,
    timeout: Duration,
    last_tap: Option<Instant>,
}

impl Default for TapTempo {
    fn default() -> Self {
        Self::new(DEFAULT_TAP_WINDOW, DEFAULT_TAP_TIMEOUT)
    }
}

impl TapTempo {
    pub fn new(window: usize, timeout: Duration) -> Self {
        let window = window.max(1);
        Self {
            intervals: Vec::with_capacity(window),
            window,
            timeout,
            last_tap: None,
        }
    }

    /// Registers a tap at `now`. Returns the tempo once there is at least
    /// one interval to measure.
    pub fn tap(&mut self, now: Instant) -> Option<f32> {
        let previous = self.last_tap.replace(now);
        let gap = now.checked_duration_since(previous?)?;
        if gap > self.timeout || gap.is_zero() {
            self.intervals.clear();
            return None;
        }
        if self.intervals.len() == self.window {
            self.intervals.remove(0);
        }
        self.intervals.push(gap.as_secs_f64());
        self.bpm()
    }

    pub fn bpm(&self) -> Option<f32> {
        if self.intervals.is_empty() {
            return None;
        }
        let mean = self.intervals.iter().sum::<f64>() / self.intervals.len() as f64;
        Some(clamp_bpm((60.0 / mean) as f32))
    }

    pub fn reset(&mut self) {
        self.intervals.clear();
        self.last_tap = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_taps_give_their_tempo() {
        let mut tap = TapTempo::default();
        let t0 = Instant::now();
        assert_eq!(tap.tap(t0), None);
        let mut bpm = None;
        for i in 1..=4 {
            bpm = tap.tap(t0 + Duration::from_millis(500 * i));
        }
        assert!((bpm.unwrap() - 120.0).abs() < 0.01);
    }

    #[test]
    fn window_forgets_old_intervals() {
        let mut tap = TapTempo::new(2, Duration::from_secs(5));
        let t0 = Instant::now();
        tap.tap(t0);
        tap.tap(t0 + Duration::from_secs(1)); // 60 bpm
        tap.tap(t0 + Duration::from_millis(1500));
        let bpm = tap.tap(t0 + Duration::from_millis(2000)).unwrap();
        assert_eq!(tap.intervals.len(), 2);
        assert!((bpm - 120.0).abs() < 0.01);
    }

    #[test]
    fn idle_gap_restarts_the_run() {
        let mut tap = TapTempo::default();
        let t0 = Instant::now();
        tap.tap(t0);
        tap.tap(t0 + Duration::from_millis(400));
        assert_eq!(tap.tap(t0 + Duration::from_secs(10)), None);
        assert_eq!(tap.intervals.len(), 0);
        assert!(tap.tap(t0 + Duration::from_millis(10_500)).is_some());
    }

    #[test]
    fn result_is_clamped() {
        let mut tap = TapTempo::default();
        let t0 = Instant::now();
        tap.tap(t0);
        assert_eq!(tap.tap(t0 + Duration::from_millis(50)), Some(crate::shared::MAX_BPM));
    }
}
