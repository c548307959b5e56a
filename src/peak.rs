//! Peak detection over the smoothed PPG series
//!
//! A pulse is declared where the smoothed signal turns from rising to falling,
//! provided the series has enough swing to be a real pulse wave and the refractory
//! interval since the previous pulse has passed.

use crate::config::MIN_DETECTION_SAMPLES;
use crate::types::{Millis, PulseEvent};
use crate::window::RollingWindow;

/// Slope-sign-change detector with amplitude gating and a refractory interval
#[derive(Debug, Clone)]
pub struct PeakDetector {
    min_amplitude: f64,
    min_interval_ms: u64,
    rising: bool,
    previous: f64,
    last_peak_at: Option<Millis>,
}

impl PeakDetector {
    /// Tracking starts from a previous value of zero, so the first evaluated sample
    /// always counts as rising; if detection begins on a falling slope the next
    /// sample can declare a peak.
    pub fn new(min_amplitude: f64, min_interval_ms: u64) -> Self {
        Self {
            min_amplitude,
            min_interval_ms,
            rising: false,
            previous: 0.0,
            last_peak_at: None,
        }
    }

    /// Evaluate the newest smoothed sample.
    ///
    /// Callers must only invoke this once calibration has finished. With fewer than
    /// `MIN_DETECTION_SAMPLES + 1` samples, or a flat series, nothing is tracked and
    /// the rising/previous state stays frozen until a usable signal returns.
    pub fn evaluate(&mut self, smoothed: &RollingWindow<f64>, now: Millis) -> Option<PulseEvent> {
        if smoothed.len() <= MIN_DETECTION_SAMPLES {
            return None;
        }
        let amplitude = smoothed.spread()?;
        if amplitude <= self.min_amplitude {
            return None;
        }
        let current = *smoothed.last()?;

        let mut event = None;
        if self.rising && current < self.previous && self.refractory_elapsed(now) {
            self.last_peak_at = Some(now);
            event = Some(PulseEvent {
                at_ms: now,
                smoothed_value: current,
            });
        }

        self.rising = current > self.previous;
        self.previous = current;
        event
    }

    fn refractory_elapsed(&self, now: Millis) -> bool {
        match self.last_peak_at {
            Some(last) => now.saturating_sub(last) >= self.min_interval_ms,
            None => true,
        }
    }

    pub fn last_peak_at(&self) -> Option<Millis> {
        self.last_peak_at
    }

    pub fn reset(&mut self) {
        self.rising = false;
        self.previous = 0.0;
        self.last_peak_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SMOOTHED_BUFFER_CAPACITY;

    const BASE: f64 = 120_000.0;
    const STEP: f64 = 200.0;
    const SAMPLE_MS: u64 = 20;

    fn detector() -> PeakDetector {
        PeakDetector::new(2000.0, 300)
    }

    /// Feed values one by one, returning the indices where a pulse fired
    fn run(detector: &mut PeakDetector, values: &[f64], start_ms: u64) -> Vec<usize> {
        let mut window = RollingWindow::new(SMOOTHED_BUFFER_CAPACITY);
        let mut fired = Vec::new();
        for (i, v) in values.iter().enumerate() {
            window.push(*v);
            if detector
                .evaluate(&window, start_ms + i as u64 * SAMPLE_MS)
                .is_some()
            {
                fired.push(i);
            }
        }
        fired
    }

    fn rise_then_fall(n: usize) -> Vec<f64> {
        let rise = (0..n).map(|i| BASE + STEP * i as f64);
        let top = BASE + STEP * (n - 1) as f64;
        let fall = (1..=n).map(move |i| top - STEP * i as f64);
        rise.chain(fall).collect()
    }

    #[test]
    fn test_single_peak_at_inflection() {
        let values = rise_then_fall(25);
        let mut detector = detector();
        let fired = run(&mut detector, &values, 0);
        // index 25 is the first falling sample
        assert_eq!(fired, vec![25]);
        assert_eq!(detector.last_peak_at(), Some(25 * SAMPLE_MS));
    }

    #[test]
    fn test_flat_signal_never_fires() {
        let values: Vec<f64> = (0..60)
            .map(|i| BASE + if i % 2 == 0 { 0.0 } else { 500.0 })
            .collect();
        let mut detector = detector();
        assert!(run(&mut detector, &values, 0).is_empty());
    }

    #[test]
    fn test_short_series_is_ignored() {
        let mut detector = detector();
        let mut window = RollingWindow::new(SMOOTHED_BUFFER_CAPACITY);
        for i in 0..MIN_DETECTION_SAMPLES {
            window.push(BASE + 5000.0 * (i % 2) as f64);
            assert!(detector.evaluate(&window, i as u64 * 100).is_none());
        }
    }

    #[test]
    fn test_low_amplitude_freezes_tracking() {
        let mut detector = detector();
        let mut window = RollingWindow::new(SMOOTHED_BUFFER_CAPACITY);
        for _ in 0..30 {
            window.push(BASE);
            detector.evaluate(&window, 0);
        }
        assert!(!detector.rising);
        assert_eq!(detector.previous, 0.0);
    }

    fn two_peaks(gap_samples: usize) -> Vec<f64> {
        // 21-sample ramp so detection is live, then two narrow peaks
        let mut values: Vec<f64> = (0..21).map(|i| BASE + STEP * i as f64).collect();
        let top = *values.last().unwrap();
        values.push(top - 3000.0);
        for _ in 0..gap_samples.saturating_sub(2) {
            values.push(top - 3000.0);
        }
        values.push(top);
        values.push(top - 3000.0);
        values
    }

    #[test]
    fn test_refractory_suppresses_close_peaks() {
        // second peak 250 ms after the first: suppressed
        let values = two_peaks(250 / SAMPLE_MS as usize + 1);
        let mut detector = detector();
        let fired = run(&mut detector, &values, 0);
        assert_eq!(fired.len(), 1);
    }

    #[test]
    fn test_refractory_allows_spaced_peaks() {
        let values = two_peaks(350 / SAMPLE_MS as usize + 1);
        let mut detector = detector();
        let fired = run(&mut detector, &values, 0);
        assert_eq!(fired.len(), 2);
        assert!((fired[1] - fired[0]) as u64 * SAMPLE_MS >= 300);
    }

    #[test]
    fn test_first_sample_counts_as_rising() {
        // detection starts on a falling slope: the first drop is reported
        let values: Vec<f64> = (0..25).map(|i| BASE + 5000.0 - STEP * i as f64).collect();
        let mut detector = detector();
        assert_eq!(run(&mut detector, &values, 0), vec![21]);
    }

    #[test]
    fn test_reset_clears_refractory() {
        let values = rise_then_fall(25);
        let mut detector = detector();
        run(&mut detector, &values, 0);
        detector.reset();
        assert_eq!(detector.last_peak_at(), None);
        assert_eq!(run(&mut detector, &values, 0), vec![25]);
    }
}
