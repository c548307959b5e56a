//! Calibration gate and beat-interval estimation
//!
//! The gate holds the peak detector off for a fixed window after the first valid
//! sample, while the signal settles. BPM readings feed the beat-interval estimate
//! used to pace haptic feedback; the estimate never gates detection.

use crate::config::BeatIntervalMode;
use crate::types::Millis;

const MS_PER_MINUTE: f64 = 60_000.0;

/// Estimated time between beats, derived from the discrete BPM channel
#[derive(Debug, Clone)]
pub struct BeatIntervalEstimator {
    mode: BeatIntervalMode,
    default_ms: u64,
    interval_ms: f64,
    seeded: bool,
}

impl BeatIntervalEstimator {
    pub fn new(mode: BeatIntervalMode, default_ms: u64) -> Self {
        Self {
            mode,
            default_ms,
            interval_ms: default_ms as f64,
            seeded: false,
        }
    }

    /// Fold in a BPM reading.
    ///
    /// In `Fixed` mode only readings that arrive while `calibrating` count; the last
    /// one wins. In `Ema` mode the first reading seeds the average and every later
    /// reading is blended in with weight `alpha`.
    pub fn observe(&mut self, bpm: u32, calibrating: bool) {
        if bpm == 0 {
            return;
        }
        let sample = MS_PER_MINUTE / bpm as f64;

        match self.mode {
            BeatIntervalMode::Fixed => {
                if calibrating {
                    self.interval_ms = sample.floor();
                    self.seeded = true;
                }
            }
            BeatIntervalMode::Ema { alpha } => {
                if self.seeded {
                    self.interval_ms = alpha * sample + (1.0 - alpha) * self.interval_ms;
                } else {
                    self.interval_ms = sample;
                    self.seeded = true;
                }
            }
        }
    }

    /// Current estimate in whole milliseconds
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms.round() as u64
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    pub fn reset(&mut self) {
        self.interval_ms = self.default_ms as f64;
        self.seeded = false;
    }
}

/// Warm-up window measured from the first valid sample after a reset
#[derive(Debug, Clone)]
pub struct CalibrationGate {
    duration_ms: u64,
    started_at: Option<Millis>,
    calibrating: bool,
    estimator: BeatIntervalEstimator,
}

impl CalibrationGate {
    pub fn new(duration_ms: u64, estimator: BeatIntervalEstimator) -> Self {
        Self {
            duration_ms,
            started_at: None,
            calibrating: true,
            estimator,
        }
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    /// Advance the gate on a valid sample; returns whether it still holds.
    ///
    /// The first call after a reset records the start time.
    pub fn tick(&mut self, now: Millis) -> bool {
        if !self.calibrating {
            return false;
        }
        let started = *self.started_at.get_or_insert(now);
        if now.saturating_sub(started) >= self.duration_ms {
            self.calibrating = false;
            tracing::debug!(elapsed_ms = now.saturating_sub(started), "Calibration complete");
        }
        self.calibrating
    }

    /// Route a discrete BPM reading into the beat-interval estimate
    pub fn on_bpm(&mut self, bpm: u32) {
        self.estimator.observe(bpm, self.calibrating);
    }

    pub fn beat_interval_ms(&self) -> u64 {
        self.estimator.interval_ms()
    }

    pub fn started_at(&self) -> Option<Millis> {
        self.started_at
    }

    /// Re-arm calibration after signal loss; the beat interval is kept
    pub fn restart(&mut self) {
        self.started_at = None;
        self.calibrating = true;
    }

    /// Full reset for a new session
    pub fn reset(&mut self) {
        self.restart();
        self.estimator.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate(duration_ms: u64, mode: BeatIntervalMode) -> CalibrationGate {
        CalibrationGate::new(duration_ms, BeatIntervalEstimator::new(mode, 600))
    }

    #[test]
    fn test_gate_holds_for_duration() {
        let mut gate = gate(5000, BeatIntervalMode::Fixed);
        assert!(gate.is_calibrating());
        assert!(gate.tick(1_000));
        assert_eq!(gate.started_at(), Some(1_000));
        assert!(gate.tick(5_999));
        assert!(!gate.tick(6_000));
        assert!(!gate.is_calibrating());
    }

    #[test]
    fn test_restart_rearms_window() {
        let mut gate = gate(1000, BeatIntervalMode::Fixed);
        gate.tick(0);
        gate.tick(1500);
        assert!(!gate.is_calibrating());

        gate.restart();
        assert!(gate.is_calibrating());
        assert!(gate.tick(10_000));
        assert!(!gate.tick(11_000));
    }

    #[test]
    fn test_fixed_interval_seeded_only_while_calibrating() {
        let mut gate = gate(1000, BeatIntervalMode::Fixed);
        assert_eq!(gate.beat_interval_ms(), 600);

        gate.on_bpm(75);
        assert_eq!(gate.beat_interval_ms(), 800);

        gate.tick(0);
        gate.tick(2000);
        gate.on_bpm(120);
        assert_eq!(gate.beat_interval_ms(), 800);
    }

    #[test]
    fn test_fixed_interval_truncates() {
        let mut estimator = BeatIntervalEstimator::new(BeatIntervalMode::Fixed, 600);
        estimator.observe(70, true);
        // 60000 / 70 = 857.14
        assert_eq!(estimator.interval_ms(), 857);
    }

    #[test]
    fn test_ema_interval_tracks_every_reading() {
        let mut gate = gate(1000, BeatIntervalMode::Ema { alpha: 0.5 });
        gate.tick(0);
        gate.tick(2000);
        assert!(!gate.is_calibrating());

        gate.on_bpm(60);
        assert_eq!(gate.beat_interval_ms(), 1000);
        gate.on_bpm(120);
        assert_eq!(gate.beat_interval_ms(), 750);
    }

    #[test]
    fn test_reset_restores_default_interval() {
        let mut gate = gate(1000, BeatIntervalMode::Fixed);
        gate.on_bpm(100);
        assert_eq!(gate.beat_interval_ms(), 600);
        gate.on_bpm(50);
        assert_eq!(gate.beat_interval_ms(), 1200);

        gate.restart();
        assert_eq!(gate.beat_interval_ms(), 1200);

        gate.reset();
        assert_eq!(gate.beat_interval_ms(), 600);
    }
}
