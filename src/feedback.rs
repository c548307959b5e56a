//! Feedback scheduling
//!
//! Every pulse lights the visual indicator; the indicator clears on its own after a
//! short delay. Haptics are throttled separately so a momentarily unstable detector
//! cannot produce a vibration storm.

use crate::types::{FeedbackAction, Millis, PulseEvent};

#[derive(Debug, Clone)]
pub struct FeedbackScheduler {
    pulse_clear_ms: u64,
    haptic_factor: f64,
    pulsing_until: Option<Millis>,
    last_haptic_at: Option<Millis>,
}

impl FeedbackScheduler {
    pub fn new(pulse_clear_ms: u64, haptic_factor: f64) -> Self {
        Self {
            pulse_clear_ms,
            haptic_factor,
            pulsing_until: None,
            last_haptic_at: None,
        }
    }

    /// Decide the feedback for one detected pulse.
    ///
    /// Haptic fires only if at least `haptic_factor * beat_interval_ms` has passed
    /// since the last haptic pulse.
    pub fn on_pulse(&mut self, event: &PulseEvent, beat_interval_ms: u64, now: Millis) -> FeedbackAction {
        self.pulsing_until = Some(event.at_ms.max(now).saturating_add(self.pulse_clear_ms));

        let min_gap = beat_interval_ms as f64 * self.haptic_factor;
        let haptic = match self.last_haptic_at {
            Some(last) => now.saturating_sub(last) as f64 >= min_gap,
            None => true,
        };
        if haptic {
            self.last_haptic_at = Some(now);
        }

        FeedbackAction {
            visual_pulse: true,
            haptic,
        }
    }

    /// Whether the visual indicator is still lit at `now`
    pub fn is_pulsing(&self, now: Millis) -> bool {
        matches!(self.pulsing_until, Some(until) if now < until)
    }

    pub fn last_haptic_at(&self) -> Option<Millis> {
        self.last_haptic_at
    }

    pub fn reset(&mut self) {
        self.pulsing_until = None;
        self.last_haptic_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse(at_ms: Millis) -> PulseEvent {
        PulseEvent {
            at_ms,
            smoothed_value: 0.0,
        }
    }

    #[test]
    fn test_visual_pulse_auto_clears() {
        let mut scheduler = FeedbackScheduler::new(150, 0.8);
        let action = scheduler.on_pulse(&pulse(1000), 600, 1000);
        assert!(action.visual_pulse);
        assert!(scheduler.is_pulsing(1000));
        assert!(scheduler.is_pulsing(1149));
        assert!(!scheduler.is_pulsing(1150));
    }

    #[test]
    fn test_haptic_throttled_by_beat_interval() {
        let mut scheduler = FeedbackScheduler::new(150, 0.8);
        assert!(scheduler.on_pulse(&pulse(1000), 600, 1000).haptic);

        // 0.8 * 600 = 480 ms
        let early = scheduler.on_pulse(&pulse(1400), 600, 1400);
        assert!(early.visual_pulse);
        assert!(!early.haptic);
        assert_eq!(scheduler.last_haptic_at(), Some(1000));

        assert!(scheduler.on_pulse(&pulse(1480), 600, 1480).haptic);
        assert_eq!(scheduler.last_haptic_at(), Some(1480));
    }

    #[test]
    fn test_extreme_timestamps_saturate() {
        let mut scheduler = FeedbackScheduler::new(150, 0.8);
        let action = scheduler.on_pulse(&pulse(Millis::MAX - 10), 600, Millis::MAX - 10);
        assert!(action.visual_pulse);
        assert!(scheduler.is_pulsing(Millis::MAX - 1));
        assert!(!scheduler.is_pulsing(Millis::MAX));
    }

    #[test]
    fn test_reset_allows_immediate_haptic() {
        let mut scheduler = FeedbackScheduler::new(150, 0.8);
        scheduler.on_pulse(&pulse(10), 1000, 10);
        scheduler.reset();
        assert!(!scheduler.is_pulsing(11));
        assert!(scheduler.on_pulse(&pulse(20), 1000, 20).haptic);
    }
}
