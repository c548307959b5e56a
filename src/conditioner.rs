//! Signal conditioning
//!
//! Raw PPG samples are gated on finger presence, buffered, and smoothed with a
//! trailing moving average. Both buffers are bounded and drop the oldest value.

use crate::config::{
    MOVING_AVERAGE_WINDOW, RAW_BUFFER_CAPACITY, SMOOTHED_BUFFER_CAPACITY,
};
use crate::window::RollingWindow;

/// Result of pushing one raw sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConditionedSample {
    /// Raw level below the finger-presence threshold; `had_signal` is true when
    /// buffered data existed and the caller must reset acquisition state
    FingerAbsent { had_signal: bool },
    /// Sample buffered, not enough history to smooth yet
    Buffering,
    /// New smoothed value appended to the smoothed series
    Smoothed(f64),
}

impl ConditionedSample {
    pub fn smoothed(&self) -> Option<f64> {
        match self {
            ConditionedSample::Smoothed(value) => Some(*value),
            _ => None,
        }
    }
}

/// Raw and smoothed PPG buffers
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    finger_threshold: f64,
    raw: RollingWindow<f64>,
    smoothed: RollingWindow<f64>,
}

impl SignalConditioner {
    pub fn new(finger_threshold: f64) -> Self {
        Self {
            finger_threshold,
            raw: RollingWindow::new(RAW_BUFFER_CAPACITY),
            smoothed: RollingWindow::new(SMOOTHED_BUFFER_CAPACITY),
        }
    }

    /// Push one raw sample.
    ///
    /// A sub-threshold value clears both buffers here; the monitor clears the
    /// calibration gate and BPM history when `had_signal` is set.
    pub fn push(&mut self, raw_value: f64) -> ConditionedSample {
        if raw_value.is_nan() || raw_value < self.finger_threshold {
            let had_signal = !self.raw.is_empty() || !self.smoothed.is_empty();
            self.clear();
            return ConditionedSample::FingerAbsent { had_signal };
        }

        self.raw.push(raw_value);

        match self.raw.trailing_mean(MOVING_AVERAGE_WINDOW) {
            Some(mean) => {
                self.smoothed.push(mean);
                ConditionedSample::Smoothed(mean)
            }
            None => ConditionedSample::Buffering,
        }
    }

    /// Smoothed series, oldest first
    pub fn smoothed(&self) -> &RollingWindow<f64> {
        &self.smoothed
    }

    pub fn raw_len(&self) -> usize {
        self.raw.len()
    }

    pub fn smoothed_len(&self) -> usize {
        self.smoothed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty() && self.smoothed.is_empty()
    }

    pub fn clear(&mut self) {
        self.raw.clear();
        self.smoothed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ON: f64 = 150_000.0;

    #[test]
    fn test_needs_window_before_smoothing() {
        let mut conditioner = SignalConditioner::new(100_000.0);
        for _ in 0..MOVING_AVERAGE_WINDOW - 1 {
            assert_eq!(conditioner.push(ON), ConditionedSample::Buffering);
        }
        assert_eq!(conditioner.push(ON), ConditionedSample::Smoothed(ON));
        assert_eq!(conditioner.smoothed_len(), 1);
    }

    #[test]
    fn test_moving_average_uses_latest_window() {
        let mut conditioner = SignalConditioner::new(100_000.0);
        for v in [200_000.0, 100_000.0, 110_000.0, 120_000.0, 130_000.0, 140_000.0] {
            conditioner.push(v);
        }
        // last five: 100k..140k
        assert_eq!(conditioner.smoothed().last(), Some(&120_000.0));
        assert_eq!(conditioner.smoothed_len(), 2);
    }

    #[test]
    fn test_finger_removal_clears_buffers() {
        let mut conditioner = SignalConditioner::new(100_000.0);
        for _ in 0..10 {
            conditioner.push(ON);
        }
        assert_eq!(
            conditioner.push(99_999.0),
            ConditionedSample::FingerAbsent { had_signal: true }
        );
        assert!(conditioner.is_empty());

        assert_eq!(
            conditioner.push(0.0),
            ConditionedSample::FingerAbsent { had_signal: false }
        );
    }

    #[test]
    fn test_nan_counts_as_absent() {
        let mut conditioner = SignalConditioner::new(100_000.0);
        assert!(matches!(
            conditioner.push(f64::NAN),
            ConditionedSample::FingerAbsent { .. }
        ));
        assert_eq!(conditioner.raw_len(), 0);
    }

    proptest! {
        #[test]
        fn prop_buffers_stay_bounded(samples in prop::collection::vec(0.0f64..400_000.0, 0..600)) {
            let mut conditioner = SignalConditioner::new(100_000.0);
            for sample in samples {
                conditioner.push(sample);
                prop_assert!(conditioner.raw_len() <= RAW_BUFFER_CAPACITY);
                prop_assert!(conditioner.smoothed_len() <= SMOOTHED_BUFFER_CAPACITY);
            }
        }
    }
}
