//! BPM aggregation
//!
//! This module keeps the rolling history of discrete BPM readings and derives the
//! min/max/average shown during a session and stored with it afterwards.

use serde::{Deserialize, Serialize};

use crate::config::BPM_HISTORY_CAPACITY;
use crate::types::BpmStats;
use crate::window::RollingWindow;

/// Rolling store of accepted BPM readings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BpmAggregator {
    history: RollingWindow<u32>,
    latest: Option<u32>,
}

impl Default for BpmAggregator {
    fn default() -> Self {
        Self::new(BPM_HISTORY_CAPACITY)
    }
}

impl BpmAggregator {
    /// Create an aggregator with the given history capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            history: RollingWindow::new(capacity),
            latest: None,
        }
    }

    /// Record a reading; non-positive values are rejected.
    ///
    /// Returns the accepted value.
    pub fn record(&mut self, bpm: i64) -> Option<u32> {
        if bpm <= 0 {
            return None;
        }
        let bpm = u32::try_from(bpm).ok()?;
        self.history.push(bpm);
        self.latest = Some(bpm);
        Some(bpm)
    }

    /// Min, max and rounded mean over the live history
    pub fn stats(&self) -> BpmStats {
        if self.history.is_empty() {
            return BpmStats::default();
        }
        let min = self.history.iter().copied().min();
        let max = self.history.iter().copied().max();
        let sum: u64 = self.history.iter().map(|v| *v as u64).sum();
        let avg = (sum as f64 / self.history.len() as f64).round() as u32;

        BpmStats {
            min,
            max,
            avg: Some(avg),
        }
    }

    /// Most recent accepted reading
    pub fn latest(&self) -> Option<u32> {
        self.latest
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.latest = None;
    }
}
