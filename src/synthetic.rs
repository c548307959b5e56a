//! Synthetic sensor streams
//!
//! Generates a `pulse.sensor_event.v1` stream for a fingertip on the sensor: a sine
//! pulse wave riding on a finger-present baseline, a BPM reading and a timer tick
//! every second, framed by start and stop commands. Used by the CLI `synth` command,
//! the demo and the integration tests.

use crate::config::DURATION_TICK_MS;
use crate::schema::{AgeValue, Command, SensorEvent};
use crate::types::Millis;

/// Parameters of a generated session
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSession {
    /// Simulated heart rate
    pub bpm: u32,
    /// Time from start to stop
    pub duration_ms: Millis,
    /// Optical sampling period
    pub sample_interval_ms: Millis,
    /// Raw level with a finger on the sensor
    pub baseline: f64,
    /// Pulse wave amplitude (half peak-to-peak)
    pub amplitude: f64,
    /// Age entered before starting
    pub age: Option<u32>,
    /// Window in which the finger is lifted off the sensor
    pub finger_lift: Option<(Millis, Millis)>,
}

impl Default for SyntheticSession {
    fn default() -> Self {
        Self {
            bpm: 72,
            duration_ms: 30_000,
            sample_interval_ms: 20,
            baseline: 150_000.0,
            amplitude: 5_000.0,
            age: None,
            finger_lift: None,
        }
    }
}

impl SyntheticSession {
    pub fn new(bpm: u32, duration_ms: Millis) -> Self {
        Self {
            bpm,
            duration_ms,
            ..Default::default()
        }
    }

    pub fn with_age(mut self, age: u32) -> Self {
        self.age = Some(age);
        self
    }

    pub fn with_finger_lift(mut self, from_ms: Millis, to_ms: Millis) -> Self {
        self.finger_lift = Some((from_ms, to_ms));
        self
    }

    fn finger_on(&self, t_ms: Millis) -> bool {
        !matches!(self.finger_lift, Some((from, to)) if t_ms >= from && t_ms < to)
    }

    /// Raw optical level at `t_ms`
    pub fn value_at(&self, t_ms: Millis) -> f64 {
        if !self.finger_on(t_ms) {
            return 0.0;
        }
        let beats_per_ms = self.bpm.max(1) as f64 / 60_000.0;
        let phase = 2.0 * std::f64::consts::PI * beats_per_ms * t_ms as f64;
        self.baseline + self.amplitude * phase.sin()
    }

    /// The full event stream, in timestamp order
    pub fn events(&self) -> Vec<SensorEvent> {
        let mut events = Vec::new();
        if let Some(age) = self.age {
            events.push(SensorEvent::age(0, AgeValue::Years(age)));
        }
        events.push(SensorEvent::command(0, Command::Start));

        let step = self.sample_interval_ms.max(1);
        let mut t = step;
        let mut next_second = DURATION_TICK_MS;
        while t < self.duration_ms {
            while next_second <= t {
                if self.finger_on(next_second) {
                    events.push(SensorEvent::bpm(next_second, i64::from(self.bpm)));
                }
                events.push(SensorEvent::tick(next_second));
                next_second += DURATION_TICK_MS;
            }
            events.push(SensorEvent::ppg(t, self.value_at(t)));
            t += step;
        }

        events.push(SensorEvent::command(self.duration_ms, Command::Stop));
        events
    }
}
