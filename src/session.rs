//! Session lifecycle
//!
//! `Instructions -> Calibrating -> Monitoring -> Ended`, with `reset` taking an
//! ended session back to `Instructions`. Timers are host-driven: the host calls
//! `tick` with the generation it was armed for, and a tick for a cancelled or
//! superseded session does nothing.

use chrono::{DateTime, Utc};

use crate::config::DURATION_TICK_MS;
use crate::error::PulseError;
use crate::types::{Millis, Phase, SessionGeneration};

/// Timer state armed by `start` and disarmed by `stop`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SessionTimer {
    generation: SessionGeneration,
    started_at_ms: Millis,
    monitoring_at_ms: Millis,
}

/// Timing of a session that has just been stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoppedSession {
    pub generation: SessionGeneration,
    pub started_at: DateTime<Utc>,
    pub duration_secs: u32,
}

#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: Phase,
    generation: SessionGeneration,
    timer: Option<SessionTimer>,
    started_at: Option<DateTime<Utc>>,
    duration_secs: u32,
    warmup_ms: u64,
}

impl SessionStateMachine {
    pub fn new(warmup_ms: u64) -> Self {
        Self {
            phase: Phase::Instructions,
            generation: SessionGeneration::default(),
            timer: None,
            started_at: None,
            duration_secs: 0,
            warmup_ms,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> SessionGeneration {
        self.generation
    }

    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Whether a callback tagged with `generation` may mutate state
    pub fn accepts(&self, generation: SessionGeneration) -> bool {
        generation == self.generation && self.phase.accepts_samples()
    }

    /// Begin a session and arm the duration and warm-up timers.
    ///
    /// Starting an already running session returns its generation unchanged.
    pub fn start(&mut self, now: Millis, started_at: DateTime<Utc>) -> Result<SessionGeneration, PulseError> {
        match self.phase {
            Phase::Calibrating | Phase::Monitoring => return Ok(self.generation),
            Phase::Ended => {
                return Err(PulseError::InvalidTransition {
                    action: "start",
                    phase: self.phase,
                })
            }
            Phase::Instructions => {}
        }

        self.generation = self.generation.next();
        self.phase = Phase::Calibrating;
        self.duration_secs = 0;
        self.started_at = Some(started_at);
        self.timer = Some(SessionTimer {
            generation: self.generation,
            started_at_ms: now,
            monitoring_at_ms: now.saturating_add(self.warmup_ms),
        });

        tracing::info!(generation = %self.generation, "Session started");
        Ok(self.generation)
    }

    /// Advance the armed timers; returns true when phase or duration changed
    pub fn tick(&mut self, generation: SessionGeneration, now: Millis) -> bool {
        let timer = match self.timer {
            Some(timer) if timer.generation == generation => timer,
            _ => return false,
        };

        let mut changed = false;
        let elapsed = Self::elapsed_secs(&timer, now);
        if elapsed != self.duration_secs {
            self.duration_secs = elapsed;
            changed = true;
        }

        if self.phase == Phase::Calibrating && now >= timer.monitoring_at_ms {
            self.phase = Phase::Monitoring;
            tracing::debug!(generation = %generation, "Warm-up finished, monitoring");
            changed = true;
        }
        changed
    }

    /// End the running session.
    ///
    /// Timers are disarmed before this returns. Stopping when no session is
    /// running is a no-op.
    pub fn stop(&mut self, now: Millis) -> Option<StoppedSession> {
        if !self.phase.accepts_samples() {
            return None;
        }
        if let Some(timer) = self.timer.take() {
            self.duration_secs = Self::elapsed_secs(&timer, now);
        }
        self.phase = Phase::Ended;

        tracing::info!(
            generation = %self.generation,
            duration_secs = self.duration_secs,
            "Session stopped"
        );

        Some(StoppedSession {
            generation: self.generation,
            started_at: self.started_at.unwrap_or_else(Utc::now),
            duration_secs: self.duration_secs,
        })
    }

    /// Return to the instructions screen after a session has ended
    pub fn reset(&mut self) -> Result<(), PulseError> {
        match self.phase {
            Phase::Calibrating | Phase::Monitoring => Err(PulseError::InvalidTransition {
                action: "reset",
                phase: self.phase,
            }),
            Phase::Instructions | Phase::Ended => {
                self.phase = Phase::Instructions;
                self.timer = None;
                self.duration_secs = 0;
                self.started_at = None;
                Ok(())
            }
        }
    }

    fn elapsed_secs(timer: &SessionTimer, now: Millis) -> u32 {
        let ticks = now.saturating_sub(timer.started_at_ms) / DURATION_TICK_MS;
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> SessionStateMachine {
        SessionStateMachine::new(5000)
    }

    #[test]
    fn test_full_lifecycle() {
        let mut sm = machine();
        assert_eq!(sm.phase(), Phase::Instructions);

        let generation = sm.start(1_000, Utc::now()).unwrap();
        assert_eq!(sm.phase(), Phase::Calibrating);
        assert!(sm.accepts(generation));

        assert!(sm.tick(generation, 2_000));
        assert_eq!(sm.duration_secs(), 1);
        assert_eq!(sm.phase(), Phase::Calibrating);

        sm.tick(generation, 6_000);
        assert_eq!(sm.phase(), Phase::Monitoring);
        assert_eq!(sm.duration_secs(), 5);

        let stopped = sm.stop(13_500).unwrap();
        assert_eq!(stopped.duration_secs, 12);
        assert_eq!(sm.phase(), Phase::Ended);
        assert!(!sm.accepts(generation));

        sm.reset().unwrap();
        assert_eq!(sm.phase(), Phase::Instructions);
        assert_eq!(sm.duration_secs(), 0);
    }

    #[test]
    fn test_tick_is_idempotent_within_second() {
        let mut sm = machine();
        let generation = sm.start(0, Utc::now()).unwrap();
        assert!(!sm.tick(generation, 16));
        assert!(!sm.tick(generation, 999));
        assert!(sm.tick(generation, 1000));
    }

    #[test]
    fn test_stop_disarms_timers() {
        let mut sm = machine();
        let generation = sm.start(0, Utc::now()).unwrap();
        sm.stop(1_000);
        assert!(!sm.tick(generation, 10_000));
        assert_eq!(sm.phase(), Phase::Ended);
        assert_eq!(sm.duration_secs(), 1);
    }

    #[test]
    fn test_stale_generation_ignored() {
        let mut sm = machine();
        let old = sm.start(0, Utc::now()).unwrap();
        sm.stop(500);
        sm.reset().unwrap();
        let new = sm.start(1_000, Utc::now()).unwrap();
        assert_ne!(old, new);

        assert!(!sm.accepts(old));
        assert!(!sm.tick(old, 9_000));
        assert_eq!(sm.phase(), Phase::Calibrating);
        assert!(sm.accepts(new));
    }

    #[test]
    fn test_start_is_idempotent_while_running() {
        let mut sm = machine();
        let first = sm.start(0, Utc::now()).unwrap();
        let again = sm.start(3_000, Utc::now()).unwrap();
        assert_eq!(first, again);
        sm.tick(first, 5_000);
        assert_eq!(sm.phase(), Phase::Monitoring);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut sm = machine();
        assert!(sm.stop(0).is_none());
        assert_eq!(sm.phase(), Phase::Instructions);

        sm.start(0, Utc::now()).unwrap();
        assert!(matches!(
            sm.reset(),
            Err(PulseError::InvalidTransition { action: "reset", .. })
        ));

        sm.stop(100);
        assert!(matches!(
            sm.start(200, Utc::now()),
            Err(PulseError::InvalidTransition { action: "start", phase: Phase::Ended })
        ));
        assert!(sm.stop(300).is_none());
    }
}
