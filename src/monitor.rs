//! Monitor orchestration
//!
//! `PulseMonitor` is the single mutation path of the crate. The host feeds it sensor
//! callbacks, lifecycle commands and periodic ticks, each tagged with the session
//! generation it was issued for. After every mutation the monitor publishes an
//! immutable `Arc<SessionSnapshot>` to its observers.
//!
//! Data flow per optical sample:
//! 1. SignalConditioner - finger gate, buffering, moving average
//! 2. CalibrationGate - holds detection while the signal settles
//! 3. PeakDetector - slope sign change with amplitude and refractory gating
//! 4. FeedbackScheduler - visual pulse and throttled haptic

use chrono::{DateTime, Utc};
use std::sync::{mpsc, Arc, Mutex};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::aggregator::BpmAggregator;
use crate::calibration::{BeatIntervalEstimator, CalibrationGate};
use crate::conditioner::{ConditionedSample, SignalConditioner};
use crate::config::{parse_age, MonitorConfig, BPM_HISTORY_CAPACITY};
use crate::error::PulseError;
use crate::feedback::FeedbackScheduler;
use crate::peak::PeakDetector;
use crate::session::SessionStateMachine;
use crate::storage::{MemorySessionStore, SessionStore, StorageError};
use crate::types::{
    FeedbackAction, FinishedSession, Millis, Phase, SensorAvailability, SessionGeneration,
    SessionSnapshot, SignalStatus,
};
use crate::zones::ZoneTable;

/// Receiver of published snapshots
pub trait SnapshotObserver: Send {
    fn publish(&self, snapshot: Arc<SessionSnapshot>);
}

impl SnapshotObserver for mpsc::Sender<Arc<SessionSnapshot>> {
    fn publish(&self, snapshot: Arc<SessionSnapshot>) {
        // A dropped receiver just means nobody is watching any more
        let _ = self.send(snapshot);
    }
}

/// Latest-value holder that can be shared with reader threads
#[derive(Debug, Clone, Default)]
pub struct SnapshotCell {
    inner: Arc<Mutex<Arc<SessionSnapshot>>>,
}

impl SnapshotCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Arc<SessionSnapshot> {
        match self.inner.lock() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }
}

impl SnapshotObserver for SnapshotCell {
    fn publish(&self, snapshot: Arc<SessionSnapshot>) {
        match self.inner.lock() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}

/// What happened to the session record on `stop`
#[derive(Debug)]
pub enum StopOutcome {
    /// Too short or no complete statistics; nothing handed to storage
    NotRecorded { duration_secs: u32 },
    /// Record persisted
    Saved(FinishedSession),
    /// Storage rejected the record; the session still ended
    SaveFailed {
        record: FinishedSession,
        error: StorageError,
    },
}

impl StopOutcome {
    pub fn record(&self) -> Option<&FinishedSession> {
        match self {
            StopOutcome::NotRecorded { .. } => None,
            StopOutcome::Saved(record) | StopOutcome::SaveFailed { record, .. } => Some(record),
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, StopOutcome::Saved(_))
    }
}

/// Stateful heart monitor for one device
pub struct PulseMonitor {
    config: MonitorConfig,
    availability: SensorAvailability,
    user_age: u32,
    conditioner: SignalConditioner,
    gate: CalibrationGate,
    detector: PeakDetector,
    aggregator: BpmAggregator,
    feedback: FeedbackScheduler,
    session: SessionStateMachine,
    signal: SignalStatus,
    store: Box<dyn SessionStore>,
    observers: Vec<Box<dyn SnapshotObserver>>,
    snapshot: Arc<SessionSnapshot>,
    last_now: Millis,
}

impl PulseMonitor {
    /// Create a monitor persisting finished sessions into `store`
    pub fn new(config: MonitorConfig, store: Box<dyn SessionStore>) -> Self {
        let estimator =
            BeatIntervalEstimator::new(config.beat_interval, config.default_beat_interval_ms);
        let mut monitor = Self {
            availability: SensorAvailability::ALL,
            user_age: config.user_age,
            conditioner: SignalConditioner::new(config.finger_threshold),
            gate: CalibrationGate::new(config.calibration_ms, estimator),
            detector: PeakDetector::new(config.min_signal_amplitude, config.min_peak_interval_ms),
            aggregator: BpmAggregator::new(BPM_HISTORY_CAPACITY),
            feedback: FeedbackScheduler::new(config.pulse_clear_ms, config.haptic_factor),
            session: SessionStateMachine::new(config.warmup_ms),
            signal: SignalStatus::NoFinger,
            store,
            observers: Vec::new(),
            snapshot: Arc::new(SessionSnapshot::default()),
            last_now: 0,
            config,
        };
        monitor.snapshot = Arc::new(monitor.build_snapshot());
        monitor
    }

    /// Create a monitor with an in-memory store
    pub fn with_memory_store(config: MonitorConfig) -> Self {
        Self::new(config, Box::new(MemorySessionStore::new()))
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn generation(&self) -> SessionGeneration {
        self.session.generation()
    }

    pub fn user_age(&self) -> u32 {
        self.user_age
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<SessionSnapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Register an observer; it immediately receives the current snapshot
    pub fn subscribe(&mut self, observer: Box<dyn SnapshotObserver>) {
        observer.publish(self.snapshot());
        self.observers.push(observer);
    }

    /// Record which sensors the host managed to register
    pub fn set_availability(&mut self, availability: SensorAvailability) {
        self.availability = availability;
    }

    /// Start a session stamped with the current wall-clock time
    pub fn start(&mut self, now: Millis) -> Result<SessionGeneration, PulseError> {
        self.start_at(now, Utc::now())
    }

    /// Start a session with an explicit wall-clock start time.
    ///
    /// Fails with `MissingSensor` when either channel is unavailable; the phase then
    /// stays `Instructions`.
    pub fn start_at(
        &mut self,
        now: Millis,
        started_at: DateTime<Utc>,
    ) -> Result<SessionGeneration, PulseError> {
        let phase = self.session.phase();
        if phase == Phase::Instructions && !self.availability.is_complete() {
            let missing = self.missing_sensors();
            warn!(missing = %missing, "Cannot start session");
            return Err(PulseError::MissingSensor(missing));
        }

        let generation = self.session.start(now, started_at)?;
        if !phase.accepts_samples() {
            self.clear_acquisition();
            self.feedback.reset();
        }
        self.last_now = now;
        self.publish();
        Ok(generation)
    }

    /// Process one raw optical sample.
    ///
    /// Returns the feedback to perform when a pulse was detected.
    pub fn on_ppg_sample(
        &mut self,
        generation: SessionGeneration,
        raw_value: f64,
        now: Millis,
    ) -> Option<FeedbackAction> {
        if !self.session.accepts(generation) {
            trace!(generation = %generation, "Dropping optical sample for inactive session");
            return None;
        }
        self.last_now = now;

        let mut action = None;
        match self.conditioner.push(raw_value) {
            ConditionedSample::FingerAbsent { had_signal } => {
                if had_signal {
                    debug!("Finger removed, resetting acquisition");
                    self.reset_acquisition();
                }
                self.signal = SignalStatus::NoFinger;
            }
            ConditionedSample::Buffering => {
                self.gate.tick(now);
                self.signal = self.acquiring_status();
            }
            ConditionedSample::Smoothed(_) => {
                let calibrating = self.gate.tick(now);
                if !calibrating && self.session.phase() == Phase::Monitoring {
                    if let Some(event) = self.detector.evaluate(self.conditioner.smoothed(), now) {
                        let feedback =
                            self.feedback
                                .on_pulse(&event, self.gate.beat_interval_ms(), now);
                        trace!(at_ms = event.at_ms, haptic = feedback.haptic, "Pulse detected");
                        action = Some(feedback);
                    }
                }
                self.signal = self.acquiring_status();
            }
        }

        self.publish();
        action
    }

    /// Process one discrete BPM reading; non-positive readings are ignored
    pub fn on_bpm_reading(&mut self, generation: SessionGeneration, bpm: i64, now: Millis) {
        if !self.session.accepts(generation) {
            trace!(generation = %generation, "Dropping BPM reading for inactive session");
            return;
        }
        let Some(accepted) = self.aggregator.record(bpm) else {
            trace!(bpm, "Ignoring non-positive BPM reading");
            return;
        };
        self.gate.on_bpm(accepted);
        self.last_now = now;
        self.publish();
    }

    /// Drive the duration timer, the warm-up transition and the pulse auto-clear.
    ///
    /// Returns true when a new snapshot was published.
    pub fn tick(&mut self, generation: SessionGeneration, now: Millis) -> bool {
        if !self.session.accepts(generation) {
            return false;
        }
        self.last_now = now;

        let timers_changed = self.session.tick(generation, now);
        let pulse_cleared = self.snapshot.is_pulsing && !self.feedback.is_pulsing(now);
        if timers_changed || pulse_cleared {
            self.publish();
            return true;
        }
        false
    }

    /// End the running session.
    ///
    /// Timers are disarmed before the record is built. A qualifying record is handed
    /// to storage once; a storage failure is logged and reported but the session
    /// ends regardless. Returns `None` when no session was running.
    pub fn stop(&mut self, now: Millis) -> Option<StopOutcome> {
        let stopped = self.session.stop(now)?;
        self.last_now = now;
        self.feedback.reset();

        let stats = self.aggregator.stats();
        let outcome = match FinishedSession::qualify(
            stopped.started_at,
            stopped.duration_secs,
            &stats,
            self.config.min_session_secs,
        ) {
            None => {
                info!(
                    duration_secs = stopped.duration_secs,
                    "Session not recorded (too short or no readings)"
                );
                StopOutcome::NotRecorded {
                    duration_secs: stopped.duration_secs,
                }
            }
            Some(record) => match self.store.save(&record) {
                Ok(()) => {
                    info!(id = %record.id, avg_bpm = record.avg_bpm, "Session saved");
                    StopOutcome::Saved(record)
                }
                Err(error) => {
                    warn!(id = %record.id, error = %error, "Failed to save session");
                    StopOutcome::SaveFailed { record, error }
                }
            },
        };

        self.publish();
        Some(outcome)
    }

    /// Return to the instructions screen, discarding all acquisition state
    pub fn reset_to_instructions(&mut self) -> Result<(), PulseError> {
        self.session.reset()?;
        self.clear_acquisition();
        self.feedback.reset();
        self.publish();
        Ok(())
    }

    /// Set the age used for zone classification; zero is ignored
    pub fn set_user_age(&mut self, age: u32) {
        if age == 0 {
            return;
        }
        self.user_age = age;
        self.publish();
    }

    /// Set the age from user text; returns false when the text was ignored
    pub fn set_user_age_text(&mut self, input: &str) -> bool {
        match parse_age(input) {
            Some(age) => {
                self.set_user_age(age);
                true
            }
            None => {
                debug!(input, "Ignoring unparsable age");
                false
            }
        }
    }

    /// Stored sessions, newest first
    pub fn history(&self) -> Result<Vec<FinishedSession>, StorageError> {
        self.store.list()
    }

    pub fn delete_session(&mut self, id: Uuid) -> Result<bool, StorageError> {
        self.store.delete(id)
    }

    fn acquiring_status(&self) -> SignalStatus {
        if self.gate.is_calibrating() {
            SignalStatus::Calibrating
        } else {
            SignalStatus::Reading
        }
    }

    /// Signal lost: buffers, calibration, tracking and BPM history start over
    fn reset_acquisition(&mut self) {
        self.conditioner.clear();
        self.gate.restart();
        self.detector.reset();
        self.aggregator.clear();
    }

    fn clear_acquisition(&mut self) {
        self.conditioner.clear();
        self.gate.reset();
        self.detector.reset();
        self.aggregator.clear();
        self.signal = SignalStatus::NoFinger;
    }

    fn missing_sensors(&self) -> String {
        let mut missing = Vec::new();
        if !self.availability.optical {
            missing.push("optical");
        }
        if !self.availability.bpm {
            missing.push("heart rate");
        }
        missing.join(", ")
    }

    fn build_snapshot(&self) -> SessionSnapshot {
        let stats = self.aggregator.stats();
        let current_bpm = self.aggregator.latest();

        SessionSnapshot {
            generation: self.session.generation(),
            phase: self.session.phase(),
            heart_rate: current_bpm.map_or_else(|| "0".to_string(), |bpm| bpm.to_string()),
            current_bpm,
            is_pulsing: self.feedback.is_pulsing(self.last_now),
            min_bpm: stats.min,
            max_bpm: stats.max,
            avg_bpm: stats.avg,
            session_duration_secs: self.session.duration_secs(),
            smoothed: self.conditioner.smoothed().to_vec(),
            zone: current_bpm.and_then(|bpm| ZoneTable::classify(self.user_age, bpm)),
            signal: self.signal,
            beat_interval_ms: self.gate.beat_interval_ms(),
        }
    }

    fn publish(&mut self) {
        let snapshot = Arc::new(self.build_snapshot());
        self.snapshot = Arc::clone(&snapshot);
        for observer in &self.observers {
            observer.publish(Arc::clone(&snapshot));
        }
    }
}

impl std::fmt::Debug for PulseMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PulseMonitor")
            .field("phase", &self.session.phase())
            .field("generation", &self.session.generation())
            .field("user_age", &self.user_age)
            .field("observers", &self.observers.len())
            .finish()
    }
}
