//! Core types for the Synheart Pulse monitor
//!
//! This module defines the values that cross the host boundary: lifecycle phases,
//! pulse events, BPM statistics, zones, the published snapshot and the finished
//! session record handed to storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Host-supplied monotonic timestamp in milliseconds.
pub type Millis = u64;

/// Session lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Instructions,
    Calibrating,
    Monitoring,
    Ended,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Instructions => "instructions",
            Phase::Calibrating => "calibrating",
            Phase::Monitoring => "monitoring",
            Phase::Ended => "ended",
        }
    }

    /// Whether sensor callbacks are processed in this phase
    pub fn accepts_samples(&self) -> bool {
        matches!(self, Phase::Calibrating | Phase::Monitoring)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of one started session.
///
/// Every sensor callback and timer tick carries the generation it was issued for;
/// anything tagged with a superseded generation is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionGeneration(pub u64);

impl SessionGeneration {
    pub fn next(self) -> Self {
        SessionGeneration(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SessionGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Which sensors the host managed to register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorAvailability {
    /// Raw optical (PPG) channel
    pub optical: bool,
    /// Discrete heart-rate (BPM) channel
    pub bpm: bool,
}

impl SensorAvailability {
    pub const ALL: SensorAvailability = SensorAvailability {
        optical: true,
        bpm: true,
    };

    pub fn is_complete(&self) -> bool {
        self.optical && self.bpm
    }
}

impl Default for SensorAvailability {
    fn default() -> Self {
        Self::ALL
    }
}

/// A heartbeat detected in the optical signal
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulseEvent {
    /// Detection time
    pub at_ms: Millis,
    /// Smoothed value of the sample on which the peak was declared
    pub smoothed_value: f64,
}

/// What the host should do in response to a pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeedbackAction {
    /// Show the short-lived pulsing indicator
    pub visual_pulse: bool,
    /// Fire the vibration driver
    pub haptic: bool,
}

/// Rolling BPM statistics; all fields are absent when no reading is held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BpmStats {
    pub min: Option<u32>,
    pub max: Option<u32>,
    pub avg: Option<u32>,
}

impl BpmStats {
    pub fn is_complete(&self) -> bool {
        self.min.is_some() && self.max.is_some() && self.avg.is_some()
    }
}

/// Heart-rate zone name, ordered from lowest to highest intensity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneName {
    Resting,
    Light,
    Moderate,
    Hard,
    Maximum,
}

impl ZoneName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ZoneName::Resting => "Resting",
            ZoneName::Light => "Light",
            ZoneName::Moderate => "Moderate",
            ZoneName::Hard => "Hard",
            ZoneName::Maximum => "Maximum",
        }
    }
}

impl fmt::Display for ZoneName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RGB display color for a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Build from a `0xRRGGBB` literal
    pub const fn from_rgb(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as u8,
            g: ((hex >> 8) & 0xFF) as u8,
            b: (hex & 0xFF) as u8,
        }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// A classified heart-rate zone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub name: ZoneName,
    pub color: Color,
}

/// Signal acquisition status, shown to the user as a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    /// Raw level below the finger-presence threshold
    #[default]
    NoFinger,
    /// Finger present, detector still held by the calibration gate
    Calibrating,
    /// Finger present, detector running
    Reading,
}

impl SignalStatus {
    pub fn message(&self) -> &'static str {
        match self {
            SignalStatus::NoFinger => "Place finger on sensor.",
            SignalStatus::Calibrating => "Calibrating...",
            SignalStatus::Reading => "Reading...",
        }
    }
}

/// Immutable view of the monitor state, republished after every mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session the snapshot belongs to
    pub generation: SessionGeneration,
    /// Lifecycle phase
    pub phase: Phase,
    /// Latest BPM as display text ("0" before the first reading)
    pub heart_rate: String,
    /// Latest BPM reading
    pub current_bpm: Option<u32>,
    /// Pulsing indicator (auto-clears shortly after each pulse)
    pub is_pulsing: bool,
    /// Minimum BPM over the live history
    pub min_bpm: Option<u32>,
    /// Maximum BPM over the live history
    pub max_bpm: Option<u32>,
    /// Rounded mean BPM over the live history
    pub avg_bpm: Option<u32>,
    /// Elapsed session time in whole seconds
    pub session_duration_secs: u32,
    /// Smoothed series for plotting (oldest first, bounded)
    pub smoothed: Vec<f64>,
    /// Zone for the latest BPM at the configured age
    pub zone: Option<Zone>,
    /// Acquisition status
    pub signal: SignalStatus,
    /// Beat interval currently used to pace haptics (ms)
    pub beat_interval_ms: u64,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            generation: SessionGeneration::default(),
            phase: Phase::Instructions,
            heart_rate: "0".to_string(),
            current_bpm: None,
            is_pulsing: false,
            min_bpm: None,
            max_bpm: None,
            avg_bpm: None,
            session_duration_secs: 0,
            smoothed: Vec::new(),
            zone: None,
            signal: SignalStatus::NoFinger,
            beat_interval_ms: crate::config::DEFAULT_BEAT_INTERVAL_MS,
        }
    }
}

/// Record of a completed monitoring session, handed once to storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedSession {
    /// Storage identity
    pub id: Uuid,
    /// Wall-clock session start (UTC)
    pub started_at: DateTime<Utc>,
    /// Session length in whole seconds
    pub duration_secs: u32,
    pub avg_bpm: u32,
    pub min_bpm: u32,
    pub max_bpm: u32,
}

impl FinishedSession {
    /// Build a record if the session qualifies for persistence.
    ///
    /// Returns `None` unless `duration_secs > min_duration_secs` and all three
    /// statistics are present.
    pub fn qualify(
        started_at: DateTime<Utc>,
        duration_secs: u32,
        stats: &BpmStats,
        min_duration_secs: u32,
    ) -> Option<Self> {
        if duration_secs <= min_duration_secs {
            return None;
        }
        match (stats.avg, stats.min, stats.max) {
            (Some(avg_bpm), Some(min_bpm), Some(max_bpm)) => Some(Self {
                id: Uuid::new_v4(),
                started_at,
                duration_secs,
                avg_bpm,
                min_bpm,
                max_bpm,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_stats() -> BpmStats {
        BpmStats {
            min: Some(60),
            max: Some(80),
            avg: Some(70),
        }
    }

    #[test]
    fn test_phase_sample_acceptance() {
        assert!(!Phase::Instructions.accepts_samples());
        assert!(Phase::Calibrating.accepts_samples());
        assert!(Phase::Monitoring.accepts_samples());
        assert!(!Phase::Ended.accepts_samples());
    }

    #[test]
    fn test_finished_session_requires_min_duration() {
        let now = Utc::now();
        assert!(FinishedSession::qualify(now, 5, &full_stats(), 5).is_none());
        let record = FinishedSession::qualify(now, 6, &full_stats(), 5).unwrap();
        assert_eq!(record.duration_secs, 6);
        assert_eq!(record.avg_bpm, 70);
    }

    #[test]
    fn test_finished_session_requires_complete_stats() {
        let partial = BpmStats {
            min: Some(60),
            max: None,
            avg: Some(60),
        };
        assert!(FinishedSession::qualify(Utc::now(), 30, &partial, 5).is_none());
        assert!(FinishedSession::qualify(Utc::now(), 30, &BpmStats::default(), 5).is_none());
    }

    #[test]
    fn test_color_hex() {
        let color = Color::from_rgb(0x4FC3F7);
        assert_eq!(color, Color { r: 0x4F, g: 0xC3, b: 0xF7 });
        assert_eq!(color.to_hex(), "#4FC3F7");
    }

    #[test]
    fn test_snapshot_serialization() {
        let snapshot = SessionSnapshot::default();
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["phase"], "instructions");
        assert_eq!(json["heart_rate"], "0");
        assert_eq!(json["signal"], "no_finger");
        assert!(json["min_bpm"].is_null());
    }
}
