//! pulse.sensor_event.v1 schema definition
//!
//! One record per host callback, stamped with the host's monotonic clock:
//! - Optical samples and discrete BPM readings (the two sensor channels)
//! - Timer ticks driving duration, warm-up and pulse auto-clear
//! - Lifecycle commands (start, stop, reset)
//! - Age entries and sensor availability changes

use serde::{Deserialize, Serialize};

use crate::types::{Millis, SensorAvailability};

/// Current schema version
pub const SCHEMA_VERSION: &str = "pulse.sensor_event.v1";

/// Capture device information
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Device model (e.g., "SM-G950F")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
    /// Optical sensor name as reported by the platform
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_name: Option<String>,
}

/// Type of record contained in the event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Ppg,
    Bpm,
    Tick,
    Command,
    Age,
    Sensors,
}

/// Raw optical channel reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PpgPayload {
    pub value: f64,
}

/// Discrete heart-rate channel reading; may be non-positive on bad contact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BpmPayload {
    pub value: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TickPayload {}

/// Lifecycle command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Start,
    Stop,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandPayload {
    pub action: Command,
}

/// Age as a number or as the text the user typed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgeValue {
    Years(u32),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgePayload {
    pub value: AgeValue,
}

/// Event payload - one per record type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Ppg { ppg: PpgPayload },
    Bpm { bpm: BpmPayload },
    Tick { tick: TickPayload },
    Command { command: CommandPayload },
    Age { age: AgePayload },
    Sensors { sensors: SensorAvailability },
}

impl Payload {
    pub fn record_type(&self) -> RecordType {
        match self {
            Payload::Ppg { .. } => RecordType::Ppg,
            Payload::Bpm { .. } => RecordType::Bpm,
            Payload::Tick { .. } => RecordType::Tick,
            Payload::Command { .. } => RecordType::Command,
            Payload::Age { .. } => RecordType::Age,
            Payload::Sensors { .. } => RecordType::Sensors,
        }
    }
}

/// The main pulse.sensor_event.v1 record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorEvent {
    /// Schema version identifier
    pub schema_version: String,
    /// Host monotonic timestamp (ms)
    pub t_ms: Millis,
    /// Type of record
    pub record_type: RecordType,
    /// Event payload (depends on record_type)
    pub payload: Payload,
    /// Optional capture device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
}

impl SensorEvent {
    fn new(t_ms: Millis, payload: Payload) -> Self {
        SensorEvent {
            schema_version: SCHEMA_VERSION.to_string(),
            t_ms,
            record_type: payload.record_type(),
            payload,
            source: None,
        }
    }

    pub fn ppg(t_ms: Millis, value: f64) -> Self {
        Self::new(t_ms, Payload::Ppg { ppg: PpgPayload { value } })
    }

    pub fn bpm(t_ms: Millis, value: i64) -> Self {
        Self::new(t_ms, Payload::Bpm { bpm: BpmPayload { value } })
    }

    pub fn tick(t_ms: Millis) -> Self {
        Self::new(t_ms, Payload::Tick { tick: TickPayload {} })
    }

    pub fn command(t_ms: Millis, action: Command) -> Self {
        Self::new(t_ms, Payload::Command { command: CommandPayload { action } })
    }

    pub fn age(t_ms: Millis, value: AgeValue) -> Self {
        Self::new(t_ms, Payload::Age { age: AgePayload { value } })
    }

    pub fn sensors(t_ms: Millis, sensors: SensorAvailability) -> Self {
        Self::new(t_ms, Payload::Sensors { sensors })
    }

    /// Attach capture device information
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    /// Validate a single record
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }

        let payload_type = self.payload.record_type();
        if payload_type != self.record_type {
            return Err(ValidationError::PayloadTypeMismatch {
                record_type: self.record_type,
                payload_type,
            });
        }

        if let Payload::Ppg { ppg } = &self.payload {
            if !ppg.value.is_finite() {
                return Err(ValidationError::NonFiniteSample { t_ms: self.t_ms });
            }
        }
        Ok(())
    }
}

/// Validation errors for sensor events
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Payload type mismatch: record_type is {record_type:?} but payload is {payload_type:?}")]
    PayloadTypeMismatch {
        record_type: RecordType,
        payload_type: RecordType,
    },

    #[error("Non-finite optical sample at t_ms={t_ms}")]
    NonFiniteSample { t_ms: Millis },

    #[error("Timestamp went backwards: {actual} after {previous}")]
    NonMonotonicTimestamp { previous: Millis, actual: Millis },
}
