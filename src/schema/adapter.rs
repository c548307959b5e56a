//! Adapter for replaying pulse.sensor_event.v1 streams
//!
//! The adapter plays the host's role: it tags every record with the monitor's
//! current session generation and dispatches it in timestamp order. Recorded
//! streams can therefore be replayed deterministically, from the CLI or in tests.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::PulseError;
use crate::monitor::{PulseMonitor, StopOutcome};
use crate::schema::sensor_event::*;
use crate::types::{FinishedSession, Millis, SessionSnapshot};

/// Adapter for parsing and replaying sensor events
pub struct SensorEventAdapter;

impl SensorEventAdapter {
    /// Parse a JSON string containing an array of SensorEvents
    pub fn parse_array(json: &str) -> Result<Vec<SensorEvent>, PulseError> {
        let events: Vec<SensorEvent> = serde_json::from_str(json)?;
        Ok(events)
    }

    /// Parse NDJSON (newline-delimited JSON) containing SensorEvents
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<SensorEvent>, PulseError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<SensorEvent>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    return Err(PulseError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(events)
    }

    /// Encode events as NDJSON
    pub fn to_ndjson(events: &[SensorEvent]) -> Result<String, PulseError> {
        let mut out = String::new();
        for event in events {
            out.push_str(&serde_json::to_string(event)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Validate a batch of events, including timestamp ordering
    pub fn validate_events(events: &[SensorEvent]) -> Vec<ValidationResult> {
        let mut results = Vec::new();
        let mut previous: Option<Millis> = None;

        for (index, event) in events.iter().enumerate() {
            if let Err(error) = event.validate() {
                results.push(ValidationResult { index, error });
            } else if let Some(prev) = previous.filter(|prev| event.t_ms < *prev) {
                results.push(ValidationResult {
                    index,
                    error: ValidationError::NonMonotonicTimestamp {
                        previous: prev,
                        actual: event.t_ms,
                    },
                });
            }
            previous = Some(previous.map_or(event.t_ms, |p| p.max(event.t_ms)));
        }
        results
    }

    /// Replay a validated stream into `monitor`.
    ///
    /// Wall-clock session start times are derived as `origin + t_ms`. Rejected
    /// commands (missing sensors, invalid transitions) are recorded in the report
    /// and replay continues, the way a host would keep running.
    pub fn replay(
        monitor: &mut PulseMonitor,
        events: &[SensorEvent],
        origin: DateTime<Utc>,
    ) -> Result<ReplayReport, PulseError> {
        if let Some(invalid) = Self::validate_events(events).into_iter().next() {
            return Err(PulseError::ParseError(format!(
                "Invalid event at index {}: {}",
                invalid.index, invalid.error
            )));
        }

        let mut report = ReplayReport::default();
        for event in events {
            report.events += 1;
            let t = event.t_ms;
            let generation = monitor.generation();

            match &event.payload {
                Payload::Ppg { ppg } => {
                    report.ppg_samples += 1;
                    if let Some(action) = monitor.on_ppg_sample(generation, ppg.value, t) {
                        report.pulses += 1;
                        if action.haptic {
                            report.haptics += 1;
                        }
                    }
                }
                Payload::Bpm { bpm } => {
                    report.bpm_readings += 1;
                    monitor.on_bpm_reading(generation, bpm.value, t);
                }
                Payload::Tick { .. } => {
                    monitor.tick(generation, t);
                }
                Payload::Command { command } => {
                    Self::dispatch_command(monitor, command.action, t, origin, &mut report);
                }
                Payload::Age { age } => match &age.value {
                    AgeValue::Years(years) => monitor.set_user_age(*years),
                    AgeValue::Text(text) => {
                        monitor.set_user_age_text(text);
                    }
                },
                Payload::Sensors { sensors } => monitor.set_availability(*sensors),
            }
        }

        report.final_snapshot = (*monitor.snapshot()).clone();
        tracing::debug!(
            events = report.events,
            pulses = report.pulses,
            stops = report.stops.len(),
            "Replay finished"
        );
        Ok(report)
    }

    fn dispatch_command(
        monitor: &mut PulseMonitor,
        action: Command,
        t: Millis,
        origin: DateTime<Utc>,
        report: &mut ReplayReport,
    ) {
        match action {
            Command::Start => {
                let offset = Duration::milliseconds(i64::try_from(t).unwrap_or(i64::MAX));
                let started_at = origin.checked_add_signed(offset).unwrap_or(origin);
                if let Err(e) = monitor.start_at(t, started_at) {
                    report.rejected.push(RejectedCommand::new(t, action, e));
                }
            }
            Command::Stop => {
                if let Some(outcome) = monitor.stop(t) {
                    report.stops.push(StopSummary::from_outcome(t, outcome));
                }
            }
            Command::Reset => {
                if let Err(e) = monitor.reset_to_instructions() {
                    report.rejected.push(RejectedCommand::new(t, action, e));
                }
            }
        }
    }
}

/// Result of event validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub index: usize,
    pub error: ValidationError,
}

/// A lifecycle command the monitor refused
#[derive(Debug, Clone, Serialize)]
pub struct RejectedCommand {
    pub t_ms: Millis,
    pub action: Command,
    pub reason: String,
}

impl RejectedCommand {
    fn new(t_ms: Millis, action: Command, error: PulseError) -> Self {
        Self {
            t_ms,
            action,
            reason: error.to_string(),
        }
    }
}

/// Serializable view of a `StopOutcome`
#[derive(Debug, Clone, Serialize)]
pub struct StopSummary {
    pub t_ms: Millis,
    pub duration_secs: u32,
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<FinishedSession>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StopSummary {
    pub fn from_outcome(t_ms: Millis, outcome: StopOutcome) -> Self {
        match outcome {
            StopOutcome::NotRecorded { duration_secs } => Self {
                t_ms,
                duration_secs,
                saved: false,
                record: None,
                error: None,
            },
            StopOutcome::Saved(record) => Self {
                t_ms,
                duration_secs: record.duration_secs,
                saved: true,
                record: Some(record),
                error: None,
            },
            StopOutcome::SaveFailed { record, error } => Self {
                t_ms,
                duration_secs: record.duration_secs,
                saved: false,
                record: Some(record),
                error: Some(error.to_string()),
            },
        }
    }
}

/// Counters and outcomes of one replay
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplayReport {
    pub events: usize,
    pub ppg_samples: usize,
    pub bpm_readings: usize,
    pub pulses: usize,
    pub haptics: usize,
    pub stops: Vec<StopSummary>,
    pub rejected: Vec<RejectedCommand>,
    pub final_snapshot: SessionSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MonitorConfig;
    use crate::types::{Phase, SensorAvailability};
    use chrono::TimeZone;

    fn origin() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap()
    }

    fn session_events(stop_at: Millis) -> Vec<SensorEvent> {
        let mut events = vec![
            SensorEvent::age(0, AgeValue::Years(28)),
            SensorEvent::command(0, Command::Start),
        ];
        let mut t = 20;
        while t < stop_at {
            let phase = 2.0 * std::f64::consts::PI * t as f64 / 800.0;
            events.push(SensorEvent::ppg(t, 150_000.0 + 5000.0 * phase.sin()));
            if t % 1000 == 0 {
                events.push(SensorEvent::bpm(t, 75));
                events.push(SensorEvent::tick(t));
            }
            t += 20;
        }
        events.push(SensorEvent::command(stop_at, Command::Stop));
        events
    }

    #[test]
    fn test_parse_ndjson() {
        let ndjson = r#"
{"schema_version":"pulse.sensor_event.v1","t_ms":0,"record_type":"command","payload":{"command":{"action":"start"}}}

{"schema_version":"pulse.sensor_event.v1","t_ms":20,"record_type":"ppg","payload":{"ppg":{"value":130000.0}}}
"#;
        let events = SensorEventAdapter::parse_ndjson(ndjson).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], SensorEvent::ppg(20, 130_000.0));
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let ndjson = "{\"schema_version\":\"pulse.sensor_event.v1\",\"t_ms\":0,\"record_type\":\"tick\",\"payload\":{\"tick\":{}}}\nnot json\n";
        let err = SensorEventAdapter::parse_ndjson(ndjson).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_validate_detects_backwards_time() {
        let events = vec![
            SensorEvent::tick(100),
            SensorEvent::tick(50),
            SensorEvent::tick(150),
        ];
        let results = SensorEventAdapter::validate_events(&events);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].index, 1);
    }

    #[test]
    fn test_replay_full_session() {
        let mut monitor = PulseMonitor::with_memory_store(MonitorConfig::default());
        let report =
            SensorEventAdapter::replay(&mut monitor, &session_events(12_000), origin()).unwrap();

        assert!(report.pulses > 0);
        assert!(report.rejected.is_empty());
        assert_eq!(report.stops.len(), 1);
        let stop = &report.stops[0];
        assert!(stop.saved);
        assert_eq!(stop.duration_secs, 12);

        let record = stop.record.as_ref().unwrap();
        assert_eq!(record.avg_bpm, 75);
        assert_eq!(record.started_at, origin());
        assert_eq!(report.final_snapshot.phase, Phase::Ended);
        assert_eq!(monitor.history().unwrap().len(), 1);
    }

    #[test]
    fn test_replay_records_rejected_start() {
        let mut monitor = PulseMonitor::with_memory_store(MonitorConfig::default());
        let events = vec![
            SensorEvent::sensors(
                0,
                SensorAvailability {
                    optical: false,
                    bpm: true,
                },
            ),
            SensorEvent::command(10, Command::Start),
            SensorEvent::ppg(20, 150_000.0),
        ];

        let report = SensorEventAdapter::replay(&mut monitor, &events, origin()).unwrap();
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].action, Command::Start);
        assert_eq!(report.final_snapshot.phase, Phase::Instructions);
        assert!(report.final_snapshot.smoothed.is_empty());
    }

    #[test]
    fn test_replay_refuses_invalid_stream() {
        let mut monitor = PulseMonitor::with_memory_store(MonitorConfig::default());
        let events = vec![SensorEvent::tick(10), SensorEvent::tick(5)];
        assert!(SensorEventAdapter::replay(&mut monitor, &events, origin()).is_err());
    }
}
