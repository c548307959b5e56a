//! End-to-end sessions driven through the public API

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use synheart_pulse::schema::{Command, SensorEvent};
use synheart_pulse::{
    HistorySummary, JsonFileSessionStore, MonitorConfig, Phase, PulseMonitor, SensorAvailability,
    SensorEventAdapter, SessionStore, SyntheticSession,
};

fn origin(hour: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap()
}

#[test]
fn replayed_session_is_persisted_to_json_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sessions.json");

    let mut monitor =
        PulseMonitor::new(MonitorConfig::default(), Box::new(JsonFileSessionStore::new(&path)));
    let events = SyntheticSession::new(75, 12_000).with_age(30).events();
    let report = SensorEventAdapter::replay(&mut monitor, &events, origin(9)).unwrap();

    assert_eq!(report.stops.len(), 1);
    assert!(report.stops[0].saved);
    assert!(report.pulses >= 5, "pulses = {}", report.pulses);
    assert_eq!(report.final_snapshot.phase, Phase::Ended);

    // A fresh store on the same file sees the record
    let sessions = JsonFileSessionStore::new(&path).list().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].duration_secs, 12);
    assert_eq!(sessions[0].avg_bpm, 75);
    assert_eq!(sessions[0].started_at, origin(9));
}

#[test]
fn finger_lift_restarts_acquisition() {
    let steady = SyntheticSession::new(75, 20_000).events();
    let lifted = SyntheticSession::new(75, 20_000)
        .with_finger_lift(8_000, 10_000)
        .events();

    let mut monitor = PulseMonitor::with_memory_store(MonitorConfig::default());
    let steady_report = SensorEventAdapter::replay(&mut monitor, &steady, origin(9)).unwrap();

    let mut monitor = PulseMonitor::with_memory_store(MonitorConfig::default());
    let lifted_report = SensorEventAdapter::replay(&mut monitor, &lifted, origin(9)).unwrap();

    // Calibration runs again after the finger returns, so fewer pulses are detected
    assert!(lifted_report.pulses > 0);
    assert!(
        lifted_report.pulses < steady_report.pulses,
        "lifted {} vs steady {}",
        lifted_report.pulses,
        steady_report.pulses
    );

    let record = lifted_report.stops[0].record.clone().unwrap();
    assert_eq!(record.avg_bpm, 75);
    assert_eq!(record.duration_secs, 20);
}

#[test]
fn reset_between_sessions_keeps_history() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sessions.json");
    let mut monitor =
        PulseMonitor::new(MonitorConfig::default(), Box::new(JsonFileSessionStore::new(&path)));

    let first = SyntheticSession::new(64, 10_000).events();
    SensorEventAdapter::replay(&mut monitor, &first, origin(8)).unwrap();
    assert_eq!(monitor.phase(), Phase::Ended);

    monitor.reset_to_instructions().unwrap();
    let snapshot = monitor.snapshot();
    assert_eq!(snapshot.phase, Phase::Instructions);
    assert_eq!(snapshot.heart_rate, "0");
    assert_eq!(snapshot.avg_bpm, None);
    assert!(snapshot.smoothed.is_empty());

    let second = SyntheticSession::new(90, 10_000).events();
    SensorEventAdapter::replay(&mut monitor, &second, origin(10)).unwrap();

    let history = monitor.history().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].avg_bpm, 90);
    assert_eq!(history[1].avg_bpm, 64);

    let summary = HistorySummary::from_sessions(&history);
    assert_eq!(summary.sessions, 2);
    assert_eq!(summary.lowest_bpm, Some(64));
    assert_eq!(summary.highest_bpm, Some(90));
    assert_eq!(summary.weighted_avg_bpm, Some(77));

    assert!(monitor.delete_session(history[1].id).unwrap());
    assert_eq!(JsonFileSessionStore::new(&path).list().unwrap().len(), 1);
}

#[test]
fn missing_optical_sensor_rejects_start() {
    let mut events = vec![SensorEvent::sensors(
        0,
        SensorAvailability {
            optical: false,
            bpm: true,
        },
    )];
    events.extend(SyntheticSession::new(70, 8_000).events());

    let mut monitor = PulseMonitor::with_memory_store(MonitorConfig::default());
    let report = SensorEventAdapter::replay(&mut monitor, &events, origin(9)).unwrap();

    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].action, Command::Start);
    assert!(report.rejected[0].reason.contains("optical"));
    assert!(report.stops.is_empty());
    assert_eq!(report.pulses, 0);
    assert_eq!(report.final_snapshot.phase, Phase::Instructions);
}
