//! Drive a monitor with a generated 20 s session and print what a UI would show

use std::sync::Arc;

use synheart_pulse::schema::{AgeValue, Command, Payload};
use synheart_pulse::{MonitorConfig, PulseMonitor, SessionSnapshot, SnapshotCell, SyntheticSession};

fn main() {
    let session = SyntheticSession::new(84, 20_000)
        .with_age(32)
        .with_finger_lift(12_000, 13_000);

    let mut monitor = PulseMonitor::with_memory_store(MonitorConfig::default());
    let cell = SnapshotCell::new();
    monitor.subscribe(Box::new(cell.clone()));

    let mut generation = monitor.generation();
    let mut haptics = 0;
    for event in session.events() {
        let t = event.t_ms;
        match &event.payload {
            Payload::Age { age } => match &age.value {
                AgeValue::Years(years) => monitor.set_user_age(*years),
                AgeValue::Text(text) => {
                    monitor.set_user_age_text(text);
                }
            },
            Payload::Command { command } => match command.action {
                Command::Start => match monitor.start(t) {
                    Ok(g) => generation = g,
                    Err(e) => {
                        eprintln!("Error: {e}");
                        return;
                    }
                },
                Command::Stop => {
                    if let Some(outcome) = monitor.stop(t) {
                        match outcome.record() {
                            Some(record) => println!(
                                "stopped: avg {} min {} max {} over {}s",
                                record.avg_bpm, record.min_bpm, record.max_bpm, record.duration_secs
                            ),
                            None => println!("stopped: session too short to record"),
                        }
                    }
                }
                Command::Reset => {
                    if let Err(e) = monitor.reset_to_instructions() {
                        eprintln!("Error: {e}");
                    }
                }
            },
            Payload::Ppg { ppg } => {
                if let Some(action) = monitor.on_ppg_sample(generation, ppg.value, t) {
                    if action.haptic {
                        haptics += 1;
                    }
                }
            }
            Payload::Bpm { bpm } => monitor.on_bpm_reading(generation, bpm.value, t),
            Payload::Tick { .. } => {
                if monitor.tick(generation, t) {
                    print_line(&cell.latest());
                }
            }
            Payload::Sensors { sensors } => monitor.set_availability(*sensors),
        }
    }

    println!("haptic pulses: {haptics}");
}

fn print_line(snapshot: &Arc<SessionSnapshot>) {
    let zone = snapshot
        .zone
        .map(|z| z.name.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{:>3}s  {:<11} {:>3} bpm  zone {:<9} {}",
        snapshot.session_duration_secs,
        snapshot.phase.to_string(),
        snapshot.heart_rate,
        zone,
        snapshot.signal.message()
    );
}
