//! Synheart Pulse - On-device heart monitor core for camera/optical PPG sensors
//!
//! Pulse turns a live optical light-intensity stream plus a companion discrete BPM
//! stream into a plot-ready smoothed signal, pulse events with haptic pacing,
//! rolling BPM statistics and age-relative heart-rate zones:
//! finger gate → moving average → calibration gate → peak detection → feedback.
//!
//! ## Modules
//!
//! - **Monitor**: `PulseMonitor`, the single mutation path hosts drive
//! - **Signal stages**: conditioner, calibration, peak, feedback
//! - **Statistics**: BPM aggregation and the zone table
//! - **Storage**: the `SessionStore` boundary with memory and JSON-file stores
//! - **Schema**: the `pulse.sensor_event.v1` stream format and replay adapter
//! - **Synthetic**: generated sensor streams for demos and tests

pub mod aggregator;
pub mod calibration;
pub mod conditioner;
pub mod config;
pub mod error;
pub mod feedback;
pub mod monitor;
pub mod peak;
pub mod schema;
pub mod session;
pub mod storage;
pub mod synthetic;
pub mod types;
pub mod window;
pub mod zones;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::{BeatIntervalMode, MonitorConfig};
pub use error::PulseError;
pub use monitor::{PulseMonitor, SnapshotCell, SnapshotObserver, StopOutcome};
pub use storage::{
    format_duration, HistorySummary, JsonFileSessionStore, MemorySessionStore, SessionStore,
    StorageError,
};
pub use types::{
    FeedbackAction, FinishedSession, Millis, Phase, SensorAvailability, SessionGeneration,
    SessionSnapshot, SignalStatus, Zone, ZoneName,
};
pub use synthetic::SyntheticSession;
pub use zones::ZoneTable;

// Schema exports
pub use schema::{ReplayReport, SensorEvent, SensorEventAdapter, SCHEMA_VERSION};

/// Pulse library version
pub const PULSE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI and in exported history
pub const PRODUCER_NAME: &str = "synheart-pulse";
