//! Host sensor stream schema (pulse.sensor_event.v1)
//!
//! This module defines the record format hosts use to capture or forward sensor
//! callbacks and lifecycle commands, and the adapter that replays such streams into
//! a `PulseMonitor`.

mod adapter;
mod sensor_event;

pub use adapter::*;
pub use sensor_event::*;
