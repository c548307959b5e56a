//! Error types for Synheart Pulse

use thiserror::Error;

use crate::storage::StorageError;
use crate::types::Phase;

/// Errors surfaced at the host boundary.
///
/// Sensor noise (sub-threshold samples, non-positive BPM, bad age text) is never
/// reported here; those inputs are dropped where they arrive.
#[derive(Debug, Error)]
pub enum PulseError {
    #[error("Required sensor not available: {0}")]
    MissingSensor(String),

    #[error("Cannot {action} while session is {phase}")]
    InvalidTransition { action: &'static str, phase: Phase },

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse sensor stream: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
