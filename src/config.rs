//! Monitor configuration
//!
//! Fixed buffer capacities live here as constants. Every threshold and timing knob is
//! a `MonitorConfig` field with the documented default, so hosts can load overrides
//! from TOML or JSON.
//!
//! Two timings have diverged between known app variants and are deliberately left
//! configurable: the signal calibration window (5 s vs 10 s) and the haptic pacing
//! mode (fixed interval seeded during calibration vs an EMA over every reading).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::PulseError;

/// Raw PPG samples kept for smoothing
pub const RAW_BUFFER_CAPACITY: usize = 100;
/// Smoothed samples kept for plotting and peak detection
pub const SMOOTHED_BUFFER_CAPACITY: usize = 100;
/// Discrete BPM readings kept for statistics
pub const BPM_HISTORY_CAPACITY: usize = 200;
/// Trailing raw samples averaged into one smoothed sample
pub const MOVING_AVERAGE_WINDOW: usize = 5;
/// Smoothed samples required before the peak detector runs (strictly more than)
pub const MIN_DETECTION_SAMPLES: usize = 20;
/// Duration counter resolution
pub const DURATION_TICK_MS: u64 = 1000;

pub const DEFAULT_FINGER_THRESHOLD: f64 = 100_000.0;
pub const DEFAULT_MIN_SIGNAL_AMPLITUDE: f64 = 2000.0;
pub const DEFAULT_MIN_PEAK_INTERVAL_MS: u64 = 300;
pub const DEFAULT_CALIBRATION_MS: u64 = 5000;
pub const DEFAULT_WARMUP_MS: u64 = 5000;
pub const DEFAULT_PULSE_CLEAR_MS: u64 = 150;
pub const DEFAULT_HAPTIC_FACTOR: f64 = 0.8;
pub const DEFAULT_MIN_SESSION_SECS: u32 = 5;
pub const DEFAULT_BEAT_INTERVAL_MS: u64 = 600;
pub const DEFAULT_USER_AGE: u32 = 35;

/// Environment variable naming a config file for [`MonitorConfig::load`]
pub const CONFIG_ENV_VAR: &str = "PULSE_CONFIG";

/// How the haptic pacing interval follows the discrete BPM channel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BeatIntervalMode {
    #[default]
    /// Seeded as `60000 / bpm` from readings that arrive while calibrating, then held
    Fixed,
    /// Exponential moving average over every accepted reading
    Ema { alpha: f64 },
}

/// Thresholds and timings for one monitor instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Raw level below which no finger is assumed on the sensor
    pub finger_threshold: f64,
    /// Smoothed max - min that must be exceeded before peaks are tracked
    pub min_signal_amplitude: f64,
    /// Refractory interval between accepted peaks (ms)
    pub min_peak_interval_ms: u64,
    /// Signal calibration window measured from the first valid sample (ms)
    pub calibration_ms: u64,
    /// Delay from `start` until the Calibrating -> Monitoring transition (ms)
    pub warmup_ms: u64,
    /// Visual pulse auto-clear delay (ms)
    pub pulse_clear_ms: u64,
    /// Fraction of the beat interval that must pass between haptic pulses
    pub haptic_factor: f64,
    /// Sessions must last strictly longer than this to be persisted (s)
    pub min_session_secs: u32,
    /// Beat interval assumed before any BPM reading (ms)
    pub default_beat_interval_ms: u64,
    /// User age for zone classification
    pub user_age: u32,
    /// Haptic pacing mode
    pub beat_interval: BeatIntervalMode,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            finger_threshold: DEFAULT_FINGER_THRESHOLD,
            min_signal_amplitude: DEFAULT_MIN_SIGNAL_AMPLITUDE,
            min_peak_interval_ms: DEFAULT_MIN_PEAK_INTERVAL_MS,
            calibration_ms: DEFAULT_CALIBRATION_MS,
            warmup_ms: DEFAULT_WARMUP_MS,
            pulse_clear_ms: DEFAULT_PULSE_CLEAR_MS,
            haptic_factor: DEFAULT_HAPTIC_FACTOR,
            min_session_secs: DEFAULT_MIN_SESSION_SECS,
            default_beat_interval_ms: DEFAULT_BEAT_INTERVAL_MS,
            user_age: DEFAULT_USER_AGE,
            beat_interval: BeatIntervalMode::Fixed,
        }
    }
}

impl MonitorConfig {
    /// Load configuration using the search order:
    /// 1. `$PULSE_CONFIG`
    /// 2. `./pulse.toml`
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            match Self::load_from_file(&p) {
                Ok(config) => {
                    info!(path = %p.display(), "Loaded monitor config from {}", CONFIG_ENV_VAR);
                    return config;
                }
                Err(e) => {
                    warn!(path = %p.display(), error = %e, "Failed to load monitor config, falling back");
                }
            }
        }

        let local = PathBuf::from("pulse.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded monitor config from ./pulse.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./pulse.toml, using defaults");
                }
            }
        }

        Self::default()
    }

    /// Load from a TOML file, or JSON when the extension is `.json`
    pub fn load_from_file(path: &Path) -> Result<Self, PulseError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PulseError::ConfigError(format!("{}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_toml_str(&contents)
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, PulseError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| PulseError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, PulseError> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, PulseError> {
        toml::to_string_pretty(self).map_err(|e| PulseError::ConfigError(e.to_string()))
    }

    /// Check every knob and report all violations at once
    pub fn validate(&self) -> Result<(), PulseError> {
        let mut errors: Vec<String> = Vec::new();

        if !(self.finger_threshold.is_finite() && self.finger_threshold >= 0.0) {
            errors.push(format!(
                "finger_threshold must be a non-negative number (got {})",
                self.finger_threshold
            ));
        }
        if !(self.min_signal_amplitude.is_finite() && self.min_signal_amplitude >= 0.0) {
            errors.push(format!(
                "min_signal_amplitude must be a non-negative number (got {})",
                self.min_signal_amplitude
            ));
        }
        if !(self.haptic_factor.is_finite() && self.haptic_factor >= 0.0) {
            errors.push(format!(
                "haptic_factor must be a non-negative number (got {})",
                self.haptic_factor
            ));
        }
        if self.default_beat_interval_ms == 0 {
            errors.push("default_beat_interval_ms must be > 0".to_string());
        }
        if self.user_age == 0 {
            errors.push("user_age must be > 0".to_string());
        }
        if let BeatIntervalMode::Ema { alpha } = self.beat_interval {
            if !(alpha > 0.0 && alpha <= 1.0) {
                errors.push(format!("beat_interval.alpha must be in (0, 1] (got {})", alpha));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(PulseError::ConfigError(errors.join("; ")))
        }
    }
}

/// Parse a user-entered age; anything that is not a positive integer is ignored
pub fn parse_age(input: &str) -> Option<u32> {
    input.trim().parse::<u32>().ok().filter(|age| *age > 0)
}
