//! FFI bindings for Synheart Pulse
//!
//! This module provides C-compatible functions for driving a monitor from a mobile
//! or embedded host. Strings are null-terminated UTF-8; every returned string is
//! newly allocated and must be freed with `pulse_free_string`.
//!
//! The handle is not thread-safe. Hosts must funnel all calls for one monitor
//! through a single thread or lock, and tag sensor callbacks with the generation
//! returned by `pulse_monitor_start`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use uuid::Uuid;

use crate::config::MonitorConfig;
use crate::monitor::PulseMonitor;
use crate::schema::StopSummary;
use crate::storage::{JsonFileSessionStore, MemorySessionStore, SessionStore};
use crate::types::{SensorAvailability, SessionGeneration};
use crate::zones::ZoneTable;

/// Bit set in the `pulse_monitor_feed_ppg` result when the visual pulse should show
pub const PULSE_FEEDBACK_VISUAL: i32 = 1;
/// Bit set in the `pulse_monitor_feed_ppg` result when the vibration should fire
pub const PULSE_FEEDBACK_HAPTIC: i32 = 2;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Helper to serialize a value into a C string, recording failures
fn json_to_cstr<T: serde::Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Monitor lifecycle
// ============================================================================

/// Opaque handle to a PulseMonitor
pub struct PulseMonitorHandle {
    monitor: PulseMonitor,
}

unsafe fn handle_mut<'a>(handle: *mut PulseMonitorHandle) -> Option<&'a mut PulseMonitorHandle> {
    if handle.is_null() {
        set_last_error("Null monitor pointer");
        return None;
    }
    Some(&mut *handle)
}

/// Create a new monitor.
///
/// # Safety
/// - `config_json` may be NULL (defaults) or a null-terminated JSON `MonitorConfig`.
/// - `store_path` may be NULL (in-memory history) or a null-terminated path to a
///   JSON session file.
/// - Must be freed with `pulse_monitor_free`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_new(
    config_json: *const c_char,
    store_path: *const c_char,
) -> *mut PulseMonitorHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        MonitorConfig::default()
    } else {
        let json = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match MonitorConfig::from_json_str(&json) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let store: Box<dyn SessionStore> = if store_path.is_null() {
        Box::new(MemorySessionStore::new())
    } else {
        match cstr_to_string(store_path) {
            Some(path) => Box::new(JsonFileSessionStore::new(path)),
            None => {
                set_last_error("Invalid store path pointer");
                return ptr::null_mut();
            }
        }
    };

    let handle = Box::new(PulseMonitorHandle {
        monitor: PulseMonitor::new(config, store),
    });
    Box::into_raw(handle)
}

/// Free a monitor.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_monitor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_free(handle: *mut PulseMonitorHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Report which sensors the host registered.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_monitor_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_set_sensors(
    handle: *mut PulseMonitorHandle,
    optical: bool,
    bpm: bool,
) -> i32 {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    handle
        .monitor
        .set_availability(SensorAvailability { optical, bpm });
    0
}

/// Start a session.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_monitor_new`.
/// - Returns the session generation (>= 1) on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_start(handle: *mut PulseMonitorHandle, now_ms: u64) -> i64 {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    match handle.monitor.start(now_ms) {
        Ok(generation) => i64::try_from(generation.0).unwrap_or(i64::MAX),
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Stop the running session.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_monitor_new`.
/// - Returns a JSON stop summary that must be freed with `pulse_free_string`.
/// - Returns NULL when no session was running (`pulse_last_error` is then NULL)
///   or on error.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_stop(handle: *mut PulseMonitorHandle, now_ms: u64) -> *mut c_char {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return ptr::null_mut();
    };
    match handle.monitor.stop(now_ms) {
        Some(outcome) => json_to_cstr(&StopSummary::from_outcome(now_ms, outcome)),
        None => ptr::null_mut(),
    }
}

/// Return to the instructions screen.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_monitor_new`.
/// - Returns 0 on success, -1 on error (e.g. a session is still running).
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_reset(handle: *mut PulseMonitorHandle) -> i32 {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    match handle.monitor.reset_to_instructions() {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Sensor input
// ============================================================================

/// Feed one raw optical sample.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_monitor_new`.
/// - Returns a bit set of `PULSE_FEEDBACK_VISUAL` / `PULSE_FEEDBACK_HAPTIC`
///   (0 when no pulse was detected), or -1 on error.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_feed_ppg(
    handle: *mut PulseMonitorHandle,
    generation: u64,
    value: f64,
    now_ms: u64,
) -> i32 {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    match handle
        .monitor
        .on_ppg_sample(SessionGeneration(generation), value, now_ms)
    {
        Some(action) => {
            let mut flags = 0;
            if action.visual_pulse {
                flags |= PULSE_FEEDBACK_VISUAL;
            }
            if action.haptic {
                flags |= PULSE_FEEDBACK_HAPTIC;
            }
            flags
        }
        None => 0,
    }
}

/// Feed one discrete BPM reading.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_monitor_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_feed_bpm(
    handle: *mut PulseMonitorHandle,
    generation: u64,
    bpm: i64,
    now_ms: u64,
) -> i32 {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    handle
        .monitor
        .on_bpm_reading(SessionGeneration(generation), bpm, now_ms);
    0
}

/// Drive session timers.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_monitor_new`.
/// - Returns 1 when a new snapshot was published, 0 otherwise, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_tick(
    handle: *mut PulseMonitorHandle,
    generation: u64,
    now_ms: u64,
) -> i32 {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    i32::from(handle.monitor.tick(SessionGeneration(generation), now_ms))
}

/// Set the user age from text.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_monitor_new`.
/// - `age_text` must be a valid null-terminated C string.
/// - Returns 0 when accepted, 1 when the text was ignored, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_set_age(
    handle: *mut PulseMonitorHandle,
    age_text: *const c_char,
) -> i32 {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    let Some(text) = cstr_to_string(age_text) else {
        set_last_error("Invalid age string pointer");
        return -1;
    };
    if handle.monitor.set_user_age_text(&text) {
        0
    } else {
        1
    }
}

// ============================================================================
// Output
// ============================================================================

/// Latest snapshot as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_monitor_new`.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_snapshot_json(handle: *mut PulseMonitorHandle) -> *mut c_char {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return ptr::null_mut();
    };
    json_to_cstr(&*handle.monitor.snapshot())
}

/// Stored sessions as a JSON array, newest first.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_monitor_new`.
/// - Returns a newly allocated string that must be freed with `pulse_free_string`.
/// - Returns NULL on error; call `pulse_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_history_json(handle: *mut PulseMonitorHandle) -> *mut c_char {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return ptr::null_mut();
    };
    match handle.monitor.history() {
        Ok(sessions) => json_to_cstr(&sessions),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Delete a stored session by id.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `pulse_monitor_new`.
/// - `id` must be a valid null-terminated UUID string.
/// - Returns 1 when deleted, 0 when not found, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn pulse_monitor_delete_session(
    handle: *mut PulseMonitorHandle,
    id: *const c_char,
) -> i32 {
    clear_last_error();
    let Some(handle) = handle_mut(handle) else {
        return -1;
    };
    let id = match cstr_to_string(id).map(|s| Uuid::parse_str(&s)) {
        Some(Ok(id)) => id,
        Some(Err(e)) => {
            set_last_error(&format!("Invalid session id: {}", e));
            return -1;
        }
        None => {
            set_last_error("Invalid session id pointer");
            return -1;
        }
    };
    match handle.monitor.delete_session(id) {
        Ok(deleted) => i32::from(deleted),
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Classify a BPM for an age without a monitor.
///
/// # Safety
/// - Returns a newly allocated JSON zone that must be freed with `pulse_free_string`.
/// - Returns NULL when the pair is outside the zone table.
#[no_mangle]
pub unsafe extern "C" fn pulse_zone_json(age: u32, bpm: u32) -> *mut c_char {
    clear_last_error();
    match ZoneTable::classify(age, bpm) {
        Some(zone) => json_to_cstr(&zone),
        None => ptr::null_mut(),
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Pulse functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Pulse function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn pulse_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Pulse function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn pulse_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the Pulse library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn pulse_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        pulse_free_string(ptr);
        s
    }

    #[test]
    fn test_ffi_monitor_lifecycle() {
        unsafe {
            let monitor = pulse_monitor_new(ptr::null(), ptr::null());
            assert!(!monitor.is_null());

            let generation = pulse_monitor_start(monitor, 0);
            assert_eq!(generation, 1);
            let generation = generation as u64;

            assert_eq!(pulse_monitor_feed_bpm(monitor, generation, 70, 100), 0);
            assert_eq!(pulse_monitor_feed_ppg(monitor, generation, 150_000.0, 120), 0);
            for t in (1_000..=8_000).step_by(1_000) {
                pulse_monitor_tick(monitor, generation, t);
            }

            let snapshot: serde_json::Value =
                serde_json::from_str(&take_string(pulse_monitor_snapshot_json(monitor))).unwrap();
            assert_eq!(snapshot["heart_rate"], "70");
            assert_eq!(snapshot["phase"], "monitoring");
            assert_eq!(snapshot["session_duration_secs"], 8);

            let stop: serde_json::Value =
                serde_json::from_str(&take_string(pulse_monitor_stop(monitor, 8_000))).unwrap();
            assert_eq!(stop["saved"], true);
            let id = CString::new(stop["record"]["id"].as_str().unwrap()).unwrap();

            assert!(pulse_monitor_stop(monitor, 9_000).is_null());
            assert!(pulse_last_error().is_null());

            let history: serde_json::Value =
                serde_json::from_str(&take_string(pulse_monitor_history_json(monitor))).unwrap();
            assert_eq!(history.as_array().unwrap().len(), 1);

            assert_eq!(pulse_monitor_delete_session(monitor, id.as_ptr()), 1);
            assert_eq!(pulse_monitor_delete_session(monitor, id.as_ptr()), 0);
            assert_eq!(pulse_monitor_reset(monitor), 0);

            pulse_monitor_free(monitor);
        }
    }

    #[test]
    fn test_ffi_missing_sensor() {
        unsafe {
            let monitor = pulse_monitor_new(ptr::null(), ptr::null());
            assert_eq!(pulse_monitor_set_sensors(monitor, false, true), 0);
            assert_eq!(pulse_monitor_start(monitor, 0), -1);

            let error = CStr::from_ptr(pulse_last_error()).to_str().unwrap();
            assert!(error.contains("optical"));
            pulse_monitor_free(monitor);
        }
    }

    #[test]
    fn test_ffi_config_and_age() {
        unsafe {
            let config = CString::new(r#"{"user_age": 62, "warmup_ms": 1000}"#).unwrap();
            let monitor = pulse_monitor_new(config.as_ptr(), ptr::null());
            assert!(!monitor.is_null());

            let bad = CString::new("sixty").unwrap();
            assert_eq!(pulse_monitor_set_age(monitor, bad.as_ptr()), 1);
            let good = CString::new("45").unwrap();
            assert_eq!(pulse_monitor_set_age(monitor, good.as_ptr()), 0);
            pulse_monitor_free(monitor);

            let invalid = CString::new(r#"{"haptic_factor": -1.0}"#).unwrap();
            assert!(pulse_monitor_new(invalid.as_ptr(), ptr::null()).is_null());
            assert!(!pulse_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_null_handle() {
        unsafe {
            assert_eq!(pulse_monitor_start(ptr::null_mut(), 0), -1);
            let error = CStr::from_ptr(pulse_last_error()).to_str().unwrap();
            assert_eq!(error, "Null monitor pointer");
        }
    }

    #[test]
    fn test_ffi_zone_and_version() {
        unsafe {
            let zone: serde_json::Value =
                serde_json::from_str(&take_string(pulse_zone_json(25, 110))).unwrap();
            assert_eq!(zone["name"], "moderate");
            assert!(pulse_zone_json(150, 70).is_null());

            let version = CStr::from_ptr(pulse_version()).to_str().unwrap();
            assert_eq!(version, env!("CARGO_PKG_VERSION"));
        }
    }
}
