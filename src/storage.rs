//! Session storage boundary
//!
//! The monitor never owns persistence. Hosts inject a `SessionStore`; two
//! implementations ship with the crate: an in-memory store and a single-file JSON
//! store used by the CLI.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

use crate::types::FinishedSession;

/// Errors raised by a storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt session file {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode sessions: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Persistence for finished sessions
pub trait SessionStore: Send {
    /// Persist one record
    fn save(&mut self, record: &FinishedSession) -> Result<(), StorageError>;

    /// All records, newest first
    fn list(&self) -> Result<Vec<FinishedSession>, StorageError>;

    /// Remove a record; returns whether it existed
    fn delete(&mut self, id: Uuid) -> Result<bool, StorageError>;
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StorageError {
    let path = path.to_path_buf();
    move |source| StorageError::Io { path, source }
}

fn newest_first(records: &mut [FinishedSession]) {
    records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
}

/// Store that keeps records in memory
#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    records: Vec<FinishedSession>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&mut self, record: &FinishedSession) -> Result<(), StorageError> {
        self.records.push(record.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<FinishedSession>, StorageError> {
        let mut records = self.records.clone();
        newest_first(&mut records);
        Ok(records)
    }

    fn delete(&mut self, id: Uuid) -> Result<bool, StorageError> {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        Ok(self.records.len() != before)
    }
}

/// Store backed by one JSON array file
#[derive(Debug, Clone)]
pub struct JsonFileSessionStore {
    path: PathBuf,
}

impl JsonFileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<Vec<FinishedSession>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(io_error(&self.path))?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&contents).map_err(|source| StorageError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Sibling file the next write is staged in
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Replace the file atomically (write temp file, then rename)
    fn write_all(&self, records: &[FinishedSession]) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(records)?;
        let staging = self.staging_path();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        std::fs::write(&staging, json).map_err(io_error(&staging))?;
        std::fs::rename(&staging, &self.path).map_err(io_error(&self.path))
    }
}

impl SessionStore for JsonFileSessionStore {
    fn save(&mut self, record: &FinishedSession) -> Result<(), StorageError> {
        let mut records = self.read_all()?;
        records.push(record.clone());
        self.write_all(&records)
    }

    fn list(&self) -> Result<Vec<FinishedSession>, StorageError> {
        let mut records = self.read_all()?;
        newest_first(&mut records);
        Ok(records)
    }

    fn delete(&mut self, id: Uuid) -> Result<bool, StorageError> {
        let mut records = self.read_all()?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.write_all(&records)?;
        Ok(true)
    }
}

/// Aggregate over stored sessions, for history views
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct HistorySummary {
    pub sessions: usize,
    pub total_duration_secs: u64,
    pub lowest_bpm: Option<u32>,
    pub highest_bpm: Option<u32>,
    /// Duration-weighted mean of the per-session averages
    pub weighted_avg_bpm: Option<u32>,
}

impl HistorySummary {
    pub fn from_sessions(sessions: &[FinishedSession]) -> Self {
        let total_duration_secs: u64 = sessions.iter().map(|s| s.duration_secs as u64).sum();
        let weighted_avg_bpm = if total_duration_secs > 0 {
            let weighted: u64 = sessions
                .iter()
                .map(|s| s.avg_bpm as u64 * s.duration_secs as u64)
                .sum();
            Some((weighted as f64 / total_duration_secs as f64).round() as u32)
        } else {
            None
        };

        Self {
            sessions: sessions.len(),
            total_duration_secs,
            lowest_bpm: sessions.iter().map(|s| s.min_bpm).min(),
            highest_bpm: sessions.iter().map(|s| s.max_bpm).max(),
            weighted_avg_bpm,
        }
    }
}

/// Format seconds as `m:ss`
pub fn format_duration(total_secs: u32) -> String {
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn record(minutes_offset: i64, duration_secs: u32, avg: u32, min: u32, max: u32) -> FinishedSession {
        FinishedSession {
            id: Uuid::new_v4(),
            started_at: Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
                + Duration::minutes(minutes_offset),
            duration_secs,
            avg_bpm: avg,
            min_bpm: min,
            max_bpm: max,
        }
    }

    #[test]
    fn test_memory_store_lists_newest_first() {
        let mut store = MemorySessionStore::new();
        let older = record(0, 60, 70, 60, 80);
        let newer = record(30, 120, 90, 80, 110);
        store.save(&older).unwrap();
        store.save(&newer).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed, vec![newer.clone(), older.clone()]);

        assert!(store.delete(older.id).unwrap());
        assert!(!store.delete(older.id).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_json_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");

        let first = record(0, 42, 72, 65, 88);
        let second = record(10, 300, 68, 58, 79);
        {
            let mut store = JsonFileSessionStore::new(&path);
            assert!(store.list().unwrap().is_empty());
            store.save(&first).unwrap();
            store.save(&second).unwrap();
        }

        let mut reopened = JsonFileSessionStore::new(&path);
        assert_eq!(reopened.list().unwrap(), vec![second.clone(), first.clone()]);

        assert!(reopened.delete(second.id).unwrap());
        assert_eq!(reopened.list().unwrap(), vec![first]);
    }

    #[test]
    fn test_json_store_failed_write_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let kept = record(0, 42, 72, 65, 88);

        let mut store = JsonFileSessionStore::new(&path);
        store.save(&kept).unwrap();

        // A directory at the staging path makes the next write fail
        let staging = dir.path().join("sessions.json.tmp");
        std::fs::create_dir(&staging).unwrap();
        assert!(matches!(
            store.save(&record(10, 300, 68, 58, 79)),
            Err(StorageError::Io { .. })
        ));
        assert_eq!(store.list().unwrap(), vec![kept.clone()]);

        // A half-written staging file from an interrupted write is simply replaced
        std::fs::remove_dir(&staging).unwrap();
        std::fs::write(&staging, "[{\"id\": ").unwrap();
        let later = record(20, 90, 80, 70, 95);
        store.save(&later).unwrap();
        assert_eq!(store.list().unwrap(), vec![later, kept]);
        assert!(!staging.exists());
    }

    #[test]
    fn test_json_store_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "not json").unwrap();

        let store = JsonFileSessionStore::new(&path);
        assert!(matches!(store.list(), Err(StorageError::Corrupt { .. })));
    }

    #[test]
    fn test_history_summary() {
        let sessions = vec![record(0, 60, 70, 60, 80), record(5, 180, 90, 75, 120)];
        let summary = HistorySummary::from_sessions(&sessions);
        assert_eq!(summary.sessions, 2);
        assert_eq!(summary.total_duration_secs, 240);
        assert_eq!(summary.lowest_bpm, Some(60));
        assert_eq!(summary.highest_bpm, Some(120));
        // (70*60 + 90*180) / 240 = 85
        assert_eq!(summary.weighted_avg_bpm, Some(85));

        assert_eq!(HistorySummary::from_sessions(&[]), HistorySummary::default());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(3600), "60:00");
    }
}
