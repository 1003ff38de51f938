// SPDX-License-Identifier: MPL-2.0

//! Durable attendance storage, with an ndjson spill file as a fallback
//! when the durable store is unavailable.

use super::AttendanceEvent;
use crate::errors::RecorderError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Durable destination for attendance events.
///
/// A process that needs a real backing store (a database, an event bus)
/// implements this trait; [`InMemoryStore`] is the default used when the
/// spec's Non-goal of excluding a specific persistence technology leaves
/// the choice open.
pub trait AttendanceStore: Send + Sync {
    fn append(&self, event: &AttendanceEvent) -> Result<(), RecorderError>;
    fn list_by_employee(&self, employee_id: &str) -> Vec<AttendanceEvent>;
    fn list_by_range(&self, start_unix_ms: i64, end_unix_ms: i64) -> Vec<AttendanceEvent>;
}

/// Process-local store. Durable across the process lifetime, not across
/// restarts — a real deployment swaps this for a database-backed
/// `AttendanceStore` without changing the recorder.
#[derive(Default)]
pub struct InMemoryStore {
    events: Mutex<Vec<AttendanceEvent>>,
}

impl AttendanceStore for InMemoryStore {
    fn append(&self, event: &AttendanceEvent) -> Result<(), RecorderError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }

    fn list_by_employee(&self, employee_id: &str) -> Vec<AttendanceEvent> {
        self.events.lock().unwrap().iter().filter(|e| e.employee_id == employee_id).cloned().collect()
    }

    fn list_by_range(&self, start_unix_ms: i64, end_unix_ms: i64) -> Vec<AttendanceEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.timestamp_unix_ms >= start_unix_ms && e.timestamp_unix_ms < end_unix_ms)
            .cloned()
            .collect()
    }
}

/// Appends newline-delimited JSON attendance events to a local file when
/// the durable store rejects a write.
pub struct SpillFile {
    path: PathBuf,
}

impl SpillFile {
    pub fn new(path: &Path) -> Self {
        Self { path: path.to_path_buf() }
    }

    pub fn append(&self, event: &AttendanceEvent) -> Result<(), RecorderError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| RecorderError::SpillFull(e.to_string()))?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| RecorderError::SpillFull(e.to_string()))?;

        let line = serde_json::to_string(event).map_err(|e| RecorderError::SpillFull(e.to_string()))?;
        writeln!(file, "{line}").map_err(|e| RecorderError::SpillFull(e.to_string()))?;
        warn!(employee_id = %event.employee_id, path = %self.path.display(), "attendance event spilled to disk");
        Ok(())
    }

    /// Read back every event in the spill file, for a later replay into
    /// the durable store once it recovers.
    pub fn drain(&self) -> Vec<AttendanceEvent> {
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        contents.lines().filter_map(|line| serde_json::from_str(line).ok()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DirectionPolicy;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn scratch_path(name: &str) -> PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("fts-spill-test-{}-{}-{}.ndjson", std::process::id(), n, name))
    }

    fn event(employee_id: &str, ts: i64) -> AttendanceEvent {
        AttendanceEvent {
            employee_id: employee_id.to_string(),
            camera_id: "cam-a".to_string(),
            tripwire_id: "line-1".to_string(),
            direction: DirectionPolicy::Enter,
            timestamp_unix_ms: ts,
        }
    }

    #[test]
    fn test_in_memory_store_filters_by_employee() {
        let store = InMemoryStore::default();
        store.append(&event("alice", 1000)).unwrap();
        store.append(&event("bob", 1001)).unwrap();
        assert_eq!(store.list_by_employee("alice").len(), 1);
    }

    #[test]
    fn test_in_memory_store_filters_by_range() {
        let store = InMemoryStore::default();
        store.append(&event("alice", 1000)).unwrap();
        store.append(&event("alice", 5000)).unwrap();
        assert_eq!(store.list_by_range(0, 2000).len(), 1);
    }

    #[test]
    fn test_spill_file_round_trip() {
        let path = scratch_path("roundtrip");
        let spill = SpillFile::new(&path);
        spill.append(&event("alice", 1000)).unwrap();
        spill.append(&event("bob", 2000)).unwrap();

        let drained = spill.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].employee_id, "alice");
        let _ = std::fs::remove_file(&path);
    }
}
