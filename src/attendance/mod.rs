// SPDX-License-Identifier: MPL-2.0

//! Attendance event recording: debounced tripwire crossings persisted to
//! a durable store, with local ndjson spill and exponential backoff when
//! that store is unavailable.

pub mod store;

use crate::config::DirectionPolicy;
use crate::errors::RecorderError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use store::{AttendanceStore, SpillFile};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttendanceEvent {
    pub employee_id: String,
    pub camera_id: String,
    pub tripwire_id: String,
    pub direction: DirectionPolicy,
    pub timestamp_unix_ms: i64,
}

struct DebounceState {
    last_recorded: HashMap<(String, String, DirectionPolicy), i64>,
}

/// Records tripwire crossings as attendance events, collapsing repeated
/// crossings by the same employee, through the same camera, in the same
/// direction, within `debounce_window` into a single event.
pub struct AttendanceRecorder {
    store: Box<dyn AttendanceStore>,
    spill: SpillFile,
    debounce_window: Duration,
    backoff_ceiling: Duration,
    debounce: Mutex<DebounceState>,
    consecutive_failures: Mutex<u32>,
}

impl AttendanceRecorder {
    pub fn new(store: Box<dyn AttendanceStore>, spill_path: &std::path::Path, debounce_window: Duration, backoff_ceiling: Duration) -> Self {
        Self {
            store,
            spill: SpillFile::new(spill_path),
            debounce_window,
            backoff_ceiling,
            debounce: Mutex::new(DebounceState { last_recorded: HashMap::new() }),
            consecutive_failures: Mutex::new(0),
        }
    }

    /// Record a crossing if it isn't within the debounce window of the same
    /// employee/camera/direction triple's last recorded crossing. On a
    /// store failure, retries with exponential backoff capped at
    /// `backoff_ceiling`; once a retry at the capped backoff still fails,
    /// gives up, spills the event to disk, and returns
    /// `RecorderError::StoreUnavailable`.
    pub async fn record(
        &self,
        employee_id: &str,
        camera_id: &str,
        tripwire_id: &str,
        direction: DirectionPolicy,
        now_unix_ms: i64,
    ) -> Result<bool, RecorderError> {
        let key = (employee_id.to_string(), camera_id.to_string(), direction);
        {
            let mut debounce = self.debounce.lock().unwrap();
            if let Some(&last) = debounce.last_recorded.get(&key) {
                if now_unix_ms - last < self.debounce_window.as_millis() as i64 {
                    return Ok(false);
                }
            }
            debounce.last_recorded.insert(key, now_unix_ms);
        }

        let event = AttendanceEvent {
            employee_id: employee_id.to_string(),
            camera_id: camera_id.to_string(),
            tripwire_id: tripwire_id.to_string(),
            direction,
            timestamp_unix_ms: now_unix_ms,
        };

        let mut attempt: u32 = 0;
        loop {
            match self.store.append(&event) {
                Ok(()) => {
                    *self.consecutive_failures.lock().unwrap() = 0;
                    info!(employee_id, tripwire_id, ?direction, "attendance event recorded");
                    return Ok(true);
                }
                Err(e) => {
                    let previous_backoff = self.backoff_for(attempt);
                    attempt += 1;
                    *self.consecutive_failures.lock().unwrap() = attempt;

                    if attempt > 1 && previous_backoff >= self.backoff_ceiling {
                        warn!(
                            error = %e,
                            attempts = attempt,
                            "attendance store still unavailable after exhausting backoff ceiling; spilling to disk"
                        );
                        self.spill.append(&event)?;
                        return Err(RecorderError::StoreUnavailable(e.to_string()));
                    }

                    let backoff = self.backoff_for(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        backoff_secs = backoff.as_secs(),
                        "attendance store append failed; retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    fn backoff_for(&self, consecutive_failures: u32) -> Duration {
        let exp = consecutive_failures.min(10);
        let candidate = Duration::from_secs(1) * 2u32.saturating_pow(exp);
        candidate.min(self.backoff_ceiling)
    }

    /// Replay any spilled events into the durable store, for use once the
    /// store is known to have recovered.
    pub fn replay_spill(&self) -> usize {
        let events = self.spill.drain();
        let mut replayed = 0;
        for event in &events {
            if self.store.append(event).is_ok() {
                replayed += 1;
            }
        }
        replayed
    }

    pub fn recent_for(&self, employee_id: &str) -> Vec<AttendanceEvent> {
        self.store.list_by_employee(employee_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::InMemoryStore;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn scratch_path(name: &str) -> std::path::PathBuf {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("fts-recorder-test-{}-{}-{}.ndjson", std::process::id(), n, name))
    }

    fn recorder(name: &str) -> AttendanceRecorder {
        AttendanceRecorder::new(
            Box::new(InMemoryStore::default()),
            &scratch_path(name),
            Duration::from_secs(300),
            Duration::from_secs(30),
        )
    }

    /// A store that always fails `append`, for exercising the retry/backoff
    /// and give-up-and-spill path.
    #[derive(Default)]
    struct AlwaysFailingStore;

    impl AttendanceStore for AlwaysFailingStore {
        fn append(&self, _event: &AttendanceEvent) -> Result<(), RecorderError> {
            Err(RecorderError::StoreUnavailable("connection refused".to_string()))
        }

        fn list_by_employee(&self, _employee_id: &str) -> Vec<AttendanceEvent> {
            Vec::new()
        }

        fn list_by_range(&self, _from_unix_ms: i64, _to_unix_ms: i64) -> Vec<AttendanceEvent> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn test_first_crossing_is_recorded() {
        let recorder = recorder("first");
        assert!(recorder.record("alice", "cam-a", "line-1", DirectionPolicy::Enter, 1_000_000).await.unwrap());
        assert_eq!(recorder.recent_for("alice").len(), 1);
    }

    #[tokio::test]
    async fn test_second_crossing_within_window_is_debounced() {
        let recorder = recorder("debounce");
        recorder.record("alice", "cam-a", "line-1", DirectionPolicy::Enter, 1_000_000).await.unwrap();
        let recorded = recorder.record("alice", "cam-a", "line-1", DirectionPolicy::Enter, 1_010_000).await.unwrap();
        assert!(!recorded);
        assert_eq!(recorder.recent_for("alice").len(), 1);
    }

    #[tokio::test]
    async fn test_crossing_after_window_elapses_is_recorded() {
        let recorder = recorder("after-window");
        recorder.record("alice", "cam-a", "line-1", DirectionPolicy::Enter, 0).await.unwrap();
        recorder.record("alice", "cam-a", "line-1", DirectionPolicy::Exit, 301_000).await.unwrap();
        assert_eq!(recorder.recent_for("alice").len(), 2);
    }

    /// An Enter and an Exit crossing on the same tripwire within the
    /// debounce window are distinct directions of travel and must both be
    /// recorded, not collapsed into one.
    #[tokio::test]
    async fn test_opposite_directions_within_window_both_recorded() {
        let recorder = recorder("opposite-directions");
        recorder.record("alice", "cam-a", "line-1", DirectionPolicy::Enter, 1_000_000).await.unwrap();
        let recorded = recorder.record("alice", "cam-a", "line-1", DirectionPolicy::Exit, 1_010_000).await.unwrap();
        assert!(recorded);
        assert_eq!(recorder.recent_for("alice").len(), 2);
    }

    #[test]
    fn test_backoff_caps_at_ceiling() {
        let recorder = recorder("backoff");
        assert_eq!(recorder.backoff_for(1), Duration::from_secs(2));
        assert_eq!(recorder.backoff_for(20), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_unavailable_after_ceiling_spills_and_errors() {
        let store = AlwaysFailingStore::default();
        let recorder = AttendanceRecorder::new(
            Box::new(store),
            &scratch_path("store-unavailable"),
            Duration::from_secs(300),
            Duration::from_millis(10),
        );

        let result = recorder.record("alice", "cam-a", "line-1", DirectionPolicy::Enter, 1_000_000).await;

        assert!(matches!(result, Err(RecorderError::StoreUnavailable(_))));
        assert_eq!(recorder.replay_spill(), 0);
    }
}
