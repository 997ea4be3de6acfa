//! Progress snapshots for running thumbnail jobs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

const IDLE_MESSAGE: &str = "no thumbnail generation in progress";

/// Point-in-time report of a job, polled by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub completed: usize,
    pub total: usize,
    pub message: String,
    pub percentage: u32,
}

impl ProgressSnapshot {
    pub fn new(completed: usize, total: usize, message: impl Into<String>) -> Self {
        let percentage = if total > 0 {
            (completed.saturating_mul(100) / total) as u32
        } else {
            0
        };
        Self {
            completed,
            total,
            message: message.into(),
            percentage,
        }
    }

    /// Reported when no job is running for an item
    pub fn idle() -> Self {
        Self::new(0, 0, IDLE_MESSAGE)
    }
}

/// Last reported snapshot per catalog index
#[derive(Debug, Default)]
pub struct ProgressTracker {
    snapshots: Mutex<HashMap<usize, ProgressSnapshot>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: usize, snapshot: ProgressSnapshot) {
        self.map().insert(key, snapshot);
    }

    pub fn get(&self, key: usize) -> Option<ProgressSnapshot> {
        self.map().get(&key).cloned()
    }

    /// Current snapshot, or the idle one when nothing is tracked
    pub fn snapshot(&self, key: usize) -> ProgressSnapshot {
        self.get(key).unwrap_or_else(ProgressSnapshot::idle)
    }

    pub fn clear(&self, key: usize) {
        self.map().remove(&key);
    }

    fn map(&self) -> MutexGuard<'_, HashMap<usize, ProgressSnapshot>> {
        self.snapshots.lock().unwrap_or_else(|e| e.into_inner())
    }
}
