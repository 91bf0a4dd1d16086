//! # Requeue Schedule
//!
//! Side channel through which a reconciliation tells the controller when the
//! same token should be reconciled next.
//!
//! Entries are last-write-wins per key and are never removed by the reconciler
//! itself. The store is sharded so pushes for different tokens rarely share a lock.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

const DEFAULT_SHARDS: usize = 16;

/// A pushed wake-up request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// Requested delay at push time
    pub after: Duration,
    pub pushed_at: Instant,
}

impl ScheduleEntry {
    /// Delay still left from now
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.after.saturating_sub(self.pushed_at.elapsed())
    }
}

/// Per-key "reconcile again after" store
pub trait RequeueStore: Send + Sync {
    /// Record that `key` should be reconciled again after `after`, replacing any prior entry
    fn push(&self, key: &str, after: Duration);

    fn get(&self, key: &str) -> Option<ScheduleEntry>;

    /// Remove and return the entry for `key`
    fn take(&self, key: &str) -> Option<ScheduleEntry>;
}

/// Convert a signed delay into a pushable one, clamping negatives to zero
#[must_use]
pub fn clamp_to_zero(delay: chrono::Duration) -> Duration {
    delay.to_std().unwrap_or(Duration::ZERO)
}

/// Sharded in-memory [`RequeueStore`]
#[derive(Debug)]
pub struct ScheduleStore {
    shards: Vec<Mutex<HashMap<String, ScheduleEntry>>>,
}

impl Default for ScheduleStore {
    fn default() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }
}

impl ScheduleStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with `shards` independently locked partitions (at least one)
    #[must_use]
    pub fn with_shards(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    /// Number of keys with an entry
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn shard(&self, key: &str) -> &Mutex<HashMap<String, ScheduleEntry>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }
}

impl RequeueStore for ScheduleStore {
    fn push(&self, key: &str, after: Duration) {
        let entry = ScheduleEntry {
            after,
            pushed_at: Instant::now(),
        };
        self.shard(key)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), entry);
    }

    fn get(&self, key: &str) -> Option<ScheduleEntry> {
        self.shard(key)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }

    fn take(&self, key: &str) -> Option<ScheduleEntry> {
        self.shard(key)
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }
}
