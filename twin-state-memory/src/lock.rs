//! Twin Lock Table: at most one behaviour executing per twin.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use twin_protocol::dispatch::DispatchKey;
use twin_protocol::id::{BehaviourId, TwinId};

/// Who holds a twin, since when, and until when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockEntry {
    /// The behaviour executing against the twin.
    pub behaviour: BehaviourId,
    /// The dispatch that took the lock.
    pub key: DispatchKey,
    /// When the lock was taken.
    pub acquired_at: DateTime<Utc>,
    /// When the lock may be reclaimed. `None` holds it until released.
    pub lease_deadline: Option<DateTime<Utc>>,
}

/// Maps each locked twin to its holder.
pub struct TwinLockTable {
    locks: Mutex<HashMap<TwinId, LockEntry>>,
}

impl TwinLockTable {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Lock `twin` for `entry` if it is free. Returns whether the lock was
    /// taken.
    pub async fn try_lock(&self, twin: &TwinId, entry: LockEntry) -> bool {
        let mut locks = self.locks.lock().await;
        if locks.contains_key(twin) {
            return false;
        }
        locks.insert(twin.clone(), entry);
        true
    }

    /// Release `twin`, returning the previous holder.
    pub async fn unlock(&self, twin: &TwinId) -> Option<LockEntry> {
        self.locks.lock().await.remove(twin)
    }

    /// Release `twin` only if it is held for `key`.
    pub async fn unlock_if_held_by(&self, twin: &TwinId, key: &DispatchKey) -> Option<LockEntry> {
        let mut locks = self.locks.lock().await;
        match locks.get(twin) {
            Some(entry) if &entry.key == key => locks.remove(twin),
            _ => None,
        }
    }

    /// Current holder of `twin`.
    pub async fn holder(&self, twin: &TwinId) -> Option<LockEntry> {
        self.locks.lock().await.get(twin).cloned()
    }

    /// Whether `twin` is locked.
    pub async fn is_locked(&self, twin: &TwinId) -> bool {
        self.locks.lock().await.contains_key(twin)
    }

    /// Remove and return every lock whose lease ended at or before `now`.
    pub async fn take_expired(&self, now: DateTime<Utc>) -> Vec<(TwinId, LockEntry)> {
        let mut locks = self.locks.lock().await;
        let expired: Vec<TwinId> = locks
            .iter()
            .filter(|(_, e)| e.lease_deadline.is_some_and(|d| d <= now))
            .map(|(t, _)| t.clone())
            .collect();
        let mut out: Vec<(TwinId, LockEntry)> = expired
            .into_iter()
            .filter_map(|t| locks.remove(&t).map(|e| (t, e)))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Number of locked twins.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    /// Whether no twin is locked.
    pub async fn is_empty(&self) -> bool {
        self.locks.lock().await.is_empty()
    }
}

impl Default for TwinLockTable {
    fn default() -> Self {
        Self::new()
    }
}
