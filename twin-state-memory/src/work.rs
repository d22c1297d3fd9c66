//! Work Registry: each unit of work alongside its activity record.

use std::collections::HashMap;
use tokio::sync::RwLock;
use twin_protocol::id::UowId;
use twin_protocol::work::{ActivityRecord, UnitOfWork};

/// A registered unit of work and the record that routes its result.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkEntry {
    /// The unit of work.
    pub uow: UnitOfWork,
    /// Its job card and status; carries the originating node.
    pub record: ActivityRecord,
}

/// Holds every in-flight unit of work from registration until purge.
pub struct WorkRegistry {
    entries: RwLock<HashMap<UowId, WorkEntry>>,
}

impl WorkRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a unit of work. Returns `false` and leaves the existing
    /// entry untouched if the id is already registered.
    pub async fn register(&self, uow: UnitOfWork, record: ActivityRecord) -> bool {
        let mut entries = self.entries.write().await;
        if entries.contains_key(&uow.id) {
            return false;
        }
        entries.insert(uow.id.clone(), WorkEntry { uow, record });
        true
    }

    /// Snapshot of an entry.
    pub async fn get(&self, id: &UowId) -> Option<WorkEntry> {
        self.entries.read().await.get(id).cloned()
    }

    /// Whether `id` is registered.
    pub async fn contains(&self, id: &UowId) -> bool {
        self.entries.read().await.contains_key(id)
    }

    /// Mutate an entry in place. Returns `None` if `id` is unknown.
    pub async fn update<R>(&self, id: &UowId, f: impl FnOnce(&mut WorkEntry) -> R) -> Option<R> {
        self.entries.write().await.get_mut(id).map(f)
    }

    /// Remove an entry.
    pub async fn remove(&self, id: &UowId) -> Option<WorkEntry> {
        self.entries.write().await.remove(id)
    }

    /// Ids of every registered unit of work.
    pub async fn ids(&self) -> Vec<UowId> {
        self.entries.read().await.keys().cloned().collect()
    }

    /// Number of registered units of work.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the registry is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl Default for WorkRegistry {
    fn default() -> Self {
        Self::new()
    }
}
