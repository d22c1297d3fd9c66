//! Twin Work Queues: one FIFO of dispatch packages per twin.

use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use twin_protocol::dispatch::DispatchPackage;
use twin_protocol::id::TwinId;
use twin_protocol::stimulus::ResourceKind;

/// Per-twin FIFO queues. A twin's entry disappears when its queue drains.
pub struct TwinWorkQueues<K> {
    queues: Mutex<HashMap<TwinId, VecDeque<DispatchPackage<K>>>>,
}

impl<K: ResourceKind> TwinWorkQueues<K> {
    /// Create an empty set of queues.
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Append a package to the back of its twin's queue.
    pub async fn enqueue(&self, package: DispatchPackage<K>) {
        self.queues
            .lock()
            .await
            .entry(package.twin.clone())
            .or_default()
            .push_back(package);
    }

    /// Take the package at the front of `twin`'s queue.
    pub async fn pop_front(&self, twin: &TwinId) -> Option<DispatchPackage<K>> {
        let mut queues = self.queues.lock().await;
        let queue = queues.get_mut(twin)?;
        let package = queue.pop_front();
        if queue.is_empty() {
            queues.remove(twin);
        }
        package
    }

    /// Return a package to the front of its twin's queue.
    pub async fn push_front(&self, package: DispatchPackage<K>) {
        self.queues
            .lock()
            .await
            .entry(package.twin.clone())
            .or_default()
            .push_front(package);
    }

    /// Twins with at least one waiting package, in id order.
    pub async fn waiting_twins(&self) -> Vec<TwinId> {
        let mut twins: Vec<TwinId> = self.queues.lock().await.keys().cloned().collect();
        twins.sort();
        twins
    }

    /// Number of packages waiting for `twin`.
    pub async fn len(&self, twin: &TwinId) -> usize {
        self.queues.lock().await.get(twin).map_or(0, VecDeque::len)
    }

    /// Number of packages waiting across all twins.
    pub async fn total(&self) -> usize {
        self.queues.lock().await.values().map(VecDeque::len).sum()
    }
}

impl<K: ResourceKind> Default for TwinWorkQueues<K> {
    fn default() -> Self {
        Self::new()
    }
}
