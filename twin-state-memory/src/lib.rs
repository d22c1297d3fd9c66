#![deny(missing_docs)]
//! In-memory stores for the twin orchestration engine.
//!
//! Each store is a `HashMap` behind a tokio lock and is safe to share
//! across tasks. Nothing survives a restart. [`EngineStores`] bundles one
//! of each so the orchestrator and tests can share the same instances.

pub mod causality;
pub mod lock;
pub mod outcome;
pub mod queue;
pub mod stimulus;
pub mod work;

pub use causality::{CausalityStatus, CausalityTracker};
pub use lock::{LockEntry, TwinLockTable};
pub use outcome::OutcomeStore;
pub use queue::TwinWorkQueues;
pub use stimulus::StimulusStore;
pub use work::{WorkEntry, WorkRegistry};

use std::sync::Arc;
use twin_protocol::stimulus::ResourceKind;

/// One shared instance of every store the engine reads and writes.
pub struct EngineStores<K> {
    /// Units of work and their activity records.
    pub work: Arc<WorkRegistry>,
    /// Stimuli by id and by unit of work.
    pub stimuli: Arc<StimulusStore<K>>,
    /// Outcomes awaiting aggregation.
    pub outcomes: Arc<OutcomeStore<K>>,
    /// Completion records.
    pub causality: Arc<CausalityTracker>,
    /// Per-twin FIFO queues.
    pub queues: Arc<TwinWorkQueues<K>>,
    /// Per-twin locks.
    pub locks: Arc<TwinLockTable>,
}

impl<K: ResourceKind> EngineStores<K> {
    /// Fresh, empty stores.
    pub fn new() -> Self {
        Self {
            work: Arc::new(WorkRegistry::new()),
            stimuli: Arc::new(StimulusStore::new()),
            outcomes: Arc::new(OutcomeStore::new()),
            causality: Arc::new(CausalityTracker::new()),
            queues: Arc::new(TwinWorkQueues::new()),
            locks: Arc::new(TwinLockTable::new()),
        }
    }
}

impl<K: ResourceKind> Default for EngineStores<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Clone for EngineStores<K> {
    fn clone(&self) -> Self {
        Self {
            work: Arc::clone(&self.work),
            stimuli: Arc::clone(&self.stimuli),
            outcomes: Arc::clone(&self.outcomes),
            causality: Arc::clone(&self.causality),
            queues: Arc::clone(&self.queues),
            locks: Arc::clone(&self.locks),
        }
    }
}
