//! Outcome Store: behaviour outcomes keyed by the stimulus that produced them.

use std::collections::HashMap;
use tokio::sync::RwLock;
use twin_protocol::id::StimulusId;
use twin_protocol::outcome::Outcome;
use twin_protocol::stimulus::ResourceKind;

/// Accumulates outcomes until aggregation takes them.
pub struct OutcomeStore<K> {
    by_stimulus: RwLock<HashMap<StimulusId, Vec<Outcome<K>>>>,
}

impl<K: ResourceKind> OutcomeStore<K> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            by_stimulus: RwLock::new(HashMap::new()),
        }
    }

    /// Record outcomes, preserving arrival order per stimulus.
    pub async fn record(&self, outcomes: impl IntoIterator<Item = Outcome<K>>) {
        let mut map = self.by_stimulus.write().await;
        for outcome in outcomes {
            map.entry(outcome.key.stimulus.clone())
                .or_default()
                .push(outcome);
        }
    }

    /// Snapshot of the outcomes recorded for `stimulus`.
    pub async fn for_stimulus(&self, stimulus: &StimulusId) -> Vec<Outcome<K>> {
        self.by_stimulus
            .read()
            .await
            .get(stimulus)
            .cloned()
            .unwrap_or_default()
    }

    /// Remove and return every outcome for `stimuli`, in the order given.
    pub async fn take<'a>(
        &self,
        stimuli: impl IntoIterator<Item = &'a StimulusId>,
    ) -> Vec<Outcome<K>> {
        let mut map = self.by_stimulus.write().await;
        stimuli
            .into_iter()
            .filter_map(|id| map.remove(id))
            .flatten()
            .collect()
    }

    /// Total number of stored outcomes.
    pub async fn len(&self) -> usize {
        self.by_stimulus.read().await.values().map(Vec::len).sum()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.by_stimulus.read().await.is_empty()
    }
}

impl<K: ResourceKind> Default for OutcomeStore<K> {
    fn default() -> Self {
        Self::new()
    }
}
