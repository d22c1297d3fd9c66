//! Stimulus Store: stimuli by id, indexed by their unit of work.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use twin_protocol::id::{StimulusId, UowId};
use twin_protocol::stimulus::{ResourceKind, Stimulus};

struct Index<K> {
    by_id: HashMap<StimulusId, Arc<Stimulus<K>>>,
    by_uow: HashMap<UowId, HashSet<StimulusId>>,
}

/// Holds derived stimuli until their unit of work is purged.
///
/// Both maps live behind one lock so the id map and the per-uow index
/// can never disagree.
pub struct StimulusStore<K> {
    index: RwLock<Index<K>>,
}

impl<K: ResourceKind> StimulusStore<K> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            index: RwLock::new(Index {
                by_id: HashMap::new(),
                by_uow: HashMap::new(),
            }),
        }
    }

    /// Store a stimulus. Returns `None` if a stimulus with the same id is
    /// already stored; otherwise the shared handle to the stored copy.
    pub async fn insert(&self, stimulus: Stimulus<K>) -> Option<Arc<Stimulus<K>>> {
        let mut index = self.index.write().await;
        if index.by_id.contains_key(stimulus.id()) {
            return None;
        }
        let stimulus = Arc::new(stimulus);
        index
            .by_uow
            .entry(stimulus.uow().clone())
            .or_default()
            .insert(stimulus.id().clone());
        index
            .by_id
            .insert(stimulus.id().clone(), Arc::clone(&stimulus));
        Some(stimulus)
    }

    /// Look up a stimulus.
    pub async fn get(&self, id: &StimulusId) -> Option<Arc<Stimulus<K>>> {
        self.index.read().await.by_id.get(id).cloned()
    }

    /// Every stimulus derived from `uow`, oldest first.
    pub async fn for_uow(&self, uow: &UowId) -> Vec<Arc<Stimulus<K>>> {
        let index = self.index.read().await;
        let mut stimuli: Vec<_> = index
            .by_uow
            .get(uow)
            .into_iter()
            .flatten()
            .filter_map(|id| index.by_id.get(id).cloned())
            .collect();
        stimuli.sort_by(|a, b| {
            a.created_at()
                .cmp(&b.created_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        stimuli
    }

    /// Remove a single stimulus and its index entry.
    pub async fn remove(&self, id: &StimulusId) -> Option<Arc<Stimulus<K>>> {
        let mut index = self.index.write().await;
        let stimulus = index.by_id.remove(id)?;
        if let Some(ids) = index.by_uow.get_mut(stimulus.uow()) {
            ids.remove(id);
            if ids.is_empty() {
                index.by_uow.remove(stimulus.uow());
            }
        }
        Some(stimulus)
    }

    /// Remove every stimulus derived from `uow`, returning their ids.
    pub async fn remove_uow(&self, uow: &UowId) -> Vec<StimulusId> {
        let mut index = self.index.write().await;
        let ids: Vec<StimulusId> = index
            .by_uow
            .remove(uow)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        for id in &ids {
            index.by_id.remove(id);
        }
        ids
    }

    /// Number of stored stimuli.
    pub async fn len(&self) -> usize {
        self.index.read().await.by_id.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.index.read().await.by_id.is_empty()
    }
}

impl<K: ResourceKind> Default for StimulusStore<K> {
    fn default() -> Self {
        Self::new()
    }
}
