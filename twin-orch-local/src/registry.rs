//! Behaviour and forwarder registries.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use twin_protocol::behaviour::{BehaviourEndpoint, BehaviourRegistration};
use twin_protocol::id::{BehaviourId, ForwarderId, Topic, TwinId};
use twin_protocol::stimulus::ResourceKind;

struct Registered<K: ResourceKind> {
    registration: BehaviourRegistration<K>,
    topics: Vec<Topic>,
}

/// Maps each behaviour identity to its filters and execution endpoint.
///
/// Static topics are collected once, when the behaviour registers.
pub struct BehaviourRegistry<K: ResourceKind> {
    entries: RwLock<BTreeMap<BehaviourId, Registered<K>>>,
}

impl<K: ResourceKind> BehaviourRegistry<K> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register a behaviour, replacing (and returning) any previous
    /// registration under the same id.
    pub async fn register(
        &self,
        id: BehaviourId,
        registration: BehaviourRegistration<K>,
    ) -> Option<BehaviourRegistration<K>> {
        let topics = registration.inclusion.static_topics();
        self.entries
            .write()
            .await
            .insert(
                id,
                Registered {
                    registration,
                    topics,
                },
            )
            .map(|r| r.registration)
    }

    /// Remove a behaviour.
    pub async fn deregister(&self, id: &BehaviourId) -> Option<BehaviourRegistration<K>> {
        self.entries
            .write()
            .await
            .remove(id)
            .map(|r| r.registration)
    }

    /// Every registration, in behaviour id order.
    pub async fn snapshot(&self) -> Vec<(BehaviourId, BehaviourRegistration<K>)> {
        self.entries
            .read()
            .await
            .iter()
            .map(|(id, r)| (id.clone(), r.registration.clone()))
            .collect()
    }

    /// The execution endpoint of `id`.
    pub async fn endpoint(&self, id: &BehaviourId) -> Option<Arc<dyn BehaviourEndpoint<K>>> {
        self.entries
            .read()
            .await
            .get(id)
            .map(|r| Arc::clone(&r.registration.endpoint))
    }

    /// Static topics declared by `id` at registration.
    pub async fn topics(&self, id: &BehaviourId) -> Vec<Topic> {
        self.entries
            .read()
            .await
            .get(id)
            .map(|r| r.topics.clone())
            .unwrap_or_default()
    }

    /// De-duplicated union of every registered behaviour's topics, sorted.
    pub async fn subscriptions(&self) -> Vec<Topic> {
        let entries = self.entries.read().await;
        let topics: BTreeSet<&Topic> = entries.values().flat_map(|r| r.topics.iter()).collect();
        topics.into_iter().cloned().collect()
    }

    /// Number of registered behaviours.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no behaviour is registered.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl<K: ResourceKind> Default for BehaviourRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Downstream forwarders per twin, consulted for echo-downstream outcomes.
pub struct ForwarderRegistry {
    forwarders: RwLock<HashMap<TwinId, Vec<ForwarderId>>>,
}

impl ForwarderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            forwarders: RwLock::new(HashMap::new()),
        }
    }

    /// Add `forwarder` to `twin`. Returns `false` if it was already there.
    pub async fn register(&self, twin: TwinId, forwarder: ForwarderId) -> bool {
        let mut map = self.forwarders.write().await;
        let list = map.entry(twin).or_default();
        if list.contains(&forwarder) {
            return false;
        }
        list.push(forwarder);
        true
    }

    /// Remove `forwarder` from `twin`.
    pub async fn deregister(&self, twin: &TwinId, forwarder: &ForwarderId) -> bool {
        let mut map = self.forwarders.write().await;
        let Some(list) = map.get_mut(twin) else {
            return false;
        };
        let before = list.len();
        list.retain(|f| f != forwarder);
        let removed = list.len() != before;
        if list.is_empty() {
            map.remove(twin);
        }
        removed
    }

    /// Forwarders of `twin`, in registration order.
    pub async fn forwarders(&self, twin: &TwinId) -> Vec<ForwarderId> {
        self.forwarders
            .read()
            .await
            .get(twin)
            .cloned()
            .unwrap_or_default()
    }

    /// Forwarders for several twins at once. Twins without forwarders
    /// are left out.
    pub async fn for_twins<'a>(
        &self,
        twins: impl IntoIterator<Item = &'a TwinId>,
    ) -> HashMap<TwinId, Vec<ForwarderId>> {
        let map = self.forwarders.read().await;
        twins
            .into_iter()
            .filter_map(|t| map.get(t).map(|f| (t.clone(), f.clone())))
            .collect()
    }
}

impl Default for ForwarderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
