//! Canned inclusion/exclusion filters and an encoder that can be told to fail.

use crate::behaviour::{ExclusionFilter, InclusionFilter};
use crate::egress::ResourceEncoder;
use crate::error::EncodeError;
use crate::id::{Topic, TwinId};
use crate::outcome::OutputResource;
use crate::stimulus::{ResourceKind, Stimulus};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Matches every stimulus to the same fixed list of twins.
pub struct FixedTwins {
    topics: Vec<Topic>,
    twins: Vec<TwinId>,
}

impl FixedTwins {
    /// Match every stimulus to `twins`.
    pub fn new(twins: impl IntoIterator<Item = TwinId>) -> Self {
        Self {
            topics: vec![],
            twins: twins.into_iter().collect(),
        }
    }

    /// Declare static topics.
    pub fn with_topics(mut self, topics: impl IntoIterator<Item = Topic>) -> Self {
        self.topics = topics.into_iter().collect();
        self
    }
}

#[async_trait]
impl<K: ResourceKind> InclusionFilter<K> for FixedTwins {
    fn static_topics(&self) -> Vec<Topic> {
        self.topics.clone()
    }

    async fn dynamic_match(&self, _stimulus: &Stimulus<K>) -> Vec<TwinId> {
        self.twins.clone()
    }
}

/// Routes stimuli to twins by resource kind. Kinds with no entry match
/// nothing. Each routed kind is also declared as a static topic.
pub struct ByKind<K> {
    routes: HashMap<K, Vec<TwinId>>,
}

impl<K: ResourceKind> ByKind<K> {
    /// An empty router.
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Route `kind` to `twins`.
    pub fn route(mut self, kind: K, twins: impl IntoIterator<Item = TwinId>) -> Self {
        self.routes.entry(kind).or_default().extend(twins);
        self
    }
}

impl<K: ResourceKind> Default for ByKind<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K: ResourceKind> InclusionFilter<K> for ByKind<K> {
    fn static_topics(&self) -> Vec<Topic> {
        self.routes.keys().map(|k| Topic::new(k.to_string())).collect()
    }

    async fn dynamic_match(&self, stimulus: &Stimulus<K>) -> Vec<TwinId> {
        self.routes.get(stimulus.kind()).cloned().unwrap_or_default()
    }
}

/// Reads the target twins from a string-array field of the stimulus
/// content, e.g. `{"twins": ["room-1", "alice"]}`.
pub struct ContentTwins {
    field: String,
}

impl ContentTwins {
    /// Read twins from `field`.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

#[async_trait]
impl<K: ResourceKind> InclusionFilter<K> for ContentTwins {
    fn static_topics(&self) -> Vec<Topic> {
        vec![]
    }

    async fn dynamic_match(&self, stimulus: &Stimulus<K>) -> Vec<TwinId> {
        stimulus
            .content()
            .get(&self.field)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(TwinId::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Admits only the listed twins.
pub struct AllowList {
    allowed: HashSet<TwinId>,
}

impl AllowList {
    /// Admit exactly `twins`.
    pub fn new(twins: impl IntoIterator<Item = TwinId>) -> Self {
        Self {
            allowed: twins.into_iter().collect(),
        }
    }
}

#[async_trait]
impl<K: ResourceKind> ExclusionFilter<K> for AllowList {
    async fn admit(&self, _stimulus: &Stimulus<K>, twin: &TwinId) -> bool {
        self.allowed.contains(twin)
    }
}

/// Encodes as JSON, except for resources whose id is on the poison list.
pub struct FailingEncoder {
    poisoned: HashSet<String>,
}

impl FailingEncoder {
    /// Fail for every resource id in `ids`.
    pub fn poisoned(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            poisoned: ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl<K: ResourceKind> ResourceEncoder<K> for FailingEncoder {
    fn encode(&self, resource: &OutputResource<K>) -> Result<String, EncodeError> {
        if self.poisoned.contains(&resource.id) {
            return Err(EncodeError::Serialization(format!(
                "cannot encode {} {}",
                resource.kind, resource.id
            )));
        }
        Ok(serde_json::to_string(&resource.body)?)
    }
}
