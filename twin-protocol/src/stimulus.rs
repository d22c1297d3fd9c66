//! Stimuli: the normalized triggers derived from a unit of work.

use crate::id::{StimulusId, UowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// The twin/resource-type enumeration the engine is parameterized over.
///
/// A deployment bridging a resource directory and a chat protocol would
/// use an enum naming the resource and event kinds it understands. The
/// trait has a blanket implementation, so any suitable type qualifies.
pub trait ResourceKind:
    Clone + Eq + Hash + fmt::Debug + fmt::Display + Serialize + Send + Sync + 'static
{
}

impl<T> ResourceKind for T where
    T: Clone + Eq + Hash + fmt::Debug + fmt::Display + Serialize + Send + Sync + 'static
{
}

/// A normalized trigger derived from a unit of work's content.
///
/// Stimuli are immutable once created; the engine shares them behind
/// `Arc` between the stimulus store and every dispatch package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stimulus<K> {
    id: StimulusId,
    kind: K,
    natural_id: String,
    created_at: DateTime<Utc>,
    uow: UowId,
    content: serde_json::Value,
}

impl<K: ResourceKind> Stimulus<K> {
    /// Create a stimulus for `uow` with a generated store id and the
    /// current time as its creation timestamp.
    pub fn new(
        uow: UowId,
        kind: K,
        natural_id: impl Into<String>,
        content: serde_json::Value,
    ) -> Self {
        Self {
            id: StimulusId::generate(),
            kind,
            natural_id: natural_id.into(),
            created_at: Utc::now(),
            uow,
            content,
        }
    }

    /// Replace the generated store id.
    pub fn with_id(mut self, id: StimulusId) -> Self {
        self.id = id;
        self
    }

    /// Store id.
    pub fn id(&self) -> &StimulusId {
        &self.id
    }

    /// Resource or event kind.
    pub fn kind(&self) -> &K {
        &self.kind
    }

    /// Natural id of the resource or event within its kind.
    pub fn natural_id(&self) -> &str {
        &self.natural_id
    }

    /// Domain identity: (kind, natural id).
    pub fn identity(&self) -> (&K, &str) {
        (&self.kind, &self.natural_id)
    }

    /// When the stimulus was derived.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The unit of work this stimulus was derived from.
    pub fn uow(&self) -> &UowId {
        &self.uow
    }

    /// Derived content handed to behaviours.
    pub fn content(&self) -> &serde_json::Value {
        &self.content
    }
}
