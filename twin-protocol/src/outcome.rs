//! Behaviour outcomes and the sets they are delivered in.

use crate::dispatch::DispatchKey;
use crate::id::TwinId;
use serde::{Deserialize, Serialize};

/// A resource produced by a behaviour, waiting to be encoded into an
/// egress payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputResource<K> {
    /// Resource kind.
    pub kind: K,
    /// Resource id within its kind.
    pub id: String,
    /// Resource body.
    pub body: serde_json::Value,
}

impl<K> OutputResource<K> {
    /// Create a new output resource.
    pub fn new(kind: K, id: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            kind,
            id: id.into(),
            body,
        }
    }
}

/// How a behaviour execution ended.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The behaviour ran and produced this outcome.
    Success,
    /// The behaviour (or its dispatch) failed.
    Failed,
    /// The twin lock lease ran out before the behaviour reported back.
    Expired,
}

/// One behaviour's result for one (stimulus, twin) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome<K> {
    /// Causality coordinates this outcome finishes.
    pub key: DispatchKey,
    /// Output resource, if the behaviour produced one.
    pub resource: Option<OutputResource<K>>,
    /// Forward the resource to every downstream forwarder of the twin
    /// instead of emitting a single default payload.
    pub echo_downstream: bool,
    /// How the execution ended.
    pub status: OutcomeStatus,
    /// Diagnostic text for failed or expired outcomes.
    pub detail: Option<String>,
}

impl<K> Outcome<K> {
    /// A successful outcome carrying a resource.
    pub fn success(key: DispatchKey, resource: OutputResource<K>) -> Self {
        Self {
            key,
            resource: Some(resource),
            echo_downstream: false,
            status: OutcomeStatus::Success,
            detail: None,
        }
    }

    /// A successful outcome with nothing to publish.
    pub fn empty(key: DispatchKey) -> Self {
        Self {
            key,
            resource: None,
            echo_downstream: false,
            status: OutcomeStatus::Success,
            detail: None,
        }
    }

    /// A failed outcome.
    pub fn failed(key: DispatchKey, detail: impl Into<String>) -> Self {
        Self {
            key,
            resource: None,
            echo_downstream: false,
            status: OutcomeStatus::Failed,
            detail: Some(detail.into()),
        }
    }

    /// An outcome recorded when a lock lease expired.
    pub fn expired(key: DispatchKey, detail: impl Into<String>) -> Self {
        Self {
            key,
            resource: None,
            echo_downstream: false,
            status: OutcomeStatus::Expired,
            detail: Some(detail.into()),
        }
    }

    /// Mark this outcome for echo to the twin's downstream forwarders.
    pub fn echoed(mut self) -> Self {
        self.echo_downstream = true;
        self
    }
}

/// All outcomes from a single behaviour execution, delivered together
/// with the signal that releases the twin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSet<K> {
    /// The dispatch this set answers. Its causality record is finished
    /// even if `outcomes` is empty.
    pub origin: DispatchKey,
    /// Outcomes produced by the execution.
    pub outcomes: Vec<Outcome<K>>,
}

impl<K> OutcomeSet<K> {
    /// An empty set answering `origin`.
    pub fn new(origin: DispatchKey) -> Self {
        Self {
            origin,
            outcomes: vec![],
        }
    }

    /// Append an outcome.
    pub fn with(mut self, outcome: Outcome<K>) -> Self {
        self.outcomes.push(outcome);
        self
    }

    /// The twin to release.
    pub fn twin(&self) -> &TwinId {
        &self.origin.twin
    }
}
