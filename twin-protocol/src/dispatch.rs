//! Dispatch packages: one behaviour invocation for one twin.

use crate::id::{BehaviourId, StimulusId, TwinId, UowId};
use crate::outcome::{Outcome, OutcomeSet, OutputResource};
use crate::stimulus::{ResourceKind, Stimulus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// The causality coordinates of one behaviour invocation.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct DispatchKey {
    /// Owning unit of work.
    pub uow: UowId,
    /// Triggering stimulus.
    pub stimulus: StimulusId,
    /// Twin the behaviour acts on.
    pub twin: TwinId,
    /// Behaviour invoked.
    pub behaviour: BehaviourId,
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.uow, self.stimulus, self.twin, self.behaviour
        )
    }
}

/// Everything needed to invoke a behaviour for a twin. This is the unit
/// that sits on a twin's work queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchPackage<K> {
    /// Owning unit of work.
    pub uow: UowId,
    /// Target twin.
    pub twin: TwinId,
    /// Target behaviour.
    pub behaviour: BehaviourId,
    /// The triggering stimulus.
    pub stimulus: Arc<Stimulus<K>>,
}

impl<K: ResourceKind> DispatchPackage<K> {
    /// Build a package for `twin` and `behaviour` from a stored stimulus.
    pub fn new(twin: TwinId, behaviour: BehaviourId, stimulus: Arc<Stimulus<K>>) -> Self {
        Self {
            uow: stimulus.uow().clone(),
            twin,
            behaviour,
            stimulus,
        }
    }

    /// The causality coordinates of this package.
    pub fn key(&self) -> DispatchKey {
        DispatchKey {
            uow: self.uow.clone(),
            stimulus: self.stimulus.id().clone(),
            twin: self.twin.clone(),
            behaviour: self.behaviour.clone(),
        }
    }

    /// A successful outcome for this package carrying `resource`.
    pub fn outcome(&self, resource: OutputResource<K>) -> Outcome<K> {
        Outcome::success(self.key(), resource)
    }

    /// An empty outcome set answering this package.
    pub fn outcome_set(&self) -> OutcomeSet<K> {
        OutcomeSet::new(self.key())
    }
}
