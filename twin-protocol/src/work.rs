//! Units of work, their activity records, and the packet they leave in.

use crate::id::{ForwarderId, NodeRef, UowId};
use serde::{Deserialize, Serialize};

/// What the engine concluded about a unit of work.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingOutcome {
    /// Registered, not yet aggregated.
    NotStarted,
    /// Every outcome was encoded into the egress payloads.
    Success,
    /// Encoding an outcome failed; see the failure description.
    Failed,
    /// At least one behaviour execution failed or expired, so some
    /// outcomes are missing from the egress payloads.
    Incomplete,
    /// No twin was interested in anything the unit of work carried.
    NoProcessingRequired,
}

/// Lifecycle status carried on an [`ActivityRecord`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    /// Waiting to be worked on.
    Queued,
    /// Being processed.
    Active,
    /// Processing finished and the result was published.
    Finished,
    /// Processing finished with a failure.
    Failed,
}

/// Describes what a payload carries and, for forwarded payloads, where
/// it is headed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadDescriptor {
    /// Content kind label, e.g. the resource kind of an outcome.
    pub kind: String,
    /// Downstream forwarder this payload is addressed to, if any.
    pub destination: Option<ForwarderId>,
}

/// A single ingress or egress payload in wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// What the body contains.
    pub descriptor: PayloadDescriptor,
    /// Wire-form body.
    pub body: String,
}

impl Payload {
    /// A payload with no downstream destination.
    pub fn new(kind: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            descriptor: PayloadDescriptor {
                kind: kind.into(),
                destination: None,
            },
            body: body.into(),
        }
    }

    /// A payload addressed to a downstream forwarder.
    pub fn forwarded(
        kind: impl Into<String>,
        destination: ForwarderId,
        body: impl Into<String>,
    ) -> Self {
        Self {
            descriptor: PayloadDescriptor {
                kind: kind.into(),
                destination: Some(destination),
            },
            body: body.into(),
        }
    }
}

/// The top-level inbound item. It may yield many stimuli and fan out to
/// many behaviours, but it is published exactly once as a single result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitOfWork {
    /// Identity.
    pub id: UowId,
    /// The payload that arrived.
    pub ingress: Payload,
    /// Payloads assembled from behaviour outcomes during aggregation.
    #[serde(default)]
    pub egress: Vec<Payload>,
    /// Processing outcome.
    pub outcome: ProcessingOutcome,
    /// Diagnostic text when the outcome is not a clean success.
    pub failure: Option<String>,
}

impl UnitOfWork {
    /// Create a new unit of work with a generated id.
    pub fn new(ingress: Payload) -> Self {
        Self::with_id(UowId::generate(), ingress)
    }

    /// Create a new unit of work with a caller-chosen id.
    pub fn with_id(id: UowId, ingress: Payload) -> Self {
        Self {
            id,
            ingress,
            egress: vec![],
            outcome: ProcessingOutcome::NotStarted,
            failure: None,
        }
    }

    /// Whether aggregation has already decided an outcome.
    pub fn is_concluded(&self) -> bool {
        self.outcome != ProcessingOutcome::NotStarted
    }
}

/// Job card and status element for a unit of work.
///
/// The originating node reference is what the result is routed back
/// through when the unit of work is published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Current status.
    pub current: ActivityStatus,
    /// Status the upstream requested.
    pub requested: ActivityStatus,
    /// Node the unit of work arrived from.
    pub origin: Option<NodeRef>,
}

impl ActivityRecord {
    /// A freshly queued record with no origin yet.
    pub fn new() -> Self {
        Self {
            current: ActivityStatus::Queued,
            requested: ActivityStatus::Active,
            origin: None,
        }
    }
}

impl Default for ActivityRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// What leaves the engine: the activity record and the unit of work
/// travel together to the egress endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportPacket {
    /// The final activity record.
    pub record: ActivityRecord,
    /// The concluded unit of work, egress payloads included.
    pub uow: UnitOfWork,
}
