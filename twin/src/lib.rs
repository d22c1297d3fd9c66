#![deny(missing_docs)]
//! # twin: umbrella crate
//!
//! One import surface for digital twin behavioural orchestration.
//! Re-exports the protocol crate and the in-process engine behind
//! feature flags, plus a `prelude` for the common path.

pub use twin_protocol;
#[cfg(feature = "orch-local")]
pub use twin_orch_local;
#[cfg(feature = "state-memory")]
pub use twin_state_memory;

/// Happy-path imports for wiring an engine and its behaviours.
pub mod prelude {
    pub use twin_protocol::{
        ActivityRecord, ActivityStatus, BehaviourEndpoint, BehaviourId, BehaviourRegistration,
        DispatchError, DispatchKey, DispatchPackage, DurationMs, EgressPublisher, EgressTopology,
        EncodeError, EndpointRef, EngineError, ExclusionFilter, ForwarderId, InclusionFilter,
        JsonEncoder, NodeRef, Outcome, OutcomeSet, OutcomeStatus, OutputResource, Payload,
        ProcessingOutcome, PublishError, ResourceEncoder, ResourceKind, Stimulus, StimulusId,
        SuffixTopology, Topic, TransportPacket, TwinId, UnitOfWork, UowId,
    };

    #[cfg(feature = "state-memory")]
    pub use twin_state_memory::EngineStores;

    #[cfg(feature = "orch-local")]
    pub use twin_orch_local::{DeadLetter, EngineConfig, EngineStats, TwinOrchestrator};
}
