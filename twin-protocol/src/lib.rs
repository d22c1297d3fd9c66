//! # twin-protocol: types and strategy traits for twin orchestration
//!
//! This crate defines the data that flows through a digital twin
//! behavioural orchestration engine, and the seams where deployments plug
//! in their own logic.
//!
//! ## The data model
//!
//! | Type | What it is |
//! |------|-----------|
//! | [`UnitOfWork`] | One inbound item, published once as a single result |
//! | [`ActivityRecord`] | Job card routing the result back to its origin |
//! | [`Stimulus`] | Normalized trigger derived from a unit of work |
//! | [`DispatchPackage`] | One behaviour invocation for one twin |
//! | [`OutcomeSet`] | What a behaviour reports when it releases a twin |
//! | [`TransportPacket`] | What leaves the engine |
//!
//! ## The seams
//!
//! | Trait | Supplied by | Asked |
//! |-------|-------------|-------|
//! | [`InclusionFilter`] | each behaviour | once for topics, per stimulus for twins |
//! | [`ExclusionFilter`] | each behaviour (optional) | per admitted twin |
//! | [`BehaviourEndpoint`] | each behaviour | per promoted package |
//! | [`ResourceEncoder`] | the deployment | per outcome at aggregation |
//! | [`EgressTopology`] | the deployment | per published unit of work |
//! | [`EgressPublisher`] | the deployment | per published unit of work |
//!
//! ## Resource kinds
//!
//! The engine is generic over `K: ResourceKind`, the enumeration of
//! resource and event kinds a deployment understands. Twins themselves are
//! only identifiers ([`TwinId`]); the engine never holds twin state.

#![deny(missing_docs)]

pub mod behaviour;
pub mod dispatch;
pub mod duration;
pub mod egress;
pub mod error;
pub mod id;
pub mod outcome;
pub mod stimulus;
pub mod work;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-exports for convenience
pub use behaviour::{BehaviourEndpoint, BehaviourRegistration, ExclusionFilter, InclusionFilter};
pub use dispatch::{DispatchKey, DispatchPackage};
pub use duration::DurationMs;
pub use egress::{EgressPublisher, EgressTopology, JsonEncoder, ResourceEncoder, SuffixTopology};
pub use error::{DispatchError, EncodeError, EngineError, PublishError};
pub use id::{BehaviourId, EndpointRef, ForwarderId, NodeRef, StimulusId, Topic, TwinId, UowId};
pub use outcome::{Outcome, OutcomeSet, OutcomeStatus, OutputResource};
pub use stimulus::{ResourceKind, Stimulus};
pub use work::{
    ActivityRecord, ActivityStatus, Payload, PayloadDescriptor, ProcessingOutcome,
    TransportPacket, UnitOfWork,
};
