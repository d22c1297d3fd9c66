#![deny(missing_docs)]
//! In-process digital twin orchestration engine.
//!
//! [`TwinOrchestrator`] wires the in-memory stores from
//! `twin-state-memory` to the behaviour seams from `twin-protocol`:
//!
//! 1. a unit of work is registered with its origin node;
//! 2. each derived stimulus is fanned out through every behaviour's
//!    inclusion (and optional exclusion) filter onto per-twin queues;
//! 3. the manifestor promotes the head of each idle twin's queue, locking
//!    the twin and delivering the package to the behaviour endpoint;
//! 4. the behaviour reports back an outcome set, which releases the twin;
//! 5. once every dispatch for the unit of work has finished, its outcomes
//!    are encoded, published once through the origin's egress endpoint,
//!    and all of its state is purged.
//!
//! No durability: everything lives in process memory. Failed dispatches
//! are not retried. Lock leases dead-letter dispatches whose behaviour
//! never reports back.

mod aggregate;
pub mod config;
mod engine;
mod manifestor;
pub mod orchestrator;
pub mod registry;

pub use config::EngineConfig;
pub use engine::{DeadLetter, EngineStats};
pub use orchestrator::{OrchestratorBuilder, TwinOrchestrator};
pub use registry::{BehaviourRegistry, ForwarderRegistry};
