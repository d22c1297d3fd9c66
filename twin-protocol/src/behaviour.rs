//! Behaviour capabilities: the filters and endpoint a behaviour plugs in.

use crate::dispatch::DispatchPackage;
use crate::error::DispatchError;
use crate::id::{Topic, TwinId};
use crate::stimulus::{ResourceKind, Stimulus};
use async_trait::async_trait;
use std::sync::Arc;

/// Decides which twins a behaviour wants to act on.
///
/// Two questions are asked of it at different times:
/// - [`static_topics`](Self::static_topics) once, when the behaviour is
///   registered, to build the upstream subscription list;
/// - [`dynamic_match`](Self::dynamic_match) for every stimulus, to pick the
///   twin instances that should receive it.
#[async_trait]
pub trait InclusionFilter<K: ResourceKind>: Send + Sync {
    /// Topics this behaviour subscribes to upstream.
    fn static_topics(&self) -> Vec<Topic>;

    /// Twins that should receive `stimulus` under this behaviour.
    /// An empty vec means the behaviour is not interested.
    async fn dynamic_match(&self, stimulus: &Stimulus<K>) -> Vec<TwinId>;
}

/// Optional per-twin veto evaluated after inclusion.
///
/// When registered, a twin is admitted only if [`admit`](Self::admit)
/// returns `true`.
#[async_trait]
pub trait ExclusionFilter<K: ResourceKind>: Send + Sync {
    /// Whether `twin` may receive `stimulus`.
    async fn admit(&self, stimulus: &Stimulus<K>, twin: &TwinId) -> bool;
}

/// Where promoted dispatch packages are delivered.
///
/// Delivery is a hand-off: the endpoint should accept the package and
/// return promptly. The behaviour reports back later through the
/// orchestrator's completion entry point. The twin stays locked until
/// it does (or until its lease expires).
#[async_trait]
pub trait BehaviourEndpoint<K: ResourceKind>: Send + Sync {
    /// Hand a package to the behaviour.
    async fn deliver(&self, package: DispatchPackage<K>) -> Result<(), DispatchError>;
}

/// The capabilities a behaviour supplies at registration time.
pub struct BehaviourRegistration<K: ResourceKind> {
    /// Inclusion filter.
    pub inclusion: Arc<dyn InclusionFilter<K>>,
    /// Optional exclusion filter.
    pub exclusion: Option<Arc<dyn ExclusionFilter<K>>>,
    /// Execution endpoint.
    pub endpoint: Arc<dyn BehaviourEndpoint<K>>,
}

impl<K: ResourceKind> BehaviourRegistration<K> {
    /// A registration with no exclusion filter.
    pub fn new(
        inclusion: Arc<dyn InclusionFilter<K>>,
        endpoint: Arc<dyn BehaviourEndpoint<K>>,
    ) -> Self {
        Self {
            inclusion,
            exclusion: None,
            endpoint,
        }
    }

    /// Add an exclusion filter.
    pub fn with_exclusion(mut self, exclusion: Arc<dyn ExclusionFilter<K>>) -> Self {
        self.exclusion = Some(exclusion);
        self
    }
}

impl<K: ResourceKind> Clone for BehaviourRegistration<K> {
    fn clone(&self) -> Self {
        Self {
            inclusion: Arc::clone(&self.inclusion),
            exclusion: self.exclusion.as_ref().map(Arc::clone),
            endpoint: Arc::clone(&self.endpoint),
        }
    }
}
