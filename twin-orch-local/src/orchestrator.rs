//! The orchestrator facade and its builder.

use crate::config::EngineConfig;
use crate::engine::{DeadLetter, Engine, EngineStats};
use crate::manifestor::{self, ManifestorHandle};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use twin_protocol::behaviour::BehaviourRegistration;
use twin_protocol::egress::{EgressPublisher, EgressTopology, JsonEncoder, ResourceEncoder, SuffixTopology};
use twin_protocol::error::{EngineError, PublishError};
use twin_protocol::id::{BehaviourId, ForwarderId, NodeRef, Topic, TwinId, UowId};
use twin_protocol::outcome::OutcomeSet;
use twin_protocol::stimulus::{ResourceKind, Stimulus};
use twin_protocol::work::{ActivityRecord, Payload, ProcessingOutcome, UnitOfWork};
use twin_state_memory::{EngineStores, LockEntry};

/// In-process digital twin orchestrator.
///
/// Turns each registered unit of work into stimuli fanned out to
/// behaviours, admits at most one behaviour per twin at a time, and
/// publishes a single aggregated result once every dispatched behaviour
/// has reported back.
///
/// Cloning is cheap; clones share the same engine. Behaviours hold a
/// clone to report completions.
///
/// ```ignore
/// let orch = TwinOrchestrator::<MyKind>::builder(publisher)
///     .config(EngineConfig::default())
///     .build()?;
/// orch.register_behaviour(id, registration).await;
/// orch.start().await?;
///
/// let uow = orch.register_new_uow(payload, ActivityRecord::new(), origin).await;
/// orch.register_new_stimulus(stimulus).await;
/// orch.seal_uow(&uow.id).await;
/// ```
pub struct TwinOrchestrator<K: ResourceKind> {
    engine: Arc<Engine<K>>,
}

impl<K: ResourceKind> Clone for TwinOrchestrator<K> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<K: ResourceKind> TwinOrchestrator<K> {
    /// Start building an orchestrator that publishes through `publisher`.
    ///
    /// Defaults: [`EngineConfig::default`], fresh in-memory stores,
    /// [`JsonEncoder`], and [`SuffixTopology::default`].
    #[must_use]
    pub fn builder(publisher: Arc<dyn EgressPublisher>) -> OrchestratorBuilder<K> {
        OrchestratorBuilder {
            config: EngineConfig::default(),
            stores: EngineStores::new(),
            encoder: Arc::new(JsonEncoder),
            topology: Arc::new(SuffixTopology::default()),
            publisher,
        }
    }

    /// The configuration in force.
    pub fn config(&self) -> &EngineConfig {
        &self.engine.config
    }

    /// The stores the engine reads and writes.
    pub fn stores(&self) -> &EngineStores<K> {
        &self.engine.stores
    }

    // --- Ingress ---

    /// Register an inbound unit of work arriving from `origin`. The
    /// returned unit of work carries the generated id that stimuli must
    /// reference.
    pub async fn register_new_uow(
        &self,
        payload: Payload,
        record: ActivityRecord,
        origin: NodeRef,
    ) -> UnitOfWork {
        self.engine.register_new_uow(payload, record, origin).await
    }

    /// Store a derived stimulus and fan it out to every interested
    /// (twin, behaviour) pair. Returns how many dispatch packages were
    /// enqueued.
    ///
    /// A stimulus for an unknown or already completed unit of work, or
    /// one whose id is already stored, is ignored and yields 0.
    pub async fn register_new_stimulus(&self, stimulus: Stimulus<K>) -> usize {
        self.engine.register_new_stimulus(stimulus).await
    }

    /// Declare that every stimulus of `uow` has been registered. If
    /// nothing was enqueued for it, it is published as
    /// [`ProcessingOutcome::NoProcessingRequired`] and purged; returns
    /// whether that happened.
    pub async fn seal_uow(&self, uow: &UowId) -> bool {
        self.engine.seal(uow).await
    }

    // --- Completion ---

    /// A behaviour reports back: releases the twin, stores the outcomes
    /// and finishes the causality records. Aggregation fires once the
    /// unit of work has nothing left in flight.
    ///
    /// Returns `false` if the set was ignored: the dispatch is unknown,
    /// already finished, or was dead-lettered.
    pub async fn register_behaviour_completion(&self, outcomes: OutcomeSet<K>) -> bool {
        self.engine.complete(outcomes).await
    }

    /// Aggregate and publish `uow` if every dispatch for it has finished
    /// and no one has aggregated it yet. Completions call this path
    /// themselves; it is exposed for hosts that drive aggregation.
    pub async fn aggregate_and_publish_outcomes(&self, uow: &UowId) -> Option<ProcessingOutcome> {
        self.engine.try_aggregate(uow).await
    }

    /// Publish `uow` in its current state through its origin's egress
    /// endpoint, without purging it.
    pub async fn publish_uow(&self, uow: &UowId) -> Result<(), PublishError> {
        self.engine.publish(uow).await
    }

    // --- Behaviours and forwarders ---

    /// Register a behaviour, replacing any registration with the same id.
    /// Its static topics join [`subscriptions`](Self::subscriptions).
    pub async fn register_behaviour(&self, id: BehaviourId, registration: BehaviourRegistration<K>) {
        let replaced = self
            .engine
            .behaviours
            .register(id.clone(), registration)
            .await
            .is_some();
        let topics = self.engine.behaviours.topics(&id).await;
        tracing::info!(behaviour = %id, topics = topics.len(), replaced, "twin.behaviour.registered");
    }

    /// Remove a behaviour. Packages already queued for it fail when
    /// promoted.
    pub async fn deregister_behaviour(&self, id: &BehaviourId) -> bool {
        let removed = self.engine.behaviours.deregister(id).await.is_some();
        if removed {
            tracing::info!(behaviour = %id, "twin.behaviour.deregistered");
        }
        removed
    }

    /// Upstream topics wanted by the registered behaviours.
    pub async fn subscriptions(&self) -> Vec<Topic> {
        self.engine.behaviours.subscriptions().await
    }

    /// Add a downstream forwarder to `twin`.
    pub async fn register_forwarder(&self, twin: TwinId, forwarder: ForwarderId) -> bool {
        self.engine.forwarders.register(twin, forwarder).await
    }

    /// Remove a downstream forwarder from `twin`.
    pub async fn deregister_forwarder(&self, twin: &TwinId, forwarder: &ForwarderId) -> bool {
        self.engine.forwarders.deregister(twin, forwarder).await
    }

    /// Downstream forwarders of `twin`.
    pub async fn forwarders(&self, twin: &TwinId) -> Vec<ForwarderId> {
        self.engine.forwarders.forwarders(twin).await
    }

    // --- Scheduling ---

    /// Run one manifestor pass now. Returns how many packages were
    /// delivered.
    pub async fn manifest_once(&self) -> usize {
        self.engine.manifest_pass().await
    }

    /// Spawn the manifestor task on the current tokio runtime.
    pub async fn start(&self) -> Result<(), EngineError> {
        let mut slot = self.engine.manifestor.lock().await;
        if slot.as_ref().is_some_and(|h| !h.task.is_finished()) {
            return Err(EngineError::AlreadyRunning);
        }
        let cancel = CancellationToken::new();
        let task = tokio::spawn(manifestor::run(Arc::clone(&self.engine), cancel.clone()));
        *slot = Some(ManifestorHandle { cancel, task });
        Ok(())
    }

    /// Stop the manifestor task and wait for it to exit. A no-op when it
    /// is not running.
    pub async fn shutdown(&self) {
        let handle = self.engine.manifestor.lock().await.take();
        let Some(handle) = handle else {
            return;
        };
        handle.cancel.cancel();
        if let Err(e) = handle.task.await {
            tracing::error!(error = %e, "twin.manifestor.join_failed");
        }
    }

    /// Whether the manifestor task is running.
    pub async fn is_running(&self) -> bool {
        self.engine
            .manifestor
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.task.is_finished())
    }

    // --- Inspection ---

    /// Counts across the engine's stores.
    pub async fn stats(&self) -> EngineStats {
        self.engine.stats().await
    }

    /// Whether a behaviour is executing against `twin`.
    pub async fn is_locked(&self, twin: &TwinId) -> bool {
        self.engine.stores.locks.is_locked(twin).await
    }

    /// Who holds `twin`, if anyone.
    pub async fn lock_holder(&self, twin: &TwinId) -> Option<LockEntry> {
        self.engine.stores.locks.holder(twin).await
    }

    /// Packages waiting for `twin`.
    pub async fn queue_len(&self, twin: &TwinId) -> usize {
        self.engine.stores.queues.len(twin).await
    }

    /// Retained dead letters, oldest first.
    pub async fn dead_letters(&self) -> Vec<DeadLetter<K>> {
        self.engine.dead_letters.lock().await.iter().cloned().collect()
    }
}

/// Builder for a [`TwinOrchestrator`].
///
/// Created via [`TwinOrchestrator::builder`]. Only the publisher is
/// required.
pub struct OrchestratorBuilder<K: ResourceKind> {
    config: EngineConfig,
    stores: EngineStores<K>,
    encoder: Arc<dyn ResourceEncoder<K>>,
    topology: Arc<dyn EgressTopology>,
    publisher: Arc<dyn EgressPublisher>,
}

impl<K: ResourceKind> OrchestratorBuilder<K> {
    /// Set the engine configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Share existing stores instead of creating fresh ones.
    #[must_use]
    pub fn stores(mut self, stores: EngineStores<K>) -> Self {
        self.stores = stores;
        self
    }

    /// Set the encoder used for output resources.
    #[must_use]
    pub fn encoder(mut self, encoder: Arc<dyn ResourceEncoder<K>>) -> Self {
        self.encoder = encoder;
        self
    }

    /// Set the egress topology.
    #[must_use]
    pub fn topology(mut self, topology: Arc<dyn EgressTopology>) -> Self {
        self.topology = topology;
        self
    }

    /// Validate the configuration and build the orchestrator. The
    /// manifestor is not started.
    pub fn build(self) -> Result<TwinOrchestrator<K>, EngineError> {
        self.config.validate()?;
        Ok(TwinOrchestrator {
            engine: Arc::new(Engine::new(
                self.config,
                self.stores,
                self.encoder,
                self.topology,
                self.publisher,
            )),
        })
    }
}
