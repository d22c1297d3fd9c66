//! Shared engine state and the fan-out / completion paths.

use crate::config::EngineConfig;
use crate::manifestor::ManifestorHandle;
use crate::registry::{BehaviourRegistry, ForwarderRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use twin_protocol::dispatch::{DispatchKey, DispatchPackage};
use twin_protocol::egress::{EgressPublisher, EgressTopology, ResourceEncoder};
use twin_protocol::id::{NodeRef, UowId};
use twin_protocol::outcome::OutcomeSet;
use twin_protocol::stimulus::{ResourceKind, Stimulus};
use twin_protocol::work::{ActivityRecord, ActivityStatus, Payload, ProcessingOutcome, UnitOfWork};
use twin_state_memory::{CausalityStatus, EngineStores};

/// A dispatch whose lock lease ran out before the behaviour reported back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter<K> {
    /// Causality coordinates of the abandoned dispatch.
    pub key: DispatchKey,
    /// The package as it was delivered, if its stimulus was still stored.
    pub package: Option<DispatchPackage<K>>,
    /// When the twin was locked for it.
    pub acquired_at: DateTime<Utc>,
    /// When the lease was found expired.
    pub expired_at: DateTime<Utc>,
}

/// Point-in-time counts across the engine's stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Registered units of work not yet purged.
    pub units_in_flight: usize,
    /// Stored stimuli.
    pub stimuli: usize,
    /// Outcomes awaiting aggregation.
    pub outcomes: usize,
    /// Packages waiting on twin queues.
    pub queued_packages: usize,
    /// Twins currently locked.
    pub locked_twins: usize,
    /// Causality records.
    pub causality_records: usize,
    /// Retained dead letters.
    pub dead_letters: usize,
    /// Registered behaviours.
    pub behaviours: usize,
}

pub(crate) struct Engine<K: ResourceKind> {
    pub(crate) config: EngineConfig,
    pub(crate) stores: EngineStores<K>,
    pub(crate) behaviours: BehaviourRegistry<K>,
    pub(crate) forwarders: ForwarderRegistry,
    pub(crate) encoder: Arc<dyn ResourceEncoder<K>>,
    pub(crate) topology: Arc<dyn EgressTopology>,
    pub(crate) publisher: Arc<dyn EgressPublisher>,
    pub(crate) wake: Notify,
    /// Held for the duration of a manifestor pass.
    pub(crate) promotion: Mutex<()>,
    /// Held while an outcome set is checked, recorded and marked finished,
    /// while a completion is claimed, and while fan-out commits packages.
    pub(crate) completion: Mutex<()>,
    pub(crate) dead_letters: Mutex<VecDeque<DeadLetter<K>>>,
    pub(crate) manifestor: Mutex<Option<ManifestorHandle>>,
}

impl<K: ResourceKind> Engine<K> {
    pub(crate) fn new(
        config: EngineConfig,
        stores: EngineStores<K>,
        encoder: Arc<dyn ResourceEncoder<K>>,
        topology: Arc<dyn EgressTopology>,
        publisher: Arc<dyn EgressPublisher>,
    ) -> Self {
        Self {
            config,
            stores,
            behaviours: BehaviourRegistry::new(),
            forwarders: ForwarderRegistry::new(),
            encoder,
            topology,
            publisher,
            wake: Notify::new(),
            promotion: Mutex::new(()),
            completion: Mutex::new(()),
            dead_letters: Mutex::new(VecDeque::new()),
            manifestor: Mutex::new(None),
        }
    }

    pub(crate) fn nudge(&self) {
        if self.config.wake_on_enqueue {
            self.wake.notify_one();
        }
    }

    pub(crate) async fn register_new_uow(
        &self,
        payload: Payload,
        mut record: ActivityRecord,
        origin: NodeRef,
    ) -> UnitOfWork {
        let uow = UnitOfWork::new(payload);
        record.origin = Some(origin);
        record.current = ActivityStatus::Active;
        if !self.stores.work.register(uow.clone(), record).await {
            tracing::warn!(uow = %uow.id, "twin.uow.duplicate");
        } else {
            tracing::info!(uow = %uow.id, kind = %uow.ingress.descriptor.kind, "twin.uow.registered");
        }
        uow
    }

    /// Store `stimulus` and fan it out. Returns how many packages were
    /// enqueued.
    pub(crate) async fn register_new_stimulus(&self, stimulus: Stimulus<K>) -> usize {
        let uow = stimulus.uow().clone();
        if !self.stores.work.contains(&uow).await {
            tracing::warn!(uow = %uow, stimulus = %stimulus.id(), "twin.stimulus.unknown_uow");
            return 0;
        }
        if self.stores.causality.is_claimed(&uow).await {
            tracing::warn!(uow = %uow, stimulus = %stimulus.id(), "twin.stimulus.after_completion");
            return 0;
        }
        let Some(stimulus) = self.stores.stimuli.insert(stimulus).await else {
            tracing::warn!(uow = %uow, "twin.stimulus.duplicate");
            return 0;
        };

        let mut packages = Vec::new();
        for (behaviour, registration) in self.behaviours.snapshot().await {
            let candidates = registration.inclusion.dynamic_match(&stimulus).await;
            let mut seen = HashSet::new();
            for twin in candidates {
                if !seen.insert(twin.clone()) {
                    continue;
                }
                if let Some(exclusion) = &registration.exclusion {
                    if !exclusion.admit(&stimulus, &twin).await {
                        tracing::debug!(
                            stimulus = %stimulus.id(),
                            twin = %twin,
                            behaviour = %behaviour,
                            "twin.stimulus.excluded"
                        );
                        continue;
                    }
                }
                packages.push(DispatchPackage::new(twin, behaviour.clone(), Arc::clone(&stimulus)));
            }
        }

        // The filters may have yielded to a completion that claimed the
        // unit of work. Claims are taken under the completion lock and
        // purge drops the work entry first, so this check is final.
        let enqueued = packages.len();
        {
            let finishing = self.completion.lock().await;
            let live = self.stores.work.contains(&uow).await
                && !self.stores.causality.is_claimed(&uow).await;
            if !live {
                drop(finishing);
                self.stores.stimuli.remove(stimulus.id()).await;
                tracing::warn!(uow = %uow, stimulus = %stimulus.id(), "twin.stimulus.after_completion");
                return 0;
            }
            for package in packages {
                // Record before the package becomes visible to the manifestor.
                self.stores.causality.mark_queued(&package.key()).await;
                tracing::debug!(key = %package.key(), "twin.stimulus.enqueued");
                self.stores.queues.enqueue(package).await;
            }
        }

        tracing::info!(
            uow = %uow,
            stimulus = %stimulus.id(),
            kind = %stimulus.kind(),
            natural_id = stimulus.natural_id(),
            packages = enqueued,
            "twin.stimulus.fanout"
        );
        if enqueued > 0 {
            self.nudge();
        }
        enqueued
    }

    /// Finish the dispatch an outcome set answers. Returns `false` when
    /// the set was ignored.
    ///
    /// Only the answered dispatch is finished. Outcomes keyed to sibling
    /// dispatches are kept for aggregation but leave their records alone,
    /// so each sibling still releases its own twin.
    pub(crate) async fn complete(&self, set: OutcomeSet<K>) -> bool {
        let origin = set.origin.clone();
        let finishing = self.completion.lock().await;
        let released = self
            .stores
            .locks
            .unlock_if_held_by(&origin.twin, &origin)
            .await
            .is_some();
        match self.stores.causality.status(&origin).await {
            Some(CausalityStatus::Queued) => {}
            status => {
                drop(finishing);
                if status.is_some() {
                    tracing::warn!(key = %origin, released, "twin.completion.already_finished");
                } else {
                    tracing::warn!(key = %origin, released, "twin.completion.unknown_dispatch");
                }
                if released {
                    self.nudge();
                }
                return false;
            }
        }
        if !released {
            if let Some(holder) = self.stores.locks.holder(&origin.twin).await {
                tracing::warn!(key = %origin, holder = %holder.key, "twin.completion.lock_not_held");
            }
        }

        let mut accepted = Vec::with_capacity(set.outcomes.len());
        for outcome in set.outcomes {
            if outcome.key.uow != origin.uow {
                tracing::warn!(key = %origin, outcome = %outcome.key, "twin.completion.foreign_outcome");
                continue;
            }
            let owned = self
                .stores
                .stimuli
                .get(&outcome.key.stimulus)
                .await
                .is_some_and(|s| s.uow() == &origin.uow);
            if !owned {
                tracing::warn!(key = %origin, outcome = %outcome.key, "twin.completion.unknown_stimulus");
                continue;
            }
            accepted.push(outcome);
        }

        let count = accepted.len();
        self.stores.outcomes.record(accepted).await;
        self.stores.causality.mark_finished(&origin).await;
        let claimed = self.stores.causality.claim_if_complete(&origin.uow).await;
        drop(finishing);
        tracing::info!(key = %origin, outcomes = count, "twin.completion.registered");
        self.nudge();

        if claimed {
            self.aggregate_and_publish(&origin.uow).await;
        }
        true
    }

    /// Aggregate `uow` if it is complete and nobody has claimed it yet.
    pub(crate) async fn try_aggregate(&self, uow: &UowId) -> Option<ProcessingOutcome> {
        let claimed = {
            let _finishing = self.completion.lock().await;
            self.stores.causality.claim_if_complete(uow).await
        };
        if !claimed {
            return None;
        }
        self.aggregate_and_publish(uow).await
    }

    pub(crate) async fn seal(&self, uow: &UowId) -> bool {
        if !self.stores.work.contains(uow).await {
            tracing::warn!(uow = %uow, "twin.seal.unknown_uow");
            return false;
        }
        let claimed = {
            let _finishing = self.completion.lock().await;
            self.stores.causality.claim_if_untracked(uow).await
        };
        if !claimed {
            return false;
        }
        tracing::info!(uow = %uow, "twin.seal.no_processing_required");
        self.conclude_untouched(uow).await;
        true
    }

    pub(crate) async fn push_dead_letter(&self, letter: DeadLetter<K>) {
        let capacity = self.config.dead_letter_capacity;
        if capacity == 0 {
            return;
        }
        let mut letters = self.dead_letters.lock().await;
        while letters.len() >= capacity {
            letters.pop_front();
        }
        letters.push_back(letter);
    }

    pub(crate) async fn stats(&self) -> EngineStats {
        EngineStats {
            units_in_flight: self.stores.work.len().await,
            stimuli: self.stores.stimuli.len().await,
            outcomes: self.stores.outcomes.len().await,
            queued_packages: self.stores.queues.total().await,
            locked_twins: self.stores.locks.len().await,
            causality_records: self.stores.causality.len().await,
            dead_letters: self.dead_letters.lock().await.len(),
            behaviours: self.behaviours.len().await,
        }
    }
}
