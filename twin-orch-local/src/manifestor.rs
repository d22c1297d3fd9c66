//! The manifestor: promotes queued packages for idle twins.
//!
//! A pass first reclaims expired leases, then walks every twin with
//! waiting work. A twin without a lock gets the head of its queue
//! promoted: the lock is written, then the package is delivered. Passes
//! are serialized, so promotion never races itself.

use crate::engine::{DeadLetter, Engine};
use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use twin_protocol::dispatch::DispatchPackage;
use twin_protocol::outcome::{Outcome, OutcomeSet};
use twin_protocol::stimulus::ResourceKind;
use twin_state_memory::LockEntry;

/// The running manifestor task and the token that stops it.
pub(crate) struct ManifestorHandle {
    pub(crate) cancel: CancellationToken,
    pub(crate) task: JoinHandle<()>,
}

impl<K: ResourceKind> Engine<K> {
    /// One promotion pass. Returns how many packages were delivered
    /// (successfully or not).
    pub(crate) async fn manifest_pass(&self) -> usize {
        let _pass = self.promotion.lock().await;
        self.sweep_expired_leases().await;

        let mut promoted = 0;
        for twin in self.stores.queues.waiting_twins().await {
            if self.stores.locks.is_locked(&twin).await {
                tracing::trace!(twin = %twin, "twin.manifest.busy");
                continue;
            }
            let Some(package) = self.stores.queues.pop_front(&twin).await else {
                continue;
            };
            let now = Utc::now();
            let entry = LockEntry {
                behaviour: package.behaviour.clone(),
                key: package.key(),
                acquired_at: now,
                lease_deadline: self
                    .config
                    .lock_lease
                    .and_then(|lease| lease.to_time_delta())
                    .and_then(|lease| now.checked_add_signed(lease)),
            };
            if !self.stores.locks.try_lock(&twin, entry).await {
                self.stores.queues.push_front(package).await;
                continue;
            }
            self.dispatch(package).await;
            promoted += 1;
        }
        if promoted > 0 {
            tracing::debug!(promoted, "twin.manifest.pass");
        }
        promoted
    }

    async fn dispatch(&self, package: DispatchPackage<K>) {
        let key = package.key();
        let Some(endpoint) = self.behaviours.endpoint(&package.behaviour).await else {
            tracing::error!(key = %key, "twin.manifest.behaviour_missing");
            let detail = format!("behaviour not registered: {}", package.behaviour);
            self.complete(OutcomeSet::new(key.clone()).with(Outcome::failed(key, detail)))
                .await;
            return;
        };
        tracing::debug!(key = %key, "twin.manifest.dispatch");
        if let Err(e) = endpoint.deliver(package).await {
            tracing::error!(key = %key, error = %e, "twin.manifest.dispatch_failed");
            self.complete(OutcomeSet::new(key.clone()).with(Outcome::failed(key, e.to_string())))
                .await;
        }
    }

    /// Force-release twins whose lease ran out and dead-letter their
    /// dispatches.
    async fn sweep_expired_leases(&self) {
        if self.config.lock_lease.is_none() {
            return;
        }
        let now = Utc::now();
        for (twin, entry) in self.stores.locks.take_expired(now).await {
            tracing::warn!(
                twin = %twin,
                key = %entry.key,
                acquired_at = %entry.acquired_at,
                "twin.lease.expired"
            );
            let package = self
                .stores
                .stimuli
                .get(&entry.key.stimulus)
                .await
                .map(|s| DispatchPackage::new(twin.clone(), entry.behaviour.clone(), s));
            self.push_dead_letter(DeadLetter {
                key: entry.key.clone(),
                package,
                acquired_at: entry.acquired_at,
                expired_at: now,
            })
            .await;
            let key = entry.key;
            self.complete(
                OutcomeSet::new(key.clone()).with(Outcome::expired(key, "lock lease expired")),
            )
            .await;
        }
    }
}

/// Drive passes on the configured tick until `cancel` fires.
pub(crate) async fn run<K: ResourceKind>(engine: Arc<Engine<K>>, cancel: CancellationToken) {
    tracing::info!(
        initial_delay = %engine.config.initial_delay,
        tick_period = %engine.config.tick_period,
        "twin.manifestor.started"
    );
    tokio::select! {
        _ = cancel.cancelled() => {
            tracing::info!("twin.manifestor.stopped");
            return;
        }
        _ = tokio::time::sleep(engine.config.initial_delay.to_std()) => {}
    }

    let mut ticker = tokio::time::interval(engine.config.tick_period.to_std());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let wake_on_enqueue = engine.config.wake_on_enqueue;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
            _ = engine.wake.notified(), if wake_on_enqueue => {}
        }
        engine.manifest_pass().await;
    }
    tracing::info!("twin.manifestor.stopped");
}
