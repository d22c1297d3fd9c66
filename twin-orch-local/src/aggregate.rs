//! Aggregation, publish and purge.

use crate::engine::Engine;
use std::collections::HashMap;
use twin_protocol::egress::ResourceEncoder;
use twin_protocol::error::PublishError;
use twin_protocol::id::{ForwarderId, TwinId, UowId};
use twin_protocol::outcome::{Outcome, OutcomeStatus};
use twin_protocol::stimulus::ResourceKind;
use twin_protocol::work::{ActivityStatus, Payload, ProcessingOutcome, TransportPacket};

/// Egress payloads built from a unit of work's outcomes.
#[derive(Debug, Default)]
pub(crate) struct Assembly {
    pub(crate) payloads: Vec<Payload>,
    /// Set when an encode failed; later outcomes were skipped.
    pub(crate) encode_failure: Option<String>,
    /// Executions that failed or expired.
    pub(crate) shortfalls: Vec<String>,
}

impl Assembly {
    pub(crate) fn verdict(&self) -> (ProcessingOutcome, Option<String>) {
        if let Some(failure) = &self.encode_failure {
            return (ProcessingOutcome::Failed, Some(failure.clone()));
        }
        if !self.shortfalls.is_empty() {
            let detail = format!(
                "{} behaviour execution(s) did not succeed: {}",
                self.shortfalls.len(),
                self.shortfalls.join("; ")
            );
            return (ProcessingOutcome::Incomplete, Some(detail));
        }
        (ProcessingOutcome::Success, None)
    }
}

/// Encode every outcome, in order, into egress payloads.
pub(crate) fn assemble<K: ResourceKind>(
    outcomes: &[Outcome<K>],
    encoder: &dyn ResourceEncoder<K>,
    forwarders: &HashMap<TwinId, Vec<ForwarderId>>,
) -> Assembly {
    let mut assembly = Assembly::default();
    for outcome in outcomes {
        let label = match outcome.status {
            OutcomeStatus::Success => None,
            OutcomeStatus::Failed => Some("failed"),
            OutcomeStatus::Expired => Some("expired"),
            _ => Some("unsuccessful"),
        };
        if let Some(label) = label {
            let detail = outcome.detail.as_deref().unwrap_or("no detail");
            assembly
                .shortfalls
                .push(format!("{} ({label}: {detail})", outcome.key));
            continue;
        }
        let Some(resource) = &outcome.resource else {
            continue;
        };
        let wire = match encoder.encode(resource) {
            Ok(wire) => wire,
            Err(e) => {
                assembly.encode_failure = Some(format!(
                    "encoding {} {} from {} failed: {e}",
                    resource.kind, resource.id, outcome.key
                ));
                break;
            }
        };
        let kind = resource.kind.to_string();
        if outcome.echo_downstream {
            for forwarder in forwarders.get(&outcome.key.twin).into_iter().flatten() {
                assembly
                    .payloads
                    .push(Payload::forwarded(kind.clone(), forwarder.clone(), wire.clone()));
            }
        } else {
            assembly.payloads.push(Payload::new(kind, wire));
        }
    }
    assembly
}

impl<K: ResourceKind> Engine<K> {
    /// Aggregate, publish and purge a unit of work whose completion has
    /// been claimed.
    pub(crate) async fn aggregate_and_publish(&self, uow: &UowId) -> Option<ProcessingOutcome> {
        let stimuli = self.stores.stimuli.for_uow(uow).await;
        let outcomes = self
            .stores
            .outcomes
            .take(stimuli.iter().map(|s| s.id()))
            .await;
        let echo_twins: Vec<&TwinId> = outcomes
            .iter()
            .filter(|o| o.echo_downstream)
            .map(|o| &o.key.twin)
            .collect();
        let forwarders = self.forwarders.for_twins(echo_twins).await;

        let assembly = assemble(&outcomes, self.encoder.as_ref(), &forwarders);
        let (verdict, failure) = assembly.verdict();
        if let Some(failure) = &assembly.encode_failure {
            tracing::error!(uow = %uow, error = %failure, "twin.uow.encode_failed");
        }

        let payloads = assembly.payloads.len();
        let updated = self
            .stores
            .work
            .update(uow, |entry| {
                entry.uow.egress = assembly.payloads;
                entry.uow.outcome = verdict;
                entry.uow.failure = failure;
            })
            .await;
        if updated.is_none() {
            tracing::warn!(uow = %uow, "twin.uow.aggregate_unknown");
            self.purge(uow).await;
            return None;
        }
        tracing::info!(
            uow = %uow,
            outcome = ?verdict,
            outcomes = outcomes.len(),
            payloads,
            "twin.uow.aggregated"
        );

        if let Err(e) = self.publish(uow).await {
            tracing::error!(uow = %uow, error = %e, "twin.uow.publish_failed");
        }
        self.purge(uow).await;
        Some(verdict)
    }

    /// Publish a unit of work nothing was enqueued for.
    pub(crate) async fn conclude_untouched(&self, uow: &UowId) {
        self.stores
            .work
            .update(uow, |entry| {
                entry.uow.outcome = ProcessingOutcome::NoProcessingRequired;
            })
            .await;
        if let Err(e) = self.publish(uow).await {
            tracing::error!(uow = %uow, error = %e, "twin.uow.publish_failed");
        }
        self.purge(uow).await;
    }

    /// Route the unit of work back through its origin node.
    pub(crate) async fn publish(&self, uow: &UowId) -> Result<(), PublishError> {
        let entry = self
            .stores
            .work
            .update(uow, |entry| {
                entry.record.current = match entry.uow.outcome {
                    ProcessingOutcome::Failed => ActivityStatus::Failed,
                    _ => ActivityStatus::Finished,
                };
                entry.clone()
            })
            .await
            .ok_or_else(|| PublishError::UnknownWork(uow.to_string()))?;

        let origin = entry
            .record
            .origin
            .clone()
            .ok_or_else(|| PublishError::NoRoute(format!("{uow} has no origin node")))?;
        let endpoint = self
            .topology
            .resolve(&origin)
            .ok_or_else(|| PublishError::NoRoute(origin.to_string()))?;

        let outcome = entry.uow.outcome;
        let packet = TransportPacket {
            record: entry.record,
            uow: entry.uow,
        };
        self.publisher.publish(&endpoint, packet).await?;
        tracing::info!(uow = %uow, endpoint = %endpoint, outcome = ?outcome, "twin.uow.published");
        Ok(())
    }

    /// Drop every trace of a unit of work from the stores.
    ///
    /// The work entry goes first: fan-out refuses a unit of work that is
    /// either claimed or unregistered, and the claim lives until the
    /// causality records are dropped.
    pub(crate) async fn purge(&self, uow: &UowId) {
        self.stores.work.remove(uow).await;
        let stimuli = self.stores.stimuli.remove_uow(uow).await;
        let leftover = self.stores.outcomes.take(stimuli.iter()).await;
        let records = self.stores.causality.purge(uow).await;
        tracing::debug!(
            uow = %uow,
            stimuli = stimuli.len(),
            records,
            leftover_outcomes = leftover.len(),
            "twin.uow.purged"
        );
    }
}
