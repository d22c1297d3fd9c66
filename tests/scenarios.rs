//! End-to-end scenarios for the orchestration engine.
//!
//! Each scenario drives the engine by hand with `manifest_once` so the
//! order of promotion and completion is deterministic:
//!
//! - **Single behaviour**: one stimulus, one twin, one published result
//! - **Fan-out**: publish waits for every behaviour that was dispatched
//! - **Admission**: a second package waits behind the twin's lock
//! - **Encode failure**: FAILED, still published exactly once

use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use twin_orch_local::{EngineConfig, TwinOrchestrator};
use twin_protocol::test_utils::*;
use twin_protocol::*;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Harness {
    orch: TwinOrchestrator<DemoKind>,
    publisher: Arc<RecordingPublisher>,
}

impl Harness {
    fn new() -> Self {
        Self::with_encoder(Arc::new(JsonEncoder))
    }

    fn with_encoder(encoder: Arc<dyn ResourceEncoder<DemoKind>>) -> Self {
        init_tracing();
        let publisher = Arc::new(RecordingPublisher::new());
        let orch = TwinOrchestrator::builder(publisher.clone())
            .config(EngineConfig::default().with_lock_lease(None))
            .encoder(encoder)
            .build()
            .unwrap();
        Self { orch, publisher }
    }

    async fn behaviour(
        &self,
        name: &str,
        filter: ByKind<DemoKind>,
    ) -> UnboundedReceiver<DispatchPackage<DemoKind>> {
        let (endpoint, rx) = ChannelEndpoint::<DemoKind>::new();
        self.orch
            .register_behaviour(
                BehaviourId::new(name, "1"),
                BehaviourRegistration::new(Arc::new(filter), Arc::new(endpoint)),
            )
            .await;
        rx
    }

    async fn ingress(&self) -> UnitOfWork {
        self.orch
            .register_new_uow(
                Payload::new("matrix+json", r#"{"type":"m.room.member"}"#),
                ActivityRecord::new(),
                NodeRef::new("ingest.matrix"),
            )
            .await
    }

    async fn stimulus(&self, uow: &UnitOfWork, kind: DemoKind, natural_id: &str) -> usize {
        self.orch
            .register_new_stimulus(Stimulus::new(
                uow.id.clone(),
                kind,
                natural_id,
                json!({"id": natural_id}),
            ))
            .await
    }
}

fn answer(pkg: &DispatchPackage<DemoKind>, id: &str) -> OutcomeSet<DemoKind> {
    let resource = OutputResource::new(*pkg.stimulus.kind(), id, json!({"id": id}));
    pkg.outcome_set().with(pkg.outcome(resource))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Single behaviour
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn single_behaviour_publishes_once() {
    let h = Harness::new();
    let mut rx = h
        .behaviour("room-sync", ByKind::new().route(DemoKind::Room, [TwinId::new("room-1")]))
        .await;

    let uow = h.ingress().await;
    assert_eq!(h.stimulus(&uow, DemoKind::Room, "!abc:example.org").await, 1);
    assert_eq!(h.orch.manifest_once().await, 1);

    let pkg = rx.recv().await.unwrap();
    assert_eq!(pkg.twin, TwinId::new("room-1"));
    assert_eq!(pkg.stimulus.natural_id(), "!abc:example.org");
    assert!(h.orch.register_behaviour_completion(answer(&pkg, "room-1")).await);

    let published = h.publisher.published();
    assert_eq!(published.len(), 1);
    let (endpoint, packet) = &published[0];
    assert_eq!(endpoint, &EndpointRef::new("ingest.matrix.egress"));
    assert_eq!(packet.uow.id, uow.id);
    assert_eq!(packet.uow.outcome, ProcessingOutcome::Success);
    assert_eq!(packet.uow.failure, None);
    assert_eq!(packet.uow.egress.len(), 1);
    assert_eq!(packet.uow.egress[0].descriptor.kind, "room");
    assert_eq!(packet.record.current, ActivityStatus::Finished);
    assert_eq!(packet.record.origin, Some(NodeRef::new("ingest.matrix")));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fan-out waits for both behaviours
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn fanout_publishes_after_every_behaviour_reports() {
    let h = Harness::new();
    let mut membership = h
        .behaviour(
            "membership",
            ByKind::new().route(DemoKind::Practitioner, [TwinId::new("dr-grey")]),
        )
        .await;
    let mut roles = h
        .behaviour(
            "roles",
            ByKind::new().route(DemoKind::Practitioner, [TwinId::new("ward-4")]),
        )
        .await;

    let uow = h.ingress().await;
    assert_eq!(h.stimulus(&uow, DemoKind::Practitioner, "p-1").await, 2);
    assert_eq!(h.orch.manifest_once().await, 2);

    let first = membership.recv().await.unwrap();
    let second = roles.recv().await.unwrap();

    h.orch
        .register_behaviour_completion(answer(&first, "membership"))
        .await;
    assert!(h.publisher.published().is_empty());
    assert_eq!(h.orch.stats().await.units_in_flight, 1);

    h.orch
        .register_behaviour_completion(answer(&second, "roles"))
        .await;
    let published = h.publisher.published();
    assert_eq!(published.len(), 1);
    let bodies: Vec<&str> = published[0]
        .1
        .uow
        .egress
        .iter()
        .map(|p| p.body.as_str())
        .collect();
    assert_eq!(bodies.len(), 2);
    assert!(bodies.contains(&r#"{"id":"membership"}"#));
    assert!(bodies.contains(&r#"{"id":"roles"}"#));
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admission queues behind the lock
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn second_package_waits_behind_the_twin_lock() {
    let h = Harness::new();
    let room = TwinId::new("room-1");
    let mut rx = h
        .behaviour(
            "room-sync",
            ByKind::new()
                .route(DemoKind::Room, [room.clone()])
                .route(DemoKind::RoomMessage, [room.clone()]),
        )
        .await;

    let first_uow = h.ingress().await;
    let second_uow = h.ingress().await;
    h.stimulus(&first_uow, DemoKind::Room, "r1").await;
    h.stimulus(&second_uow, DemoKind::RoomMessage, "m1").await;
    assert_eq!(h.orch.queue_len(&room).await, 2);

    assert_eq!(h.orch.manifest_once().await, 1);
    let first = rx.recv().await.unwrap();
    assert_eq!(first.uow, first_uow.id);

    // Still locked: nothing else is promoted for the twin.
    assert_eq!(h.orch.manifest_once().await, 0);
    assert!(rx.try_recv().is_err());
    assert_eq!(h.orch.queue_len(&room).await, 1);

    h.orch
        .register_behaviour_completion(answer(&first, "r1"))
        .await;
    assert_eq!(h.publisher.count_for(&first_uow.id), 1);

    assert_eq!(h.orch.manifest_once().await, 1);
    let second = rx.recv().await.unwrap();
    assert_eq!(second.uow, second_uow.id);
    h.orch
        .register_behaviour_completion(answer(&second, "m1"))
        .await;
    assert_eq!(h.publisher.count_for(&second_uow.id), 1);
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Encode failure
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[tokio::test]
async fn encode_failure_fails_the_uow_but_publishes_once() {
    let h = Harness::with_encoder(Arc::new(FailingEncoder::poisoned(["unencodable"])));
    let mut rx = h
        .behaviour(
            "directory",
            ByKind::new().route(DemoKind::PractitionerRole, [TwinId::new("dr-grey")]),
        )
        .await;

    let uow = h.ingress().await;
    h.stimulus(&uow, DemoKind::PractitionerRole, "role-1").await;
    h.orch.manifest_once().await;
    let pkg = rx.recv().await.unwrap();

    let set = pkg
        .outcome_set()
        .with(pkg.outcome(OutputResource::new(
            DemoKind::PractitionerRole,
            "unencodable",
            json!({}),
        )))
        .with(pkg.outcome(OutputResource::new(
            DemoKind::PractitionerRole,
            "fine",
            json!({}),
        )));
    h.orch.register_behaviour_completion(set).await;

    let published = h.publisher.published();
    assert_eq!(published.len(), 1);
    let packet = &published[0].1;
    assert_eq!(packet.uow.outcome, ProcessingOutcome::Failed);
    assert!(packet.uow.egress.is_empty());
    let failure = packet.uow.failure.as_deref().unwrap();
    assert!(failure.contains("unencodable"));
    assert_eq!(packet.record.current, ActivityStatus::Failed);
    assert_eq!(h.orch.stats().await.units_in_flight, 0);
}
