//! Engine-wide properties under a running manifestor and concurrent load.
//!
//! A self-completing behaviour answers every package from a spawned task
//! and checks, as it goes, that no twin ever has two executions at once
//! and that each twin sees its packages in enqueue order.

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use twin_orch_local::{EngineConfig, TwinOrchestrator};
use twin_protocol::test_utils::*;
use twin_protocol::*;

#[derive(Default)]
struct Observations {
    active: HashSet<TwinId>,
    violations: Vec<String>,
    delivered: HashMap<TwinId, Vec<String>>,
}

/// Answers each package after a short pause, recording what it saw.
struct SelfCompleting {
    orch: TwinOrchestrator<DemoKind>,
    seen: Arc<Mutex<Observations>>,
}

#[async_trait]
impl BehaviourEndpoint<DemoKind> for SelfCompleting {
    async fn deliver(&self, package: DispatchPackage<DemoKind>) -> Result<(), DispatchError> {
        {
            let mut seen = self.seen.lock().unwrap();
            if !seen.active.insert(package.twin.clone()) {
                seen.violations
                    .push(format!("{} delivered while busy", package.twin));
            }
            seen.delivered
                .entry(package.twin.clone())
                .or_default()
                .push(package.stimulus.natural_id().to_string());
        }
        let orch = self.orch.clone();
        let seen = Arc::clone(&self.seen);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            seen.lock().unwrap().active.remove(&package.twin);
            let out = package.outcome(OutputResource::new(
                *package.stimulus.kind(),
                package.stimulus.natural_id(),
                json!({"twin": package.twin.as_str()}),
            ));
            orch.register_behaviour_completion(package.outcome_set().with(out))
                .await;
        });
        Ok(())
    }
}

const TWINS: [&str; 3] = ["room-1", "room-2", "alice"];

async fn engine() -> (
    TwinOrchestrator<DemoKind>,
    Arc<RecordingPublisher>,
    Arc<Mutex<Observations>>,
) {
    let publisher = Arc::new(RecordingPublisher::new());
    let orch: TwinOrchestrator<DemoKind> = TwinOrchestrator::builder(publisher.clone())
        .config(
            EngineConfig::default()
                .with_initial_delay(DurationMs::ZERO)
                .with_tick_period(DurationMs::from_millis(5)),
        )
        .build()
        .unwrap();
    let seen = Arc::new(Mutex::new(Observations::default()));
    let endpoint = Arc::new(SelfCompleting {
        orch: orch.clone(),
        seen: Arc::clone(&seen),
    });
    // Two behaviours share the endpoint; content decides the twins.
    for name in ["sync", "audit"] {
        orch.register_behaviour(
            BehaviourId::new(name, "1"),
            BehaviourRegistration::new(Arc::new(ContentTwins::new("twins")), endpoint.clone()),
        )
        .await;
    }
    (orch, publisher, seen)
}

async fn wait_for_publishes(publisher: &RecordingPublisher, n: usize) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while publisher.published().len() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_load_keeps_every_invariant() {
    let (orch, publisher, seen) = engine().await;

    let mut uows = vec![];
    let mut expected_order: HashMap<TwinId, Vec<String>> = HashMap::new();
    for i in 0..12 {
        let uow = orch
            .register_new_uow(
                Payload::new("json", "{}"),
                ActivityRecord::new(),
                NodeRef::new("ingest"),
            )
            .await;
        for j in 0..2 {
            let targets: Vec<&str> = TWINS.iter().copied().skip((i + j) % 3).take(2).collect();
            let natural = format!("m-{i:02}-{j}");
            let s = Stimulus::new(
                uow.id.clone(),
                DemoKind::RoomMessage,
                natural.clone(),
                json!({ "twins": targets }),
            );
            // Both behaviours enqueue for each target twin.
            for t in &targets {
                let order = expected_order.entry(TwinId::new(*t)).or_default();
                order.push(natural.clone());
                order.push(natural.clone());
            }
            assert_eq!(orch.register_new_stimulus(s).await, targets.len() * 2);
        }
        uows.push(uow.id);
    }

    // Every stimulus is in before the first promotion, so no unit of
    // work can complete while it is still being derived.
    orch.start().await.unwrap();
    wait_for_publishes(&publisher, uows.len()).await;
    orch.shutdown().await;

    // Single publish.
    for id in &uows {
        assert_eq!(publisher.count_for(id), 1, "uow {id} published more than once");
    }
    assert_eq!(publisher.published().len(), uows.len());
    for (_, packet) in publisher.published() {
        assert_eq!(packet.uow.outcome, ProcessingOutcome::Success);
    }

    let seen = seen.lock().unwrap();
    // Lock invariant.
    assert!(seen.violations.is_empty(), "{:?}", seen.violations);
    // FIFO per twin.
    for (twin, expected) in &expected_order {
        assert_eq!(seen.delivered.get(twin), Some(expected), "order for {twin}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn nothing_is_left_behind_after_publish() {
    let (orch, publisher, _seen) = engine().await;
    orch.start().await.unwrap();

    let mut count = 0;
    for i in 0..5 {
        let uow = orch
            .register_new_uow(
                Payload::new("json", "{}"),
                ActivityRecord::new(),
                NodeRef::new("ingest"),
            )
            .await;
        let s = Stimulus::new(
            uow.id.clone(),
            DemoKind::Room,
            format!("r-{i}"),
            json!({ "twins": [TWINS[i % 3]] }),
        );
        orch.register_new_stimulus(s).await;
        count += 1;
    }
    wait_for_publishes(&publisher, count).await;
    orch.shutdown().await;

    // Completions run on spawned tasks; give the last purge a moment.
    tokio::time::timeout(Duration::from_secs(5), async {
        while orch.stats().await.units_in_flight > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    let stats = orch.stats().await;
    assert_eq!(stats.units_in_flight, 0);
    assert_eq!(stats.stimuli, 0);
    assert_eq!(stats.outcomes, 0);
    assert_eq!(stats.causality_records, 0);
    assert_eq!(stats.queued_packages, 0);
    assert_eq!(stats.locked_twins, 0);
    assert_eq!(stats.dead_letters, 0);
    assert!(orch.stores().outcomes.is_empty().await);
}
