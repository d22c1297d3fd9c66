//! Causality Tracker: which behaviour executions a unit of work still waits on.
//!
//! Records are nested `uow → stimulus → twin → behaviour → status`. A unit
//! of work is complete when every record under it is finished, and
//! vacuously complete when it has none. Completion is *claimed* at most
//! once per unit of work so aggregation cannot fire twice.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use twin_protocol::dispatch::DispatchKey;
use twin_protocol::id::{BehaviourId, StimulusId, TwinId, UowId};

/// State of one (uow, stimulus, twin, behaviour) record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CausalityStatus {
    /// Enqueued or executing.
    Queued,
    /// The behaviour reported back (or was dead-lettered).
    Finished,
}

type BehaviourMap = HashMap<BehaviourId, CausalityStatus>;
type TwinMap = HashMap<TwinId, BehaviourMap>;
type StimulusMap = HashMap<StimulusId, TwinMap>;

#[derive(Default)]
struct Tree {
    uows: HashMap<UowId, StimulusMap>,
    claimed: HashSet<UowId>,
}

fn statuses(stimuli: &StimulusMap) -> impl Iterator<Item = &CausalityStatus> {
    stimuli
        .values()
        .flat_map(|twins| twins.values())
        .flat_map(|behaviours| behaviours.values())
}

/// Nested completion index gating aggregation.
pub struct CausalityTracker {
    tree: Mutex<Tree>,
}

impl CausalityTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self {
            tree: Mutex::new(Tree::default()),
        }
    }

    /// Record that `key` has been enqueued. An existing record keeps its
    /// status.
    pub async fn mark_queued(&self, key: &DispatchKey) {
        let mut tree = self.tree.lock().await;
        tree.uows
            .entry(key.uow.clone())
            .or_default()
            .entry(key.stimulus.clone())
            .or_default()
            .entry(key.twin.clone())
            .or_default()
            .entry(key.behaviour.clone())
            .or_insert(CausalityStatus::Queued);
    }

    /// Record that `key` has finished, creating the record if the unit of
    /// work is tracked but this coordinate is new.
    ///
    /// Returns `false` without recording anything when the unit of work
    /// is not tracked at all (never enqueued, or already purged).
    pub async fn mark_finished(&self, key: &DispatchKey) -> bool {
        let mut tree = self.tree.lock().await;
        let Some(stimuli) = tree.uows.get_mut(&key.uow) else {
            return false;
        };
        stimuli
            .entry(key.stimulus.clone())
            .or_default()
            .entry(key.twin.clone())
            .or_default()
            .insert(key.behaviour.clone(), CausalityStatus::Finished);
        true
    }

    /// Status of a single record.
    pub async fn status(&self, key: &DispatchKey) -> Option<CausalityStatus> {
        let tree = self.tree.lock().await;
        tree.uows
            .get(&key.uow)?
            .get(&key.stimulus)?
            .get(&key.twin)?
            .get(&key.behaviour)
            .copied()
    }

    /// Whether every record under `uow` is finished. True when there are
    /// no records.
    pub async fn is_complete(&self, uow: &UowId) -> bool {
        let tree = self.tree.lock().await;
        tree.uows
            .get(uow)
            .map(|stimuli| statuses(stimuli).all(|s| *s == CausalityStatus::Finished))
            .unwrap_or(true)
    }

    /// Whether `uow` has any records.
    pub async fn has_records(&self, uow: &UowId) -> bool {
        let tree = self.tree.lock().await;
        tree.uows
            .get(uow)
            .is_some_and(|stimuli| statuses(stimuli).next().is_some())
    }

    /// Claim the completion of `uow`: succeeds once, and only when the
    /// unit of work has at least one record and all of them are finished.
    pub async fn claim_if_complete(&self, uow: &UowId) -> bool {
        let mut tree = self.tree.lock().await;
        if tree.claimed.contains(uow) {
            return false;
        }
        let complete = tree.uows.get(uow).is_some_and(|stimuli| {
            let mut any = false;
            let all = statuses(stimuli).all(|s| {
                any = true;
                *s == CausalityStatus::Finished
            });
            any && all
        });
        if complete {
            tree.claimed.insert(uow.clone());
        }
        complete
    }

    /// Claim the completion of a unit of work nothing was enqueued for.
    /// Succeeds once, and only when `uow` has no records.
    pub async fn claim_if_untracked(&self, uow: &UowId) -> bool {
        let mut tree = self.tree.lock().await;
        if tree.claimed.contains(uow) {
            return false;
        }
        let untracked = tree
            .uows
            .get(uow)
            .is_none_or(|stimuli| statuses(stimuli).next().is_none());
        if untracked {
            tree.claimed.insert(uow.clone());
        }
        untracked
    }

    /// Whether the completion of `uow` has been claimed.
    pub async fn is_claimed(&self, uow: &UowId) -> bool {
        self.tree.lock().await.claimed.contains(uow)
    }

    /// Drop every record and the completion claim for `uow`. Returns how
    /// many records were removed.
    pub async fn purge(&self, uow: &UowId) -> usize {
        let mut tree = self.tree.lock().await;
        tree.claimed.remove(uow);
        tree.uows
            .remove(uow)
            .map(|stimuli| statuses(&stimuli).count())
            .unwrap_or(0)
    }

    /// Every record under `uow`.
    pub async fn records(&self, uow: &UowId) -> Vec<(DispatchKey, CausalityStatus)> {
        let tree = self.tree.lock().await;
        let Some(stimuli) = tree.uows.get(uow) else {
            return vec![];
        };
        let mut out = vec![];
        for (stimulus, twins) in stimuli {
            for (twin, behaviours) in twins {
                for (behaviour, status) in behaviours {
                    out.push((
                        DispatchKey {
                            uow: uow.clone(),
                            stimulus: stimulus.clone(),
                            twin: twin.clone(),
                            behaviour: behaviour.clone(),
                        },
                        *status,
                    ));
                }
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Total number of records across all units of work.
    pub async fn len(&self) -> usize {
        let tree = self.tree.lock().await;
        tree.uows.values().map(|s| statuses(s).count()).sum()
    }

    /// Whether no records are held.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for CausalityTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(uow: &str, stimulus: &str, twin: &str, behaviour: &str) -> DispatchKey {
        DispatchKey {
            uow: UowId::new(uow),
            stimulus: StimulusId::new(stimulus),
            twin: TwinId::new(twin),
            behaviour: BehaviourId::new(behaviour, "1"),
        }
    }

    #[tokio::test]
    async fn untracked_uow_is_vacuously_complete() {
        let tracker = CausalityTracker::new();
        let u = UowId::new("u1");
        assert!(tracker.is_complete(&u).await);
        assert!(!tracker.has_records(&u).await);
        assert!(!tracker.claim_if_complete(&u).await);
    }

    #[tokio::test]
    async fn complete_only_when_every_record_finished() {
        let tracker = CausalityTracker::new();
        let a = key("u1", "s1", "twin-a", "b1");
        let b = key("u1", "s1", "twin-a", "b2");
        tracker.mark_queued(&a).await;
        tracker.mark_queued(&b).await;

        assert!(tracker.mark_finished(&a).await);
        assert!(!tracker.is_complete(&UowId::new("u1")).await);
        assert!(!tracker.claim_if_complete(&UowId::new("u1")).await);

        assert!(tracker.mark_finished(&b).await);
        assert!(tracker.is_complete(&UowId::new("u1")).await);
    }

    #[tokio::test]
    async fn completion_is_claimed_once() {
        let tracker = CausalityTracker::new();
        let a = key("u1", "s1", "twin-a", "b1");
        tracker.mark_queued(&a).await;
        tracker.mark_finished(&a).await;

        assert!(tracker.claim_if_complete(&UowId::new("u1")).await);
        assert!(tracker.is_claimed(&UowId::new("u1")).await);
        assert!(!tracker.claim_if_complete(&UowId::new("u1")).await);
    }

    #[tokio::test]
    async fn queued_does_not_reset_finished() {
        let tracker = CausalityTracker::new();
        let a = key("u1", "s1", "twin-a", "b1");
        tracker.mark_queued(&a).await;
        tracker.mark_finished(&a).await;
        tracker.mark_queued(&a).await;
        assert_eq!(tracker.status(&a).await, Some(CausalityStatus::Finished));
    }

    #[tokio::test]
    async fn finished_for_untracked_uow_is_ignored() {
        let tracker = CausalityTracker::new();
        assert!(!tracker.mark_finished(&key("gone", "s", "t", "b")).await);
        assert!(tracker.is_empty().await);
    }

    #[tokio::test]
    async fn finished_creates_sibling_record_lazily() {
        let tracker = CausalityTracker::new();
        tracker.mark_queued(&key("u1", "s1", "twin-a", "b1")).await;
        assert!(tracker.mark_finished(&key("u1", "s1", "twin-b", "b1")).await);
        assert_eq!(tracker.len().await, 2);
    }

    #[tokio::test]
    async fn untracked_claim_requires_no_records() {
        let tracker = CausalityTracker::new();
        let u = UowId::new("u1");
        assert!(tracker.claim_if_untracked(&u).await);
        assert!(!tracker.claim_if_untracked(&u).await);

        tracker.mark_queued(&key("u2", "s", "t", "b")).await;
        assert!(!tracker.claim_if_untracked(&UowId::new("u2")).await);
    }

    #[tokio::test]
    async fn records_are_listed_in_key_order() {
        let tracker = CausalityTracker::new();
        let late = key("u1", "s2", "twin-a", "b1");
        let early = key("u1", "s1", "twin-b", "b1");
        tracker.mark_queued(&late).await;
        tracker.mark_queued(&early).await;
        tracker.mark_finished(&early).await;

        assert_eq!(
            tracker.records(&UowId::new("u1")).await,
            vec![
                (early, CausalityStatus::Finished),
                (late, CausalityStatus::Queued),
            ]
        );
        assert!(tracker.records(&UowId::new("nope")).await.is_empty());
    }

    #[tokio::test]
    async fn purge_drops_records_and_claim() {
        let tracker = CausalityTracker::new();
        let a = key("u1", "s1", "twin-a", "b1");
        let other = key("u2", "s2", "twin-a", "b1");
        tracker.mark_queued(&a).await;
        tracker.mark_queued(&other).await;
        tracker.mark_finished(&a).await;
        assert!(tracker.claim_if_complete(&UowId::new("u1")).await);

        assert_eq!(tracker.purge(&UowId::new("u1")).await, 1);
        assert!(!tracker.is_claimed(&UowId::new("u1")).await);
        assert!(tracker.records(&UowId::new("u1")).await.is_empty());
        assert_eq!(tracker.len().await, 1);
        assert_eq!(
            tracker.status(&other).await,
            Some(CausalityStatus::Queued)
        );
    }
}
