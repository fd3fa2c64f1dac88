use serde::Serialize;

use crate::error::ReorderError;
use crate::guard::{self, Fingerprint};
use crate::ids::{ParentContext, SiblingId};
use crate::placement::PlacementHooks;
use crate::position::{self, TargetSpec};
use crate::renumber::{self, RenumberOptions, RenumberedWeights, WeightChange};
use crate::snapshot::{self, PositionChoice, SiblingSnapshot};
use crate::store::SiblingStore;

/// One attempt at repositioning a link
///
/// Holds the snapshot and fingerprint taken when the session began. Dropping
/// a session without committing leaves the store untouched.
#[derive(Debug, Clone)]
pub struct ReorderSession {
    snapshot: SiblingSnapshot,
    fingerprint: Fingerprint,
    moved: SiblingId,
    title: Option<String>,
}

/// Weights computed by a session, ready to commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReorderPlan {
    pub parent: ParentContext,
    pub moved: SiblingId,
    /// Title to store for the moved link, if any
    pub title: Option<String>,
    /// The target actually used, after placement hooks
    pub target: TargetSpec,
    pub index: usize,
    pub weights: RenumberedWeights,
    pub changes: Vec<WeightChange>,
    /// Fingerprint the live siblings must still match at commit time
    pub fingerprint: Fingerprint,
}

impl ReorderPlan {
    /// Fingerprint of the siblings once this plan is committed
    pub fn committed_fingerprint(&self) -> Fingerprint {
        Fingerprint::from_weights(&self.weights)
    }
}

impl ReorderSession {
    /// Capture the siblings of `parent` and start a session for `moved`
    pub fn begin<S: SiblingStore + ?Sized>(
        store: &S,
        parent: &ParentContext,
        moved: SiblingId,
    ) -> Result<Self, ReorderError> {
        let snapshot = snapshot::capture(store, parent)?;
        Ok(Self::from_snapshot(snapshot, moved))
    }

    /// Continue a session whose fingerprint was handed out earlier
    ///
    /// The siblings are read again and must still match `expected`; positions
    /// chosen against an older order are meaningless otherwise.
    pub fn resume<S: SiblingStore + ?Sized>(
        store: &S,
        parent: &ParentContext,
        moved: SiblingId,
        expected: Fingerprint,
    ) -> Result<Self, ReorderError> {
        let snapshot = snapshot::capture(store, parent)?;
        guard::validate(&expected, &snapshot)?;
        Ok(Self {
            snapshot,
            fingerprint: expected,
            moved,
            title: None,
        })
    }

    pub fn from_snapshot(snapshot: SiblingSnapshot, moved: SiblingId) -> Self {
        let fingerprint = snapshot.fingerprint();
        Self {
            snapshot,
            fingerprint,
            moved,
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn snapshot(&self) -> &SiblingSnapshot {
        &self.snapshot
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn moved(&self) -> &SiblingId {
        &self.moved
    }

    pub fn position_choices(&self) -> Vec<PositionChoice> {
        self.snapshot.position_choices(&self.moved, self.title.as_deref())
    }

    /// Resolve `target` and compute the new weights
    ///
    /// Placement hooks are consulted only when `target` is `NoPreference`.
    /// Target errors are returned before anything is computed.
    pub fn plan(
        &self,
        target: &TargetSpec,
        hooks: &PlacementHooks,
        options: RenumberOptions,
    ) -> Result<ReorderPlan, ReorderError> {
        let target = match target {
            TargetSpec::NoPreference => hooks
                .suggest(&self.snapshot, &self.moved)
                .unwrap_or(TargetSpec::NoPreference),
            explicit => explicit.clone(),
        };

        let index = position::resolve(&self.snapshot, &target, &self.moved)?;
        let weights = renumber::renumber(&self.snapshot, &self.moved, index, options)?;
        let changes = weights.changes(&self.snapshot);

        Ok(ReorderPlan {
            parent: self.snapshot.parent().clone(),
            moved: self.moved.clone(),
            title: self.title.clone(),
            target,
            index,
            weights,
            changes,
            fingerprint: self.fingerprint.clone(),
        })
    }

    /// Hand `plan` to the store's atomic compare-and-commit
    pub fn commit<S: SiblingStore + ?Sized>(store: &S, plan: &ReorderPlan) -> Result<(), ReorderError> {
        match store.commit_weights(plan) {
            Ok(()) => {
                tracing::info!(
                    parent = %plan.parent,
                    moved = %plan.moved,
                    index = plan.index,
                    changed = plan.changes.len(),
                    "committed sibling weights"
                );
                Ok(())
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(parent = %plan.parent, moved = %plan.moved, "commit rejected: {}", e);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::Weight;
    use crate::placement::StaticPlacement;
    use crate::position::Side;
    use crate::snapshot::SiblingRecord;
    use crate::store::MemoryStore;

    fn tools() -> ParentContext {
        ParentContext::root("tools")
    }

    fn weight_of(store: &MemoryStore, id: &str) -> Weight {
        store
            .list_siblings(&tools())
            .unwrap()
            .into_iter()
            .find(|r| r.id.as_str() == id)
            .map(|r| r.weight)
            .unwrap()
    }

    fn add(store: &MemoryStore, id: &str, target: TargetSpec, hooks: &PlacementHooks) {
        let session = ReorderSession::begin(store, &tools(), id.into()).unwrap();
        let plan = session.plan(&target, hooks, RenumberOptions::default()).unwrap();
        ReorderSession::commit(store, &plan).unwrap();
    }

    /// Walks the sequence of link insertions the menu form goes through:
    /// explicit positions, the top-of-list default, then hook placements.
    #[test]
    fn test_menu_form_sequence() {
        let store = MemoryStore::new();
        store.insert(&tools(), SiblingRecord::new("node.add_page", 0));
        store.insert(&tools(), SiblingRecord::new("filter.tips_all", 0));
        let none = PlacementHooks::new();

        add(&store, "link1", TargetSpec::at(1), &none);
        assert_eq!(weight_of(&store, "node.add_page"), -50);
        assert_eq!(weight_of(&store, "link1"), -49);
        assert_eq!(weight_of(&store, "filter.tips_all"), -48);

        // Reorder to link1, filter.tips_all, link2, node.add_page.
        add(&store, "node.add_page", TargetSpec::at(99), &none);
        add(&store, "link2", TargetSpec::above("node.add_page"), &none);
        assert_eq!(weight_of(&store, "link1"), -50);
        assert_eq!(weight_of(&store, "filter.tips_all"), -49);
        assert_eq!(weight_of(&store, "link2"), -48);
        assert_eq!(weight_of(&store, "node.add_page"), -47);

        add(&store, "link3", TargetSpec::NoPreference, &none);
        assert_eq!(weight_of(&store, "link3"), -50);
        assert_eq!(weight_of(&store, "node.add_page"), -46);

        let mut hooks = PlacementHooks::new();
        hooks.register(StaticPlacement::new(tools(), Side::Above, "link2"));
        add(&store, "link4", TargetSpec::NoPreference, &hooks);
        assert_eq!(weight_of(&store, "link3"), -50);
        assert_eq!(weight_of(&store, "link1"), -49);
        assert_eq!(weight_of(&store, "filter.tips_all"), -48);
        assert_eq!(weight_of(&store, "link4"), -47);
        assert_eq!(weight_of(&store, "link2"), -46);
        assert_eq!(weight_of(&store, "node.add_page"), -45);

        let mut hooks = PlacementHooks::new();
        hooks.register(StaticPlacement::new(tools(), Side::Below, "link2"));
        add(&store, "link5", TargetSpec::NoPreference, &hooks);
        assert_eq!(weight_of(&store, "link2"), -46);
        assert_eq!(weight_of(&store, "link5"), -45);
        assert_eq!(weight_of(&store, "node.add_page"), -44);
    }

    #[test]
    fn test_explicit_target_ignores_hooks() {
        let snapshot = SiblingSnapshot::from_records(
            tools(),
            vec![SiblingRecord::new("a", 1), SiblingRecord::new("b", 2)],
        );
        let mut hooks = PlacementHooks::new();
        hooks.register(StaticPlacement::new(tools(), Side::Below, "b"));

        let session = ReorderSession::from_snapshot(snapshot, "m".into());
        let plan = session.plan(&TargetSpec::at(0), &hooks, RenumberOptions::default()).unwrap();

        assert_eq!(plan.target, TargetSpec::at(0));
        assert_eq!(plan.weights.order()[0].as_str(), "m");
    }

    #[test]
    fn test_target_errors_fail_before_renumbering() {
        let snapshot = SiblingSnapshot::from_records(tools(), vec![SiblingRecord::new("a", 1)]);
        let session = ReorderSession::from_snapshot(snapshot, "a".into());

        match session.plan(&TargetSpec::below("a"), &PlacementHooks::new(), RenumberOptions::default()) {
            Err(ReorderError::InvalidTarget { .. }) => {}
            other => panic!("Expected InvalidTarget, got {:?}", other),
        }
    }

    #[test]
    fn test_resume_with_stale_fingerprint_conflicts() {
        let store = MemoryStore::new();
        store.insert(&tools(), SiblingRecord::new("a", -50));
        store.insert(&tools(), SiblingRecord::new("b", -49));
        let handed_out = ReorderSession::begin(&store, &tools(), "m".into())
            .unwrap()
            .fingerprint()
            .clone();

        store.set_weight(&tools(), &"b".into(), -10);

        match ReorderSession::resume(&store, &tools(), "m".into(), handed_out) {
            Err(e @ ReorderError::Conflict { .. }) => assert!(e.is_retryable()),
            other => panic!("Expected Conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_committed_fingerprint_matches_store() {
        let store = MemoryStore::new();
        store.insert(&tools(), SiblingRecord::new("a", 3));
        let plan = ReorderSession::begin(&store, &tools(), "m".into())
            .unwrap()
            .plan(&TargetSpec::below("a"), &PlacementHooks::new(), RenumberOptions::default())
            .unwrap();
        ReorderSession::commit(&store, &plan).unwrap();

        let live = snapshot::capture(&store, &tools()).unwrap();
        assert_eq!(live.fingerprint(), plan.committed_fingerprint());
    }
}
