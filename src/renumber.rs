use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::error::ReorderError;
use crate::ids::{SiblingId, Weight};
use crate::snapshot::SiblingSnapshot;

/// Weight given to the first sibling when a whole list is renumbered
pub const DEFAULT_BASE_WEIGHT: Weight = -50;

/// How siblings are renumbered after a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenumberPolicy {
    /// Every sibling gets `base, base + 1, ...` in the new order.
    #[default]
    Sequential,
    /// Only the moved link and, when there is no integer room for it, the
    /// siblings directly below it are renumbered. Siblings above the
    /// insertion point never change.
    AffectedSpan,
}

/// Options for [`renumber`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenumberOptions {
    pub policy: RenumberPolicy,
    pub base_weight: Weight,
}

impl Default for RenumberOptions {
    fn default() -> Self {
        Self {
            policy: RenumberPolicy::default(),
            base_weight: DEFAULT_BASE_WEIGHT,
        }
    }
}

/// A single sibling whose weight differs from the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightChange {
    pub id: SiblingId,
    /// Weight in the snapshot, `None` for a link that was not a sibling yet
    pub from: Option<Weight>,
    pub to: Weight,
}

/// Complete weight assignment for a sibling set, in display order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenumberedWeights {
    entries: Vec<WeightEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub id: SiblingId,
    pub weight: Weight,
}

impl RenumberedWeights {
    pub fn entries(&self) -> &[WeightEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &SiblingId) -> Option<Weight> {
        self.entries.iter().find(|e| &e.id == id).map(|e| e.weight)
    }

    /// Sibling ids in their new display order
    pub fn order(&self) -> Vec<SiblingId> {
        self.entries.iter().map(|e| e.id.clone()).collect()
    }

    pub fn to_map(&self) -> BTreeMap<SiblingId, Weight> {
        self.entries.iter().map(|e| (e.id.clone(), e.weight)).collect()
    }

    /// Entries whose weight differs from `snapshot`
    pub fn changes(&self, snapshot: &SiblingSnapshot) -> Vec<WeightChange> {
        self.entries
            .iter()
            .filter_map(|e| {
                let from = snapshot.weight_of(&e.id);
                (from != Some(e.weight)).then(|| WeightChange {
                    id: e.id.clone(),
                    from,
                    to: e.weight,
                })
            })
            .collect()
    }

    /// Check that weights strictly increase along the order and ids are unique
    pub fn verify(&self) -> Result<(), ReorderError> {
        for pair in self.entries.windows(2) {
            if pair[0].weight >= pair[1].weight {
                return Err(ReorderError::InvariantViolation {
                    reason: format!(
                        "'{}' ({}) does not sort before '{}' ({})",
                        pair[0].id, pair[0].weight, pair[1].id, pair[1].weight
                    ),
                });
            }
        }
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if !seen.insert(&entry.id) {
                return Err(ReorderError::InvariantViolation {
                    reason: format!("'{}' appears more than once", entry.id),
                });
            }
        }
        Ok(())
    }
}

/// Compute new weights for all siblings after moving `moved` to `target_index`
///
/// `target_index` addresses the order with `moved` removed, as produced by
/// [`crate::position::resolve`]. Out-of-range values are clamped.
///
/// # Returns
/// * `Ok(RenumberedWeights)` covering every snapshot sibling plus `moved`
/// * `Err(ReorderError::InvariantViolation)` if no consistent assignment could
///   be produced
pub fn renumber(
    snapshot: &SiblingSnapshot,
    moved: &SiblingId,
    target_index: usize,
    options: RenumberOptions,
) -> Result<RenumberedWeights, ReorderError> {
    let mut order = snapshot.others(moved);
    let at = target_index.min(order.len());
    order.insert(at, moved.clone());

    let weights = match options.policy {
        RenumberPolicy::Sequential => sequential(order.len(), options.base_weight)?,
        // Untouched siblings must already be distinct to stay untouched.
        RenumberPolicy::AffectedSpan if !snapshot.is_strictly_ordered() => {
            let start = snapshot.min_weight().unwrap_or(options.base_weight);
            sequential(order.len(), start)?
        }
        RenumberPolicy::AffectedSpan => affected_span(snapshot, &order, at, options.base_weight)?,
    };

    let result = RenumberedWeights {
        entries: order
            .into_iter()
            .zip(weights)
            .map(|(id, weight)| WeightEntry { id, weight })
            .collect(),
    };
    result.verify()?;

    tracing::debug!(
        parent = %snapshot.parent(),
        %moved,
        index = at,
        policy = ?options.policy,
        changed = result.changes(snapshot).len(),
        "renumbered siblings"
    );
    Ok(result)
}

fn sequential(count: usize, start: Weight) -> Result<Vec<Weight>, ReorderError> {
    (0..count)
        .map(|i| {
            Weight::try_from(i)
                .ok()
                .and_then(|offset| start.checked_add(offset))
                .ok_or_else(|| overflow(start))
        })
        .collect()
}

fn affected_span(
    snapshot: &SiblingSnapshot,
    order: &[SiblingId],
    at: usize,
    base: Weight,
) -> Result<Vec<Weight>, ReorderError> {
    // Every id except the moved one exists in the snapshot.
    let old = |i: usize| snapshot.weight_of(&order[i]);
    let lower = if at > 0 { old(at - 1) } else { None };

    let mut weights: Vec<Weight> = (0..order.len()).map(|i| old(i).unwrap_or(base)).collect();

    // The moved link keeps its weight if it already sorts in the right place.
    if let Some(current) = old(at) {
        let upper = if at + 1 < order.len() { old(at + 1) } else { None };
        if lower.is_none_or(|l| l < current) && upper.is_none_or(|u| current < u) {
            return Ok(weights);
        }
    }

    // Grow the window [at, hi] downwards until it fits below the next untouched sibling.
    let mut hi = at;
    loop {
        let count = (hi - at + 1) as i128;
        let upper = if hi + 1 < order.len() { old(hi + 1) } else { None };
        let fits = match (lower, upper) {
            (Some(l), Some(u)) => (u as i128) - (l as i128) - 1 >= count,
            _ => true,
        };
        if fits {
            let start = match (lower, upper) {
                (Some(l), _) => l.checked_add(1).ok_or_else(|| overflow(l))?,
                (None, Some(u)) => u
                    .checked_sub(count as Weight)
                    .ok_or_else(|| overflow(u))?,
                (None, None) => base,
            };
            let span = sequential(hi - at + 1, start)?;
            weights[at..=hi].copy_from_slice(&span);
            return Ok(weights);
        }
        hi += 1;
    }
}

fn overflow(near: Weight) -> ReorderError {
    ReorderError::InvariantViolation {
        reason: format!("weight overflow near {}", near),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ParentContext;
    use crate::snapshot::SiblingRecord;

    fn snapshot(records: &[(&str, Weight)]) -> SiblingSnapshot {
        SiblingSnapshot::from_records(
            ParentContext::root("tools"),
            records.iter().map(|(id, w)| SiblingRecord::new(*id, *w)).collect(),
        )
    }

    fn span() -> RenumberOptions {
        RenumberOptions {
            policy: RenumberPolicy::AffectedSpan,
            ..RenumberOptions::default()
        }
    }

    fn pairs(weights: &RenumberedWeights) -> Vec<(String, Weight)> {
        weights
            .entries()
            .iter()
            .map(|e| (e.id.to_string(), e.weight))
            .collect()
    }

    #[test]
    fn test_sequential_insert_above() {
        let s = snapshot(&[("a", -50), ("b", -49), ("c", -48)]);
        let result = renumber(&s, &"d".into(), 1, RenumberOptions::default()).unwrap();

        assert_eq!(
            pairs(&result),
            vec![
                ("a".to_string(), -50),
                ("d".to_string(), -49),
                ("b".to_string(), -48),
                ("c".to_string(), -47),
            ]
        );
    }

    #[test]
    fn test_sequential_uses_configured_base() {
        let s = snapshot(&[("a", 3), ("b", 9)]);
        let options = RenumberOptions {
            base_weight: 0,
            ..RenumberOptions::default()
        };
        let result = renumber(&s, &"b".into(), 0, options).unwrap();

        assert_eq!(pairs(&result), vec![("b".to_string(), 0), ("a".to_string(), 1)]);
    }

    #[test]
    fn test_empty_snapshot_gets_base_weight() {
        let s = snapshot(&[]);
        let result = renumber(&s, &"m".into(), 0, RenumberOptions::default()).unwrap();
        assert_eq!(pairs(&result), vec![("m".to_string(), DEFAULT_BASE_WEIGHT)]);

        let result = renumber(&s, &"m".into(), 0, span()).unwrap();
        assert_eq!(pairs(&result), vec![("m".to_string(), DEFAULT_BASE_WEIGHT)]);
    }

    #[test]
    fn test_out_of_range_index_is_clamped() {
        let s = snapshot(&[("a", 1)]);
        let result = renumber(&s, &"m".into(), 7, RenumberOptions::default()).unwrap();
        assert_eq!(result.order(), vec![SiblingId::new("a"), SiblingId::new("m")]);
    }

    #[test]
    fn test_span_uses_gap_without_touching_others() {
        let s = snapshot(&[("a", 0), ("b", 10), ("c", 20)]);
        let result = renumber(&s, &"d".into(), 1, span()).unwrap();

        assert_eq!(result.get(&"d".into()), Some(1));
        let changes = result.changes(&s);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].id.as_str(), "d");
        assert_eq!(changes[0].from, None);
    }

    #[test]
    fn test_span_shifts_only_siblings_below() {
        let s = snapshot(&[("a", -50), ("b", -49), ("c", -48), ("z", 10)]);
        let result = renumber(&s, &"d".into(), 1, span()).unwrap();

        assert_eq!(
            pairs(&result),
            vec![
                ("a".to_string(), -50),
                ("d".to_string(), -49),
                ("b".to_string(), -48),
                ("c".to_string(), -47),
                ("z".to_string(), 10),
            ]
        );
        assert_eq!(result.changes(&s).len(), 3);
    }

    #[test]
    fn test_span_new_item_on_top_goes_below_first_weight() {
        let s = snapshot(&[("a", -50), ("b", -49)]);
        let result = renumber(&s, &"m".into(), 0, span()).unwrap();

        assert_eq!(result.get(&"m".into()), Some(-51));
        assert_eq!(result.changes(&s).len(), 1);
    }

    #[test]
    fn test_span_keeps_existing_item_in_place() {
        let s = snapshot(&[("a", 1), ("b", 5), ("c", 9)]);
        let result = renumber(&s, &"b".into(), 1, span()).unwrap();
        assert!(result.changes(&s).is_empty());
    }

    #[test]
    fn test_span_moves_existing_item_down() {
        let s = snapshot(&[("a", 1), ("b", 2), ("c", 3), ("d", 10)]);
        // others = [b, c, d]; put a after c.
        let result = renumber(&s, &"a".into(), 2, span()).unwrap();

        assert_eq!(
            pairs(&result),
            vec![
                ("b".to_string(), 2),
                ("c".to_string(), 3),
                ("a".to_string(), 4),
                ("d".to_string(), 10),
            ]
        );
    }

    #[test]
    fn test_span_with_ties_renumbers_from_lowest() {
        let s = snapshot(&[("a", 0), ("b", 0), ("c", 0)]);
        let result = renumber(&s, &"m".into(), 2, span()).unwrap();

        assert_eq!(
            pairs(&result),
            vec![
                ("a".to_string(), 0),
                ("b".to_string(), 1),
                ("m".to_string(), 2),
                ("c".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_sequential_overflow_is_invariant_violation() {
        let s = snapshot(&[("a", 0)]);
        let options = RenumberOptions {
            base_weight: Weight::MAX,
            ..RenumberOptions::default()
        };
        match renumber(&s, &"m".into(), 1, options) {
            Err(ReorderError::InvariantViolation { .. }) => {}
            other => panic!("Expected InvariantViolation, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_rejects_duplicates() {
        let weights = RenumberedWeights {
            entries: vec![
                WeightEntry { id: "a".into(), weight: 1 },
                WeightEntry { id: "b".into(), weight: 1 },
            ],
        };
        assert!(weights.verify().is_err());
    }
}
