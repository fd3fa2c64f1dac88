//! Optimistic concurrency check for committing new weights.
//!
//! A [`Fingerprint`] records every sibling id and weight of one parent at the
//! moment a session starts. At commit time the store re-reads the live
//! siblings and [`validate`] refuses the write if anything differs. No lock is
//! held between the two points.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ReorderError;
use crate::ids::{ParentContext, SiblingId, Weight};
use crate::renumber::RenumberedWeights;
use crate::snapshot::SiblingSnapshot;

/// Id -> weight pairs of a sibling set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint {
    weights: BTreeMap<SiblingId, Weight>,
}

/// One difference between a fingerprint and the live siblings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Drift {
    Changed {
        id: SiblingId,
        expected: Weight,
        actual: Weight,
    },
    Added {
        id: SiblingId,
        weight: Weight,
    },
    Removed {
        id: SiblingId,
        weight: Weight,
    },
}

impl Fingerprint {
    pub fn of(snapshot: &SiblingSnapshot) -> Self {
        Self {
            weights: snapshot.records().iter().map(|r| (r.id.clone(), r.weight)).collect(),
        }
    }

    pub fn from_weights(weights: &RenumberedWeights) -> Self {
        Self {
            weights: weights.to_map(),
        }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weight_of(&self, id: &SiblingId) -> Option<Weight> {
        self.weights.get(id).copied()
    }

    /// BLAKE3 hash of the pairs (hex-encoded)
    ///
    /// Pairs are hashed in id order, so two fingerprints have the same digest
    /// exactly when they are equal.
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (id, weight) in &self.weights {
            hasher.update(&(id.as_str().len() as u64).to_le_bytes());
            hasher.update(id.as_str().as_bytes());
            hasher.update(&weight.to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Differences from `self` to `live`, in id order
    pub fn diff(&self, live: &Fingerprint) -> Vec<Drift> {
        let mut drift = Vec::new();
        for (id, &expected) in &self.weights {
            match live.weights.get(id) {
                Some(&actual) if actual != expected => drift.push(Drift::Changed {
                    id: id.clone(),
                    expected,
                    actual,
                }),
                Some(_) => {}
                None => drift.push(Drift::Removed {
                    id: id.clone(),
                    weight: expected,
                }),
            }
        }
        for (id, &weight) in &live.weights {
            if !self.weights.contains_key(id) {
                drift.push(Drift::Added {
                    id: id.clone(),
                    weight,
                });
            }
        }
        drift
    }
}

/// Check that `live` still matches the fingerprint taken at session start
///
/// # Returns
/// * `Ok(())` if every sibling and weight is unchanged
/// * `Err(ReorderError::Conflict)` if any weight changed or a sibling was
///   added or removed
pub fn validate(expected: &Fingerprint, live: &SiblingSnapshot) -> Result<(), ReorderError> {
    validate_fingerprint(live.parent(), expected, &live.fingerprint())
}

pub fn validate_fingerprint(
    parent: &ParentContext,
    expected: &Fingerprint,
    live: &Fingerprint,
) -> Result<(), ReorderError> {
    if expected == live {
        return Ok(());
    }
    let drift = expected.diff(live);
    tracing::warn!(
        parent = %parent,
        expected = %expected.digest(),
        actual = %live.digest(),
        drifted = drift.len(),
        "sibling weights changed since snapshot"
    );
    Err(ReorderError::Conflict {
        parent: parent.clone(),
        drift,
    })
}
