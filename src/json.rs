use serde::{Deserialize, Serialize};

use crate::error::ReorderError;
use crate::guard::Fingerprint;
use crate::ids::{ParentContext, SiblingId};
use crate::position::TargetSpec;
use crate::renumber::{WeightChange, WeightEntry};
use crate::session::ReorderPlan;
use crate::snapshot::{PositionChoice, SiblingRecord, SiblingSnapshot};

/// A reorder request as read from a file or stdin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderRequest {
    /// Caller-chosen id, or "auto" to generate one
    #[serde(default = "auto")]
    pub execution_id: String,
    pub parent: ParentContext,
    pub moved: SiblingId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "no_preference")]
    pub target: TargetSpec,
    /// Fingerprint handed out with the snapshot the user chose from
    #[serde(default)]
    pub expected_fingerprint: Option<Fingerprint>,
}

fn auto() -> String {
    "auto".to_string()
}

fn no_preference() -> TargetSpec {
    TargetSpec::NoPreference
}

/// Outcome of a reorder request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderResponse {
    pub execution_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetSpec>,
    /// Every sibling in its new order
    #[serde(default)]
    pub weights: Vec<WeightEntry>,
    /// Siblings whose weight was written
    #[serde(default)]
    pub changes: Vec<WeightChange>,
    /// Fingerprint of the siblings after the commit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
    #[serde(default)]
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReorderResponse {
    pub fn success(execution_id: String, plan: &ReorderPlan) -> Self {
        Self {
            execution_id,
            success: true,
            target: Some(plan.target.clone()),
            weights: plan.weights.entries().to_vec(),
            changes: plan.changes.clone(),
            fingerprint: Some(plan.committed_fingerprint()),
            retryable: false,
            error: None,
        }
    }

    pub fn failure(execution_id: String, error: String) -> Self {
        Self {
            execution_id,
            success: false,
            target: None,
            weights: Vec::new(),
            changes: Vec::new(),
            fingerprint: None,
            retryable: false,
            error: Some(error),
        }
    }

    /// Failure carrying the human-facing message for `err`
    pub fn from_error(execution_id: String, err: &ReorderError) -> Self {
        Self {
            retryable: err.is_retryable(),
            ..Self::failure(execution_id, err.user_message())
        }
    }
}

/// Current siblings of a parent, as offered to a user
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotResponse {
    pub parent: ParentContext,
    pub siblings: Vec<SiblingRecord>,
    /// Pass back as `expected_fingerprint` when reordering
    pub fingerprint: Fingerprint,
    pub digest: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<PositionChoice>,
}

impl SnapshotResponse {
    pub fn new(snapshot: &SiblingSnapshot, choices: Vec<PositionChoice>) -> Self {
        let fingerprint = snapshot.fingerprint();
        Self {
            parent: snapshot.parent().clone(),
            siblings: snapshot.records().to_vec(),
            digest: fingerprint.digest(),
            fingerprint,
            choices,
        }
    }
}

/// Summary line per changed sibling, for human-readable output
pub fn describe_change(change: &WeightChange) -> String {
    match change.from {
        Some(from) => format!("{}: {} -> {}", change.id, from, change.to),
        None => format!("{}: new -> {}", change.id, change.to),
    }
}

/// Generate a fresh execution id (UUID v4)
pub fn generate_execution_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CONFLICT_MESSAGE;

    #[test]
    fn test_minimal_request_defaults() {
        let request: ReorderRequest =
            serde_json::from_str(r#"{ "parent": "tools:", "moved": "link1" }"#).unwrap();

        assert_eq!(request.execution_id, "auto");
        assert_eq!(request.target, TargetSpec::NoPreference);
        assert!(request.expected_fingerprint.is_none());
        assert!(request.title.is_none());
    }

    #[test]
    fn test_request_with_fingerprint() {
        let request: ReorderRequest = serde_json::from_str(
            r#"{
                "execution_id": "run-1",
                "parent": "tools:",
                "moved": "link1",
                "target": { "kind": "relative_to", "id": "a", "side": "below" },
                "expected_fingerprint": { "a": -50 }
            }"#,
        )
        .unwrap();

        assert_eq!(request.target, TargetSpec::below("a"));
        let fingerprint = request.expected_fingerprint.unwrap();
        assert_eq!(fingerprint.weight_of(&"a".into()), Some(-50));
    }

    #[test]
    fn test_conflict_response_is_retryable_and_opaque() {
        let err = ReorderError::Conflict {
            parent: ParentContext::root("tools"),
            drift: Vec::new(),
        };
        let response = ReorderResponse::from_error("x".to_string(), &err);

        assert!(!response.success);
        assert!(response.retryable);
        assert_eq!(response.error.as_deref(), Some(CONFLICT_MESSAGE));
    }

    #[test]
    fn test_generate_execution_id_is_uuid() {
        let id = generate_execution_id();
        assert_eq!(id.len(), 36);
        assert_ne!(id, generate_execution_id());
    }

    #[test]
    fn test_describe_change() {
        let change = WeightChange {
            id: "b".into(),
            from: Some(-49),
            to: -48,
        };
        assert_eq!(describe_change(&change), "b: -49 -> -48");
        let new = WeightChange {
            id: "d".into(),
            from: None,
            to: -49,
        };
        assert_eq!(describe_change(&new), "d: new -> -49");
    }
}
