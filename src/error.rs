//! Error types for reordering sessions.
//!
//! Errors fall into three groups:
//!
//! - **Target** errors (`NotFound`, `InvalidTarget`) are raised before any
//!   weight is computed. The request itself is wrong.
//! - **Conflict** means the siblings changed between snapshot and commit. The
//!   caller must take a fresh snapshot and re-apply the user's choice; it is
//!   never retried silently.
//! - **InvariantViolation** is a logic bug. The commit is aborted.

use thiserror::Error;

use crate::guard::Drift;
use crate::ids::{ParentContext, SiblingId};

/// Message shown to people when a commit is rejected by the concurrency guard.
pub const CONFLICT_MESSAGE: &str =
    "The menu link weights have been changed by another user, please try again.";

#[derive(Debug, Error)]
pub enum ReorderError {
    /// A referenced sibling is not part of the snapshot.
    #[error("sibling '{id}' not found")]
    NotFound { id: SiblingId },

    /// The target is self-referential or otherwise meaningless.
    #[error("invalid target: {reason}")]
    InvalidTarget { reason: String },

    /// The live siblings no longer match the fingerprint taken at session start.
    #[error("weights under '{parent}' changed by another actor ({} sibling(s) drifted)", .drift.len())]
    Conflict { parent: ParentContext, drift: Vec<Drift> },

    /// An internal consistency check failed.
    #[error("invariant violated: {reason}")]
    InvariantViolation { reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReorderError {
    /// Returns true if taking a new snapshot and trying again can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReorderError::Conflict { .. })
    }

    /// Text suitable for showing to a person.
    ///
    /// Conflicts never expose which siblings drifted or any fingerprint data.
    pub fn user_message(&self) -> String {
        match self {
            ReorderError::Conflict { .. } => CONFLICT_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

/// Failures of a sibling store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed store document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("menu '{0}' does not exist")]
    UnknownMenu(String),
}
