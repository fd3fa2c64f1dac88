use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ReorderError;
use crate::ids::SiblingId;
use crate::snapshot::SiblingSnapshot;

/// Which side of a reference sibling the moved link goes on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Above,
    Below,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Above => write!(f, "above"),
            Side::Below => write!(f, "below"),
        }
    }
}

/// Where the moved link should end up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetSpec {
    /// 0-based position among the siblings, the moved link included
    AbsolutePosition { index: usize },
    /// Immediately above or below another sibling
    RelativeTo { id: SiblingId, side: Side },
    /// Keep an existing link where it is, put a new one on top
    NoPreference,
}

impl TargetSpec {
    pub fn at(index: usize) -> Self {
        TargetSpec::AbsolutePosition { index }
    }

    pub fn above(id: impl Into<SiblingId>) -> Self {
        TargetSpec::RelativeTo {
            id: id.into(),
            side: Side::Above,
        }
    }

    pub fn below(id: impl Into<SiblingId>) -> Self {
        TargetSpec::RelativeTo {
            id: id.into(),
            side: Side::Below,
        }
    }
}

impl fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetSpec::AbsolutePosition { index } => write!(f, "position:{}", index),
            TargetSpec::RelativeTo { id, side } => write!(f, "{}_{}", side, id),
            TargetSpec::NoPreference => write!(f, "none"),
        }
    }
}

/// Error returned when a textual target cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid target '{0}': expected 'position:<n>', 'above_<id>', 'below_<id>' or 'none'")]
pub struct ParseTargetError(pub String);

impl FromStr for TargetSpec {
    type Err = ParseTargetError;

    /// Parse `position:<n>`, `above_<id>`, `below_<id>` or `none`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseTargetError(s.to_string());
        if s == "none" || s.is_empty() {
            return Ok(TargetSpec::NoPreference);
        }
        if let Some(n) = s.strip_prefix("position:") {
            let index = n.parse().map_err(|_| err())?;
            return Ok(TargetSpec::AbsolutePosition { index });
        }
        let (side, id) = if let Some(id) = s.strip_prefix("above_") {
            (Side::Above, id)
        } else if let Some(id) = s.strip_prefix("below_") {
            (Side::Below, id)
        } else {
            return Err(err());
        };
        if id.is_empty() {
            return Err(err());
        }
        Ok(TargetSpec::RelativeTo {
            id: SiblingId::new(id),
            side,
        })
    }
}

/// Translate a target into an insertion index
///
/// The returned index addresses the sibling order with `moved` removed, so it
/// always satisfies `0 <= index <= others.len()`.
///
/// # Errors
/// * `InvalidTarget` - the target is relative to `moved` itself
/// * `NotFound` - the reference sibling is not in the snapshot
pub fn resolve(
    snapshot: &SiblingSnapshot,
    target: &TargetSpec,
    moved: &SiblingId,
) -> Result<usize, ReorderError> {
    let others = snapshot.others(moved);

    let index = match target {
        TargetSpec::AbsolutePosition { index } => (*index).min(others.len()),
        TargetSpec::RelativeTo { id, side } => {
            if id == moved {
                return Err(ReorderError::InvalidTarget {
                    reason: format!("'{}' cannot be placed {} itself", moved, side),
                });
            }
            let at = others
                .iter()
                .position(|other| other == id)
                .ok_or_else(|| ReorderError::NotFound { id: id.clone() })?;
            match side {
                Side::Above => at,
                Side::Below => at + 1,
            }
        }
        TargetSpec::NoPreference => snapshot.index_of(moved).unwrap_or(0),
    };

    tracing::debug!(parent = %snapshot.parent(), %moved, %target, index, "resolved target");
    Ok(index)
}
