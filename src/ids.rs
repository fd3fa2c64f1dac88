//! Newtype wrappers for sibling identifiers and parent contexts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Integer sort key; lower weights sort earlier.
pub type Weight = i64;

/// Stable identifier of a menu link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiblingId(pub String);

impl SiblingId {
    pub fn new(s: impl Into<String>) -> Self {
        SiblingId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SiblingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SiblingId {
    fn from(s: &str) -> Self {
        SiblingId(s.to_string())
    }
}

impl From<String> for SiblingId {
    fn from(s: String) -> Self {
        SiblingId(s)
    }
}

/// The set of siblings a link lives in: a menu plus a parent link.
///
/// An empty `parent` names the menu root. The textual form is `menu:parent`,
/// so `tools:` is the root of the tools menu and `tools:node.add_page` the
/// children of `node.add_page`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParentContext {
    pub menu: String,
    pub parent: Option<SiblingId>,
}

impl ParentContext {
    pub fn root(menu: impl Into<String>) -> Self {
        ParentContext {
            menu: menu.into(),
            parent: None,
        }
    }

    pub fn child_of(menu: impl Into<String>, parent: impl Into<SiblingId>) -> Self {
        ParentContext {
            menu: menu.into(),
            parent: Some(parent.into()),
        }
    }
}

impl fmt::Display for ParentContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(p) => write!(f, "{}:{}", self.menu, p),
            None => write!(f, "{}:", self.menu),
        }
    }
}

/// Error returned when a `menu:parent` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid parent context '{0}': expected 'menu:parent'")]
pub struct ParseParentError(pub String);

impl FromStr for ParentContext {
    type Err = ParseParentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (menu, parent) = s
            .split_once(':')
            .ok_or_else(|| ParseParentError(s.to_string()))?;
        if menu.is_empty() {
            return Err(ParseParentError(s.to_string()));
        }
        Ok(ParentContext {
            menu: menu.to_string(),
            parent: (!parent.is_empty()).then(|| SiblingId::new(parent)),
        })
    }
}

impl TryFrom<String> for ParentContext {
    type Error = ParseParentError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ParentContext> for String {
    fn from(p: ParentContext) -> Self {
        p.to_string()
    }
}
