//! Programmatic placement of new links.
//!
//! Other components can ask for a link to be inserted above or below an
//! existing sibling without going through the position control. Hooks are
//! consulted in registration order when no explicit target was given; the
//! first usable suggestion wins, otherwise the link goes on top.

use crate::ids::{ParentContext, SiblingId};
use crate::position::{Side, TargetSpec};
use crate::snapshot::SiblingSnapshot;

/// Source of an above/below placement for a parent
pub trait PlacementHook: Send + Sync {
    fn placement(&self, parent: &ParentContext, moved: &SiblingId) -> Option<(Side, SiblingId)>;
}

/// Places links of one parent next to a fixed sibling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticPlacement {
    pub parent: ParentContext,
    pub side: Side,
    pub sibling: SiblingId,
}

impl StaticPlacement {
    pub fn new(parent: ParentContext, side: Side, sibling: impl Into<SiblingId>) -> Self {
        Self {
            parent,
            side,
            sibling: sibling.into(),
        }
    }
}

impl PlacementHook for StaticPlacement {
    fn placement(&self, parent: &ParentContext, _moved: &SiblingId) -> Option<(Side, SiblingId)> {
        (parent == &self.parent).then(|| (self.side, self.sibling.clone()))
    }
}

#[derive(Default)]
pub struct PlacementHooks {
    hooks: Vec<Box<dyn PlacementHook>>,
}

impl std::fmt::Debug for PlacementHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacementHooks")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl PlacementHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H: PlacementHook + 'static>(&mut self, hook: H) {
        self.hooks.push(Box::new(hook));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// First hook suggestion that names another sibling present in `snapshot`
    ///
    /// Suggestions pointing at `moved` itself or at a missing sibling are
    /// skipped so a stale integration cannot block link creation.
    pub fn suggest(&self, snapshot: &SiblingSnapshot, moved: &SiblingId) -> Option<TargetSpec> {
        for hook in &self.hooks {
            let Some((side, sibling)) = hook.placement(snapshot.parent(), moved) else {
                continue;
            };
            if &sibling == moved || !snapshot.contains(&sibling) {
                tracing::warn!(
                    parent = %snapshot.parent(),
                    %moved,
                    %sibling,
                    "ignoring placement relative to an unusable sibling"
                );
                continue;
            }
            return Some(TargetSpec::RelativeTo { id: sibling, side });
        }
        None
    }
}
