//! Sibling storage seam.
//!
//! The engine never persists anything itself. A [`SiblingStore`] lists the
//! siblings of a parent and applies a [`ReorderPlan`] as one atomic
//! compare-and-commit. [`MemoryStore`] keeps a [`MenuTree`] behind a mutex;
//! [`crate::file::JsonFileStore`] keeps one in a JSON document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{ReorderError, StoreError};
use crate::guard;
use crate::ids::{ParentContext, SiblingId, Weight};
use crate::session::ReorderPlan;
use crate::snapshot::{SiblingRecord, SiblingSnapshot};

/// Read/write collaborator for sibling weights
pub trait SiblingStore {
    /// Current siblings of `parent`, in the store's listing order
    fn list_siblings(&self, parent: &ParentContext) -> Result<Vec<SiblingRecord>, StoreError>;

    /// Write every weight in `plan`, or nothing
    ///
    /// Implementations must re-read the live siblings of `plan.parent` and
    /// check them against `plan.fingerprint` inside the same atomic unit as
    /// the write, returning `ReorderError::Conflict` on any difference.
    fn commit_weights(&self, plan: &ReorderPlan) -> Result<(), ReorderError>;
}

/// Links of every menu, grouped by parent
///
/// The root of a menu is stored under the empty parent key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuTree {
    #[serde(default)]
    pub menus: BTreeMap<String, BTreeMap<String, Vec<SiblingRecord>>>,
}

fn parent_key(parent: &ParentContext) -> String {
    parent
        .parent
        .as_ref()
        .map(|p| p.to_string())
        .unwrap_or_default()
}

impl MenuTree {
    pub fn siblings(&self, parent: &ParentContext) -> Result<Vec<SiblingRecord>, StoreError> {
        let menu = self
            .menus
            .get(&parent.menu)
            .ok_or_else(|| StoreError::UnknownMenu(parent.menu.clone()))?;
        Ok(menu.get(&parent_key(parent)).cloned().unwrap_or_default())
    }

    /// Register `menu` with no links; existing links are left alone
    pub fn add_menu(&mut self, menu: impl Into<String>) {
        self.menus.entry(menu.into()).or_default();
    }

    pub fn insert(&mut self, parent: &ParentContext, record: SiblingRecord) {
        self.menus
            .entry(parent.menu.clone())
            .or_default()
            .entry(parent_key(parent))
            .or_default()
            .push(record);
    }

    /// Overwrite one stored weight; returns false if the link is not there
    pub fn set_weight(&mut self, parent: &ParentContext, id: &SiblingId, weight: Weight) -> bool {
        let record = self
            .menus
            .get_mut(&parent.menu)
            .and_then(|menu| menu.get_mut(&parent_key(parent)))
            .and_then(|list| list.iter_mut().find(|r| &r.id == id));
        match record {
            Some(r) => {
                r.weight = weight;
                true
            }
            None => false,
        }
    }

    /// Validate `plan` against the live siblings, then apply it
    ///
    /// Nothing is modified when validation fails. A moved link stored under a
    /// different parent of the same menu is detached from there.
    pub fn apply(&mut self, plan: &ReorderPlan) -> Result<(), ReorderError> {
        let live = SiblingSnapshot::from_records(plan.parent.clone(), self.siblings(&plan.parent)?);
        guard::validate(&plan.fingerprint, &live)?;

        let key = parent_key(&plan.parent);
        let menu = self.menus.entry(plan.parent.menu.clone()).or_default();

        let mut detached = None;
        for (other_key, list) in menu.iter_mut().filter(|(k, _)| **k != key) {
            if let Some(pos) = list.iter().position(|r| r.id == plan.moved) {
                tracing::debug!(from = %other_key, moved = %plan.moved, "detaching link from previous parent");
                detached = Some(list.remove(pos));
            }
        }
        menu.retain(|_, list| !list.is_empty());

        let list = menu.entry(key).or_default();
        for entry in plan.weights.entries() {
            match list.iter_mut().find(|r| r.id == entry.id) {
                Some(record) => record.weight = entry.weight,
                None => {
                    let title = plan
                        .title
                        .clone()
                        .or_else(|| detached.as_ref().map(|r: &SiblingRecord| r.title.clone()))
                        .unwrap_or_default();
                    list.push(SiblingRecord {
                        id: entry.id.clone(),
                        weight: entry.weight,
                        title,
                    });
                }
            }
        }
        list.sort_by_key(|r| r.weight);

        if let Some(title) = &plan.title {
            if let Some(record) = list.iter_mut().find(|r| r.id == plan.moved) {
                record.title = title.clone();
            }
        }
        Ok(())
    }
}

/// In-process store, safe to share between threads
#[derive(Debug, Default)]
pub struct MemoryStore {
    tree: Mutex<MenuTree>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tree(tree: MenuTree) -> Self {
        Self {
            tree: Mutex::new(tree),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MenuTree> {
        // A poisoned lock still holds a consistent tree: apply() validates
        // before it mutates.
        self.tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_menu(&self, menu: impl Into<String>) {
        self.lock().add_menu(menu);
    }

    pub fn insert(&self, parent: &ParentContext, record: SiblingRecord) {
        self.lock().insert(parent, record);
    }

    pub fn set_weight(&self, parent: &ParentContext, id: &SiblingId, weight: Weight) -> bool {
        self.lock().set_weight(parent, id, weight)
    }

    pub fn tree(&self) -> MenuTree {
        self.lock().clone()
    }
}

impl SiblingStore for MemoryStore {
    fn list_siblings(&self, parent: &ParentContext) -> Result<Vec<SiblingRecord>, StoreError> {
        self.lock().siblings(parent)
    }

    fn commit_weights(&self, plan: &ReorderPlan) -> Result<(), ReorderError> {
        // The lock spans validation and write.
        self.lock().apply(plan)
    }
}
