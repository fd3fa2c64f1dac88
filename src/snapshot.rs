use serde::{Deserialize, Serialize};

use crate::error::ReorderError;
use crate::guard::Fingerprint;
use crate::ids::{ParentContext, SiblingId, Weight};
use crate::store::SiblingStore;

/// Label used for the moved link when it has no title yet.
pub const CURRENT_LINK_LABEL: &str = "(current link)";

/// Longest label shown for the moved link, in characters.
pub const MAX_LABEL_CHARS: usize = 30;

/// A sibling as listed by a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiblingRecord {
    pub id: SiblingId,
    pub weight: Weight,
    /// Display title, not used for ordering
    #[serde(default)]
    pub title: String,
}

impl SiblingRecord {
    pub fn new(id: impl Into<SiblingId>, weight: Weight) -> Self {
        Self {
            id: id.into(),
            weight,
            title: String::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

/// Immutable, ordered capture of one parent's siblings
///
/// Records are sorted by ascending weight. Equal weights keep the order in
/// which the store listed them, so capturing the same data twice always
/// yields the same sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingSnapshot {
    parent: ParentContext,
    records: Vec<SiblingRecord>,
}

/// One entry of the position selection control
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionChoice {
    pub index: usize,
    pub label: String,
    /// True for the entry representing the moved link
    pub current: bool,
}

impl SiblingSnapshot {
    /// Build a snapshot from records in listing order
    pub fn from_records(parent: ParentContext, mut records: Vec<SiblingRecord>) -> Self {
        // sort_by_key is stable: ties keep listing order
        records.sort_by_key(|r| r.weight);
        Self { parent, records }
    }

    pub fn parent(&self) -> &ParentContext {
        &self.parent
    }

    pub fn records(&self) -> &[SiblingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &SiblingId> {
        self.records.iter().map(|r| &r.id)
    }

    pub fn index_of(&self, id: &SiblingId) -> Option<usize> {
        self.records.iter().position(|r| &r.id == id)
    }

    pub fn contains(&self, id: &SiblingId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn weight_of(&self, id: &SiblingId) -> Option<Weight> {
        self.records.iter().find(|r| &r.id == id).map(|r| r.weight)
    }

    pub fn min_weight(&self) -> Option<Weight> {
        self.records.first().map(|r| r.weight)
    }

    /// True when no two siblings share a weight
    pub fn is_strictly_ordered(&self) -> bool {
        self.records.windows(2).all(|w| w[0].weight < w[1].weight)
    }

    /// Sibling ids in order, with `moved` removed
    pub fn others(&self, moved: &SiblingId) -> Vec<SiblingId> {
        self.ids().filter(|id| *id != moved).cloned().collect()
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self)
    }

    /// Entries a selection control offers for placing `moved`.
    ///
    /// An existing link is listed at its current position; a new one at the
    /// top. The moved entry is labelled by `moved_title`, falling back to its
    /// stored title and then to a placeholder.
    pub fn position_choices(&self, moved: &SiblingId, moved_title: Option<&str>) -> Vec<PositionChoice> {
        let mut labels: Vec<(String, bool)> = self
            .records
            .iter()
            .filter(|r| &r.id != moved)
            .map(|r| (label_for(r), false))
            .collect();

        let stored_title = self
            .records
            .iter()
            .find(|r| &r.id == moved)
            .map(|r| r.title.as_str())
            .filter(|t| !t.is_empty());
        let moved_label: String = moved_title
            .filter(|t| !t.is_empty())
            .or(stored_title)
            .unwrap_or(CURRENT_LINK_LABEL)
            .chars()
            .take(MAX_LABEL_CHARS)
            .collect();
        let at = self.index_of(moved).unwrap_or(0);
        labels.insert(at, (moved_label, true));

        labels
            .into_iter()
            .enumerate()
            .map(|(index, (label, current))| PositionChoice { index, label, current })
            .collect()
    }
}

fn label_for(record: &SiblingRecord) -> String {
    if record.title.is_empty() {
        record.id.to_string()
    } else {
        record.title.clone()
    }
}

/// Read the current siblings of `parent` from `store`
///
/// Only reads; the store is never modified.
pub fn capture<S: SiblingStore + ?Sized>(
    store: &S,
    parent: &ParentContext,
) -> Result<SiblingSnapshot, ReorderError> {
    let records = store.list_siblings(parent)?;
    let snapshot = SiblingSnapshot::from_records(parent.clone(), records);
    tracing::debug!(
        parent = %parent,
        siblings = snapshot.len(),
        strictly_ordered = snapshot.is_strictly_ordered(),
        "captured sibling snapshot"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn tools() -> ParentContext {
        ParentContext::root("tools")
    }

    #[test]
    fn test_from_records_sorts_by_weight() {
        let snapshot = SiblingSnapshot::from_records(
            tools(),
            vec![
                SiblingRecord::new("c", 5),
                SiblingRecord::new("a", -3),
                SiblingRecord::new("b", 0),
            ],
        );

        let ids: Vec<&str> = snapshot.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(snapshot.is_strictly_ordered());
        assert_eq!(snapshot.min_weight(), Some(-3));
    }

    #[test]
    fn test_ties_keep_listing_order() {
        let snapshot = SiblingSnapshot::from_records(
            tools(),
            vec![
                SiblingRecord::new("z", 0),
                SiblingRecord::new("y", 0),
                SiblingRecord::new("x", -1),
            ],
        );

        let ids: Vec<&str> = snapshot.ids().map(|id| id.as_str()).collect();
        assert_eq!(ids, vec!["x", "z", "y"]);
        assert!(!snapshot.is_strictly_ordered());
    }

    #[test]
    fn test_capture_reads_without_mutating() {
        let store = MemoryStore::new();
        store.insert(&tools(), SiblingRecord::new("filter.tips_all", -48));
        store.insert(&tools(), SiblingRecord::new("node.add_page", -49));

        let first = capture(&store, &tools()).unwrap();
        let second = capture(&store, &tools()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.index_of(&"node.add_page".into()), Some(0));
        assert_eq!(first.weight_of(&"filter.tips_all".into()), Some(-48));
    }

    #[test]
    fn test_position_choices_for_new_link() {
        let snapshot = SiblingSnapshot::from_records(
            tools(),
            vec![
                SiblingRecord::new("a", 1).with_title("Alpha"),
                SiblingRecord::new("b", 2),
            ],
        );

        let choices = snapshot.position_choices(&"new".into(), None);

        assert_eq!(choices.len(), 3);
        assert_eq!(choices[0].label, CURRENT_LINK_LABEL);
        assert!(choices[0].current);
        assert_eq!(choices[1].label, "Alpha");
        assert_eq!(choices[2].label, "b");
    }

    #[test]
    fn test_position_choices_for_existing_link() {
        let snapshot = SiblingSnapshot::from_records(
            tools(),
            vec![
                SiblingRecord::new("a", 1),
                SiblingRecord::new("me", 2).with_title("Stored"),
                SiblingRecord::new("b", 3),
            ],
        );

        let choices = snapshot.position_choices(&"me".into(), Some("Typed title"));

        assert_eq!(choices.len(), 3);
        assert!(choices[1].current);
        assert_eq!(choices[1].label, "Typed title");

        let fallback = snapshot.position_choices(&"me".into(), Some(""));
        assert_eq!(fallback[1].label, "Stored");
    }

    #[test]
    fn test_position_choices_truncate_long_title() {
        let snapshot = SiblingSnapshot::from_records(tools(), vec![SiblingRecord::new("a", 1)]);
        let title = "Ünïcode link title that is far too long to show";

        let choices = snapshot.position_choices(&"new".into(), Some(title));

        assert_eq!(choices[0].label.chars().count(), MAX_LABEL_CHARS);
        assert_eq!(choices[0].label, title.chars().take(30).collect::<String>());
        assert_eq!(choices[1].label, "a");
    }
}
