use std::collections::BTreeSet;

use super::schema::{Category, TableKind};
use super::table::RecordKey;

/// Per-(key, category) "checked, unavailable" markers of one table.
///
/// Kept apart from the data columns so a confirmed absence stays
/// distinguishable from a field that was never fetched.
#[derive(Debug, Clone)]
pub struct Markers {
    kind: TableKind,
    entries: BTreeSet<(RecordKey, Category)>,
}

impl Markers {
    pub fn new(kind: TableKind) -> Self {
        Self {
            kind,
            entries: BTreeSet::new(),
        }
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn contains(&self, key: &RecordKey, category: Category) -> bool {
        self.entries.contains(&(key.clone(), category))
    }

    /// Returns false when the marker already existed
    pub fn insert(&mut self, key: RecordKey, category: Category) -> bool {
        self.entries.insert((key, category))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, category: Category) -> usize {
        self.entries.iter().filter(|(_, c)| *c == category).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(RecordKey, Category)> {
        self.entries.iter()
    }
}
