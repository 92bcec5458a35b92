#![forbid(unsafe_code)]

//! Ordered collections of entry ids and remote plan snapshots.
//!
//! The same [`OrderedCollection`] type carries all three views of a plan:
//!
//! ```text
//!   committed ── last order the remote store acknowledged
//!   draft     ── local order being dragged, rendered immediately
//!   proposed  ── exact draft snapshot handed to the validator
//! ```
//!
//! # Invariants
//!
//! 1. Ids are unique within a collection.
//! 2. Draft and proposed orders are permutations of the committed id set;
//!    reordering never inserts or removes ids.
//! 3. [`OrderedCollection::moved`] never panics: unknown ids and
//!    out-of-range targets are clamped or ignored.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::entry::{Entry, EntryId, PlanId};

/// An ordered sequence of entry ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderedCollection {
    ids: Vec<EntryId>,
}

impl OrderedCollection {
    #[must_use]
    pub fn new(ids: Vec<EntryId>) -> Self {
        Self { ids }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn ids(&self) -> &[EntryId] {
        &self.ids
    }

    #[must_use]
    pub fn into_ids(self) -> Vec<EntryId> {
        self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: EntryId) -> bool {
        self.ids.contains(&id)
    }

    #[must_use]
    pub fn position(&self, id: EntryId) -> Option<usize> {
        self.ids.iter().position(|candidate| *candidate == id)
    }

    /// True if no id appears twice.
    #[must_use]
    pub fn has_unique_ids(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.ids.len());
        self.ids.iter().all(|id| seen.insert(*id))
    }

    /// True if `self` holds exactly the same ids as `other`, in any order.
    #[must_use]
    pub fn is_permutation_of(&self, other: &Self) -> bool {
        if self.ids.len() != other.ids.len() || !self.has_unique_ids() {
            return false;
        }
        let theirs: HashSet<EntryId> = other.ids.iter().copied().collect();
        theirs.len() == other.ids.len() && self.ids.iter().all(|id| theirs.contains(id))
    }

    /// Element-by-element comparison.
    #[must_use]
    pub fn same_order(&self, other: &Self) -> bool {
        self.ids == other.ids
    }

    /// Return a new order with `id` moved to `to_index`.
    ///
    /// The target index is clamped to the last slot. An unknown id yields an
    /// unchanged copy.
    #[must_use]
    pub fn moved(&self, id: EntryId, to_index: usize) -> Self {
        let Some(from) = self.position(id) else {
            return self.clone();
        };
        let mut ids = self.ids.clone();
        let moving = ids.remove(from);
        let to = to_index.min(ids.len());
        ids.insert(to, moving);
        Self { ids }
    }

    /// Rewrite ids through `resolve`, preserving order.
    #[must_use]
    pub fn map_ids(&self, mut resolve: impl FnMut(EntryId) -> EntryId) -> Self {
        Self {
            ids: self.ids.iter().map(|id| resolve(*id)).collect(),
        }
    }
}

impl From<Vec<EntryId>> for OrderedCollection {
    fn from(ids: Vec<EntryId>) -> Self {
        Self::new(ids)
    }
}

impl FromIterator<EntryId> for OrderedCollection {
    fn from_iter<I: IntoIterator<Item = EntryId>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a OrderedCollection {
    type Item = &'a EntryId;
    type IntoIter = std::slice::Iter<'a, EntryId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}

/// A plan as returned by the remote store, entries in remote order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub plan_id: PlanId,
    pub entries: Vec<Entry>,
}

impl PlanSnapshot {
    #[must_use]
    pub fn new(plan_id: PlanId, entries: Vec<Entry>) -> Self {
        Self { plan_id, entries }
    }

    /// Project the id order.
    #[must_use]
    pub fn order(&self) -> OrderedCollection {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    #[must_use]
    pub fn entry(&self, id: EntryId) -> Option<&Entry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Ids present here but absent from `previous`, in remote order.
    ///
    /// After an add this is the identity the store assigned.
    #[must_use]
    pub fn new_ids_since(&self, previous: &OrderedCollection) -> Vec<EntryId> {
        let known: HashSet<EntryId> = previous.ids().iter().copied().collect();
        self.entries
            .iter()
            .map(|entry| entry.id)
            .filter(|id| !known.contains(id))
            .collect()
    }
}
