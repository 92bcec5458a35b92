#![forbid(unsafe_code)]

//! Alias table for entries the store re-created under a new id.
//!
//! Undoing a delete re-adds the entry, and the store assigns a fresh id.
//! Records deeper in the history still hold the original id, so every
//! remote call resolves ids through this table at execution time.
//!
//! Aliases chain: if `#3` was re-created as `#7` and later as `#9`,
//! `resolve(#3) == #9`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use skillplan_core::{EntryId, OrderedCollection};

/// Upper bound on alias hops; a longer chain implies a cycle.
const MAX_HOPS: usize = 64;

/// Shared `old id -> newer id` table.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    aliases: Arc<Mutex<HashMap<EntryId, EntryId>>>,
}

impl IdentityMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EntryId, EntryId>> {
        self.aliases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record that the entry currently known as `old` now lives at `new`.
    pub fn alias(&self, old: EntryId, new: EntryId) {
        if old == new {
            return;
        }
        let current = self.resolve(old);
        let mut aliases = self.lock();
        aliases.insert(current, new);
        if current != old {
            aliases.insert(old, new);
        }
        // A stale link pointing back at `new` would close a loop.
        aliases.remove(&new);
    }

    /// Follow the alias chain from `id` to the live id.
    #[must_use]
    pub fn resolve(&self, id: EntryId) -> EntryId {
        let aliases = self.lock();
        let mut current = id;
        for _ in 0..MAX_HOPS {
            match aliases.get(&current) {
                Some(next) => current = *next,
                None => return current,
            }
        }
        tracing::warn!(target: "skillplan.reconcile", %id, "alias chain too long");
        current
    }

    /// Resolve every id of `order`.
    #[must_use]
    pub fn resolve_order(&self, order: &OrderedCollection) -> OrderedCollection {
        order.map_ids(|id| self.resolve(id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
