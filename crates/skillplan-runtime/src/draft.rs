#![forbid(unsafe_code)]

//! Local drag state for the plan order.
//!
//! [`DraftReorderController`] owns the committed order and the draft order the
//! UI renders. Drag input mutates only the draft, synchronously and without
//! any network traffic; the committed order changes only when the remote store
//! acknowledges a mutation.
//!
//! # State Machine
//!
//! ```text
//!            begin_drag                     end_drag(Dropped)
//!   Idle ─────────────────► Dragging ─────────────────────────► Idle
//!    ▲                      │  ▲   │                          (draft = candidate)
//!    │                      │  └───┘ update_drag / move_entry
//!    └──────────────────────┘
//!       end_drag(Cancelled)   (draft = baseline)
//! ```
//!
//! # Invariants
//!
//! 1. `draft` is always a permutation of `committed`'s id set.
//! 2. While idle and clean, `draft == committed`.
//! 3. No method panics or returns an error; rejected input is "no change".

use skillplan_core::{EntryId, OrderedCollection};

/// How a drag ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    /// Released over a valid target.
    Dropped,
    /// Released outside any target, or aborted.
    Cancelled,
}

#[derive(Debug, Clone)]
struct DragSession {
    baseline: OrderedCollection,
    updates: u32,
}

/// Committed and draft order for one plan.
#[derive(Debug, Clone, Default)]
pub struct DraftReorderController {
    committed: OrderedCollection,
    draft: OrderedCollection,
    drag: Option<DragSession>,
}

impl DraftReorderController {
    #[must_use]
    pub fn new(committed: OrderedCollection) -> Self {
        Self {
            draft: committed.clone(),
            committed,
            drag: None,
        }
    }

    /// Start a drag from `snapshot`, which becomes the cancel baseline.
    ///
    /// Restarts the drag if one is already active. Returns `false` if the
    /// snapshot is not a permutation of the committed ids.
    pub fn begin_drag(&mut self, snapshot: OrderedCollection) -> bool {
        if !snapshot.is_permutation_of(&self.committed) {
            return false;
        }
        self.draft = snapshot.clone();
        self.drag = Some(DragSession {
            baseline: snapshot,
            updates: 0,
        });
        true
    }

    /// Replace the draft with `candidate`.
    ///
    /// Returns `false` when no drag is active, when `candidate` is not a
    /// permutation of the committed ids, or when it equals the current draft.
    pub fn update_drag(&mut self, candidate: OrderedCollection) -> bool {
        let Some(drag) = self.drag.as_mut() else {
            return false;
        };
        if !candidate.is_permutation_of(&self.committed) || candidate.same_order(&self.draft) {
            return false;
        }
        drag.updates = drag.updates.saturating_add(1);
        self.draft = candidate;
        true
    }

    /// Move one entry within the draft. See [`OrderedCollection::moved`].
    pub fn move_entry(&mut self, id: EntryId, to_index: usize) -> bool {
        let candidate = self.draft.moved(id, to_index);
        self.update_drag(candidate)
    }

    /// Finish the active drag.
    ///
    /// `Dropped` returns the final candidate and leaves it as the draft until
    /// the caller commits or resets. `Cancelled` restores the baseline.
    pub fn end_drag(&mut self, outcome: DropOutcome) -> Option<OrderedCollection> {
        let drag = self.drag.take()?;
        match outcome {
            DropOutcome::Dropped => Some(self.draft.clone()),
            DropOutcome::Cancelled => {
                self.draft = drag.baseline;
                None
            }
        }
    }

    /// Discard the draft and any drag, restoring the committed order.
    pub fn reset(&mut self) {
        self.drag = None;
        self.draft = self.committed.clone();
    }

    /// Record an order the remote store acknowledged.
    ///
    /// While idle the draft follows it. During a drag over the same id set
    /// the draft is kept and only the baseline moves; if the id set changed
    /// the drag is abandoned.
    pub fn set_committed(&mut self, order: OrderedCollection) {
        let same_ids = order.is_permutation_of(&self.committed);
        self.committed = order;
        match self.drag.as_mut() {
            Some(drag) if same_ids => drag.baseline = self.committed.clone(),
            Some(_) => {
                self.drag = None;
                self.draft = self.committed.clone();
            }
            None => self.draft = self.committed.clone(),
        }
    }

    #[must_use]
    pub fn draft(&self) -> &OrderedCollection {
        &self.draft
    }

    #[must_use]
    pub fn committed(&self) -> &OrderedCollection {
        &self.committed
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Number of accepted draft changes in the active drag.
    #[must_use]
    pub fn drag_updates(&self) -> u32 {
        self.drag.as_ref().map_or(0, |drag| drag.updates)
    }

    /// True when the draft differs from the committed order.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.draft.same_order(&self.committed)
    }
}
