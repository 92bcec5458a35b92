#![forbid(unsafe_code)]

//! Turns confirmed edits into tracked remote mutations.
//!
//! The reconciler is the only component that talks to the store for writes.
//! Each edit becomes one [`ActionRecord`] whose halves call the store and
//! apply the returned snapshot to the shared local state:
//!
//! | Edit | commit | rollback |
//! |------|--------|----------|
//! | reorder | `reorder(candidate)` | `reorder(previous)` |
//! | add | `add_entry(payload)` | `delete_entry(created)` |
//! | update | `update_entry(id, patch)` | `update_entry(id, inverse)` |
//! | delete | `delete_entry(id)` | `add_entry(payload)` + `reorder` back to its slot |
//!
//! # Identity drift
//!
//! Re-adding an entry yields a new id. Every half resolves its ids through
//! the shared [`IdentityMap`] when it runs, and every re-add records an alias
//! from the id it replaces, so older records keep targeting the live entry.
//!
//! # Failure Modes
//!
//! Failures are logged at `warn` and raised as exactly one notification.
//! A failed reorder commit snaps the draft back to the committed order.
//! Undoing a delete is complete once the entry is re-created; if moving it
//! back to its old slot fails, the entry stays at the end and an info
//! notification says so.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use skillplan_core::{
    Entry, EntryId, EntryPatch, EntryPayload, OrderedCollection, PlanId, PlanSnapshot, PlanStore,
    RemoteError, RemoteResult,
};

use crate::draft::{DraftReorderController, DropOutcome};
use crate::identity::IdentityMap;
use crate::notification::NotificationCenter;
use crate::undo::action::action_fn;
use crate::undo::{ActionFn, ActionHistory, ActionRecord, HistoryError};

pub const REORDER_LABEL: &str = "Reorder plan";
pub const ADD_LABEL: &str = "Add entry";
pub const UPDATE_LABEL: &str = "Edit entry";
pub const DELETE_LABEL: &str = "Delete entry";

// ============================================================================
// Shared local state
// ============================================================================

#[derive(Debug, Default)]
struct PlanState {
    draft: DraftReorderController,
    catalog: HashMap<EntryId, EntryPayload>,
}

/// Draft controller plus payload catalog, shared with in-flight actions.
#[derive(Debug, Clone, Default)]
pub struct SharedPlanState(Arc<Mutex<PlanState>>);

impl SharedPlanState {
    #[must_use]
    pub fn new(snapshot: &PlanSnapshot) -> Self {
        let state = Self::default();
        state.apply_snapshot(snapshot);
        state
    }

    fn lock(&self) -> MutexGuard<'_, PlanState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adopt a snapshot the store returned as the committed truth.
    pub fn apply_snapshot(&self, snapshot: &PlanSnapshot) {
        let mut state = self.lock();
        state.catalog = snapshot
            .entries
            .iter()
            .map(|entry| (entry.id, entry.payload.clone()))
            .collect();
        state.draft.set_committed(snapshot.order());
    }

    /// Drop one entry after the store confirmed its deletion.
    pub fn apply_delete(&self, id: EntryId) {
        let mut state = self.lock();
        state.catalog.remove(&id);
        let remaining: OrderedCollection = state
            .draft
            .committed()
            .ids()
            .iter()
            .copied()
            .filter(|candidate| *candidate != id)
            .collect();
        state.draft.set_committed(remaining);
    }

    /// Restore the committed order unless a drag is in progress.
    pub fn snap_back(&self) {
        let mut state = self.lock();
        if !state.draft.is_dragging() {
            state.draft.reset();
        }
    }

    /// Run `f` against the draft controller.
    pub fn with_draft<R>(&self, f: impl FnOnce(&mut DraftReorderController) -> R) -> R {
        f(&mut self.lock().draft)
    }

    #[must_use]
    pub fn committed(&self) -> OrderedCollection {
        self.lock().draft.committed().clone()
    }

    #[must_use]
    pub fn draft(&self) -> OrderedCollection {
        self.lock().draft.draft().clone()
    }

    #[must_use]
    pub fn payload(&self, id: EntryId) -> Option<EntryPayload> {
        self.lock().catalog.get(&id).cloned()
    }

    /// Entries in draft order.
    #[must_use]
    pub fn entries(&self) -> Vec<Entry> {
        let state = self.lock();
        state
            .draft
            .draft()
            .ids()
            .iter()
            .filter_map(|id| {
                state
                    .catalog
                    .get(id)
                    .map(|payload| Entry::new(*id, payload.clone()))
            })
            .collect()
    }
}

// ============================================================================
// Remote calls shared by every action half
// ============================================================================

#[derive(Clone)]
struct Remote {
    plan: PlanId,
    store: Arc<dyn PlanStore>,
    state: SharedPlanState,
    identities: IdentityMap,
    notifications: NotificationCenter,
}

impl Remote {
    fn apply(&self, snapshot: &PlanSnapshot) -> RemoteResult<()> {
        if snapshot.plan_id != self.plan {
            return Err(RemoteError::rejected(format!(
                "store answered for {} while editing {}",
                snapshot.plan_id, self.plan
            )));
        }
        self.state.apply_snapshot(snapshot);
        Ok(())
    }

    async fn reorder(&self, order: &OrderedCollection) -> RemoteResult<()> {
        let order = self.identities.resolve_order(order);
        let snapshot = self.store.reorder(self.plan, order.ids()).await?;
        self.apply(&snapshot)
    }

    async fn add(&self, payload: EntryPayload) -> RemoteResult<EntryId> {
        let before = self.state.committed();
        let snapshot = self.store.add_entry(self.plan, payload).await?;
        self.apply(&snapshot)?;
        snapshot
            .new_ids_since(&before)
            .pop()
            .ok_or_else(|| RemoteError::rejected("store reported no new entry"))
    }

    async fn update(&self, id: EntryId, patch: EntryPatch) -> RemoteResult<()> {
        let id = self.identities.resolve(id);
        let snapshot = self.store.update_entry(id, patch).await?;
        self.apply(&snapshot)
    }

    async fn delete(&self, id: EntryId) -> RemoteResult<()> {
        let id = self.identities.resolve(id);
        self.store.delete_entry(id).await?;
        self.state.apply_delete(id);
        Ok(())
    }

    /// Re-create a deleted entry and move it back to `index`.
    async fn restore(&self, original: EntryId, payload: EntryPayload, index: usize) -> RemoteResult<()> {
        let created = self.add(payload).await?;
        self.identities.alias(original, created);
        tracing::debug!(
            target: "skillplan.reconcile",
            plan = %self.plan,
            %original,
            %created,
            "entry re-created"
        );

        let current = self.state.committed();
        let target = current.moved(created, index);
        if target.same_order(&current) {
            return Ok(());
        }
        let placed = self
            .store
            .reorder(self.plan, target.ids())
            .await
            .and_then(|snapshot| self.apply(&snapshot));
        if let Err(err) = placed {
            tracing::warn!(
                target: "skillplan.reconcile",
                plan = %self.plan,
                %created,
                index,
                error = %err,
                "restored entry left out of place"
            );
            self.notifications.info(
                DELETE_LABEL,
                format!(
                    "entry restored, but could not be moved back to position {}: {err}",
                    index + 1
                ),
            );
        }
        Ok(())
    }
}

fn reorder_step(remote: &Remote, order: OrderedCollection) -> ActionFn {
    let remote = remote.clone();
    action_fn(move || {
        let remote = remote.clone();
        let order = order.clone();
        async move { remote.reorder(&order).await }
    })
}

fn update_step(remote: &Remote, id: EntryId, patch: EntryPatch) -> ActionFn {
    let remote = remote.clone();
    action_fn(move || {
        let remote = remote.clone();
        let patch = patch.clone();
        async move { remote.update(id, patch).await }
    })
}

fn delete_step(remote: &Remote, id: EntryId) -> ActionFn {
    let remote = remote.clone();
    action_fn(move || {
        let remote = remote.clone();
        async move { remote.delete(id).await }
    })
}

fn restore_step(remote: &Remote, original: EntryId, payload: EntryPayload, index: usize) -> ActionFn {
    let remote = remote.clone();
    action_fn(move || {
        let remote = remote.clone();
        let payload = payload.clone();
        async move { remote.restore(original, payload, index).await }
    })
}

/// Add half of an add action. The first id the store assigns becomes the
/// action's identity; later runs alias it to the fresh id.
fn add_step(remote: &Remote, payload: EntryPayload, origin: Arc<Mutex<Option<EntryId>>>) -> ActionFn {
    let remote = remote.clone();
    action_fn(move || {
        let remote = remote.clone();
        let payload = payload.clone();
        let origin = Arc::clone(&origin);
        async move {
            let created = remote.add(payload).await?;
            let mut origin = origin.lock().unwrap_or_else(PoisonError::into_inner);
            match *origin {
                Some(first) => remote.identities.alias(first, created),
                None => *origin = Some(created),
            }
            Ok(())
        }
    })
}

fn remove_added_step(remote: &Remote, origin: Arc<Mutex<Option<EntryId>>>) -> ActionFn {
    let remote = remote.clone();
    action_fn(move || {
        let remote = remote.clone();
        let created = *origin.lock().unwrap_or_else(PoisonError::into_inner);
        async move {
            match created {
                Some(id) => remote.delete(id).await,
                None => Err(RemoteError::NotFound("entry was never created".into())),
            }
        }
    })
}

// ============================================================================
// Reconciler
// ============================================================================

/// Result of a reconciled edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Drag ended outside a valid target; nothing to commit.
    Cancelled,
    /// Nothing changed; no remote call was made.
    Unchanged,
    /// Committed remotely and recorded for undo.
    Committed,
    /// Another tracked edit was in flight; nothing was sent.
    Rejected,
    /// The remote commit failed; nothing was recorded.
    Failed(HistoryError),
}

impl ReconcileOutcome {
    #[must_use]
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed)
    }
}

/// Per-plan write path: edits in, tracked remote mutations out.
pub struct MutationReconciler {
    remote: Remote,
    history: ActionHistory,
    notifications: NotificationCenter,
}

impl std::fmt::Debug for MutationReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationReconciler")
            .field("plan", &self.remote.plan)
            .field("history", &self.history)
            .finish_non_exhaustive()
    }
}

impl MutationReconciler {
    #[must_use]
    pub fn new(
        plan: PlanId,
        store: Arc<dyn PlanStore>,
        history: ActionHistory,
        state: SharedPlanState,
        notifications: NotificationCenter,
    ) -> Self {
        Self {
            remote: Remote {
                plan,
                store,
                state,
                identities: IdentityMap::new(),
                notifications: notifications.clone(),
            },
            history,
            notifications,
        }
    }

    #[must_use]
    pub fn plan(&self) -> PlanId {
        self.remote.plan
    }

    #[must_use]
    pub fn state(&self) -> &SharedPlanState {
        &self.remote.state
    }

    #[must_use]
    pub fn history(&self) -> &ActionHistory {
        &self.history
    }

    #[must_use]
    pub fn identities(&self) -> &IdentityMap {
        &self.remote.identities
    }

    /// End the active drag and commit its candidate if it differs.
    pub async fn finish_drag(&self, outcome: DropOutcome) -> ReconcileOutcome {
        match self.remote.state.with_draft(|draft| draft.end_drag(outcome)) {
            Some(candidate) => self.reorder_to(candidate).await,
            None => ReconcileOutcome::Cancelled,
        }
    }

    /// Commit `candidate` as the new plan order.
    pub async fn reorder_to(&self, candidate: OrderedCollection) -> ReconcileOutcome {
        let previous = self.remote.state.committed();
        if candidate.same_order(&previous) {
            tracing::debug!(
                target: "skillplan.reconcile",
                plan = %self.remote.plan,
                "reorder unchanged; nothing to commit"
            );
            return ReconcileOutcome::Unchanged;
        }
        if !candidate.is_permutation_of(&previous) {
            tracing::debug!(
                target: "skillplan.reconcile",
                plan = %self.remote.plan,
                "reorder candidate does not match committed ids; discarded"
            );
            self.remote.state.snap_back();
            return ReconcileOutcome::Unchanged;
        }

        let record = ActionRecord::from_parts(
            REORDER_LABEL,
            reorder_step(&self.remote, candidate),
            reorder_step(&self.remote, previous),
        );
        self.commit(record).await
    }

    /// Append a new entry.
    pub async fn add_entry(&self, payload: EntryPayload) -> ReconcileOutcome {
        let origin = Arc::new(Mutex::new(None));
        let record = ActionRecord::from_parts(
            ADD_LABEL,
            add_step(&self.remote, payload, Arc::clone(&origin)),
            remove_added_step(&self.remote, origin),
        );
        self.commit(record).await
    }

    /// Apply `patch` to one entry. The inverse is captured now.
    pub async fn update_entry(&self, id: EntryId, patch: EntryPatch) -> ReconcileOutcome {
        if patch.is_empty() {
            return ReconcileOutcome::Unchanged;
        }
        let live = self.remote.identities.resolve(id);
        let Some(current) = self.remote.state.payload(live) else {
            return self.unknown_entry(UPDATE_LABEL, id);
        };
        if current.patched(&patch) == current {
            tracing::debug!(target: "skillplan.reconcile", %id, "update unchanged; nothing to commit");
            return ReconcileOutcome::Unchanged;
        }

        let inverse = patch.inverse_for(&current);
        let record = ActionRecord::from_parts(
            UPDATE_LABEL,
            update_step(&self.remote, id, patch),
            update_step(&self.remote, id, inverse),
        );
        self.commit(record).await
    }

    /// Remove one entry. Undo re-creates it at its current position.
    pub async fn delete_entry(&self, id: EntryId) -> ReconcileOutcome {
        let live = self.remote.identities.resolve(id);
        let (Some(payload), Some(index)) = (
            self.remote.state.payload(live),
            self.remote.state.committed().position(live),
        ) else {
            return self.unknown_entry(DELETE_LABEL, id);
        };

        let record = ActionRecord::from_parts(
            DELETE_LABEL,
            delete_step(&self.remote, id),
            restore_step(&self.remote, id, payload, index),
        );
        self.commit(record).await
    }

    /// Track a caller-built action through the shared history.
    pub async fn track(&self, record: ActionRecord) -> ReconcileOutcome {
        self.commit(record).await
    }

    /// Undo the most recent action. `None` when there is nothing to undo or
    /// another action is in flight.
    pub async fn undo(&self) -> Option<Result<String, HistoryError>> {
        let result = self.history.undo().await?;
        self.settle(&result);
        Some(result)
    }

    /// Redo the most recently undone action. Same contract as [`undo`](Self::undo).
    pub async fn redo(&self) -> Option<Result<String, HistoryError>> {
        let result = self.history.redo().await?;
        self.settle(&result);
        Some(result)
    }

    async fn commit(&self, record: ActionRecord) -> ReconcileOutcome {
        let label = record.label().to_owned();
        match self.history.track_record(record).await {
            Ok(()) => {
                tracing::debug!(
                    target: "skillplan.reconcile",
                    plan = %self.remote.plan,
                    label = %label,
                    "edit committed"
                );
                ReconcileOutcome::Committed
            }
            Err(err) => {
                self.remote.state.snap_back();
                self.report(&err);
                if err.is_busy() {
                    ReconcileOutcome::Rejected
                } else {
                    ReconcileOutcome::Failed(err)
                }
            }
        }
    }

    fn settle(&self, result: &Result<String, HistoryError>) {
        match result {
            Ok(label) => tracing::debug!(target: "skillplan.reconcile", label = %label, "history step applied"),
            Err(err) => {
                self.remote.state.snap_back();
                self.report(err);
            }
        }
    }

    fn unknown_entry(&self, label: &str, id: EntryId) -> ReconcileOutcome {
        let err = HistoryError::Commit {
            label: label.to_owned(),
            source: RemoteError::NotFound(format!("entry {id} is not in the plan")),
        };
        self.report(&err);
        ReconcileOutcome::Failed(err)
    }

    fn report(&self, err: &HistoryError) {
        if err.is_busy() {
            tracing::debug!(
                target: "skillplan.reconcile",
                plan = %self.remote.plan,
                label = err.label(),
                "edit rejected while busy"
            );
            self.notifications.info(err.label(), err.to_string());
        } else {
            tracing::warn!(
                target: "skillplan.reconcile",
                plan = %self.remote.plan,
                label = err.label(),
                error = %err,
                "remote action failed"
            );
            self.notifications.error(err.label(), err.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillplan_core::SkillKey;
    use skillplan_harness::{InMemoryPlanStore, RemoteOp};

    const PLAN: PlanId = PlanId::new(1);

    fn payload(skill: u32) -> EntryPayload {
        EntryPayload::new(SkillKey::new(skill, 1))
    }

    async fn setup(skills: &[u32]) -> (MutationReconciler, Arc<InMemoryPlanStore>) {
        let store = Arc::new(InMemoryPlanStore::new());
        store.seed_plan(PLAN, skills.iter().map(|skill| payload(*skill)).collect());
        let snapshot = store.load_plan(PLAN).await.unwrap();
        store.clear_calls();
        let reconciler = MutationReconciler::new(
            PLAN,
            Arc::clone(&store) as Arc<dyn PlanStore>,
            ActionHistory::for_plan(PLAN, Default::default()),
            SharedPlanState::new(&snapshot),
            NotificationCenter::default(),
        );
        (reconciler, store)
    }

    #[tokio::test]
    async fn unchanged_reorder_makes_no_call() {
        let (reconciler, store) = setup(&[1, 2, 3]).await;
        let same = reconciler.state().committed();
        assert_eq!(reconciler.reorder_to(same).await, ReconcileOutcome::Unchanged);
        assert!(store.calls().is_empty());
        assert!(!reconciler.history().can_undo());
    }

    #[tokio::test]
    async fn reorder_commit_applies_snapshot() {
        let (reconciler, store) = setup(&[1, 2, 3]).await;
        let committed = reconciler.state().committed();
        let target = committed.moved(committed.ids()[2], 0);

        assert!(reconciler.reorder_to(target.clone()).await.is_committed());
        assert_eq!(reconciler.state().committed(), target);
        assert_eq!(store.order(PLAN), target);
        assert_eq!(reconciler.history().next_undo_label().as_deref(), Some(REORDER_LABEL));
    }

    #[tokio::test]
    async fn failed_update_notifies_once() {
        let (reconciler, store) = setup(&[1]).await;
        let id = reconciler.state().committed().ids()[0];
        store.fail_next(RemoteOp::UpdateEntry, RemoteError::transport("reset"));

        let outcome = reconciler
            .update_entry(id, EntryPatch::new().level(2))
            .await;
        assert!(matches!(outcome, ReconcileOutcome::Failed(HistoryError::Commit { .. })));
        assert_eq!(reconciler.notifications.len(), 1);
        assert_eq!(reconciler.state().payload(id), Some(payload(1)));
    }

    #[tokio::test]
    async fn update_unknown_entry_fails_without_call() {
        let (reconciler, store) = setup(&[1]).await;
        let outcome = reconciler
            .update_entry(EntryId::new(999), EntryPatch::new().level(2))
            .await;
        assert!(matches!(outcome, ReconcileOutcome::Failed(_)));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn noop_patch_is_unchanged() {
        let (reconciler, store) = setup(&[1]).await;
        let id = reconciler.state().committed().ids()[0];
        let outcome = reconciler.update_entry(id, EntryPatch::new().level(1)).await;
        assert_eq!(outcome, ReconcileOutcome::Unchanged);
        assert_eq!(reconciler.update_entry(id, EntryPatch::new()).await, ReconcileOutcome::Unchanged);
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn add_then_undo_removes_created_entry() {
        let (reconciler, store) = setup(&[1]).await;
        assert!(reconciler.add_entry(payload(2)).await.is_committed());
        assert_eq!(reconciler.state().committed().len(), 2);

        assert_eq!(reconciler.undo().await, Some(Ok(ADD_LABEL.to_owned())));
        assert_eq!(reconciler.state().committed().len(), 1);
        assert_eq!(store.order(PLAN).len(), 1);
    }

    #[tokio::test]
    async fn add_redo_aliases_new_id() {
        let (reconciler, _store) = setup(&[1]).await;
        reconciler.add_entry(payload(2)).await;
        let first = *reconciler.state().committed().ids().last().unwrap();

        reconciler.undo().await;
        reconciler.redo().await;
        let second = *reconciler.state().committed().ids().last().unwrap();
        assert_ne!(first, second);
        assert_eq!(reconciler.identities().resolve(first), second);

        assert_eq!(reconciler.undo().await, Some(Ok(ADD_LABEL.to_owned())));
        assert_eq!(reconciler.state().committed().len(), 1);
    }

    #[tokio::test]
    async fn restore_keeps_entry_when_placement_fails() {
        let (reconciler, store) = setup(&[1, 2, 3]).await;
        let first = reconciler.state().committed().ids()[0];
        assert!(reconciler.delete_entry(first).await.is_committed());
        store.fail_next(RemoteOp::Reorder, RemoteError::transport("offline"));

        assert_eq!(reconciler.undo().await, Some(Ok(DELETE_LABEL.to_owned())));
        let restored = reconciler.identities().resolve(first);
        assert_ne!(restored, first);
        assert_eq!(reconciler.state().committed(), store.order(PLAN));
        assert_eq!(reconciler.state().committed().position(restored), Some(2));
        assert!(reconciler.history().can_redo());
        assert_eq!(reconciler.notifications.len(), 1);
    }

    #[test]
    fn shared_state_apply_delete() {
        let snapshot = PlanSnapshot::new(
            PLAN,
            vec![
                Entry::new(EntryId::new(1), payload(1)),
                Entry::new(EntryId::new(2), payload(2)),
            ],
        );
        let state = SharedPlanState::new(&snapshot);
        state.apply_delete(EntryId::new(1));
        assert_eq!(state.committed(), OrderedCollection::new(vec![EntryId::new(2)]));
        assert_eq!(state.payload(EntryId::new(1)), None);
        assert_eq!(state.entries().len(), 1);
    }

    #[test]
    fn shared_state_entries_follow_draft() {
        let snapshot = PlanSnapshot::new(
            PLAN,
            vec![
                Entry::new(EntryId::new(1), payload(1)),
                Entry::new(EntryId::new(2), payload(2)),
            ],
        );
        let state = SharedPlanState::new(&snapshot);
        let committed = state.committed();
        state.with_draft(|draft| {
            draft.begin_drag(committed.clone());
            draft.move_entry(EntryId::new(2), 0);
        });
        let ids: Vec<_> = state.entries().iter().map(|entry| entry.id).collect();
        assert_eq!(ids, vec![EntryId::new(2), EntryId::new(1)]);
    }
}
