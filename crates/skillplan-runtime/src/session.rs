#![forbid(unsafe_code)]

//! UI-facing editing session for one plan at a time.
//!
//! [`PlanSession`] wires the draft controller, the validation preview, the
//! reconciler and the history together. The UI reads `draft_order()` and
//! `validation_by_key()` to render, feeds drag input through the drag
//! methods, and awaits edit operations.
//!
//! ```text
//!  drag input ──► draft (sync) ──► preview debounce ──► validate_order
//!                     │
//!  drop ──────────────┴──► reconciler ──► history.track ──► reorder
//! ```
//!
//! Switching plans reloads state and clears the history.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use skillplan_core::{
    Entry, EntryId, EntryPatch, EntryPayload, IssueSeverity, OrderedCollection, PlanId, PlanStore,
    RemoteResult, SkillKey,
};

use crate::config::EditorConfig;
use crate::draft::DropOutcome;
use crate::notification::NotificationCenter;
use crate::preview::{TaggedValidation, ValidationPreviewPipeline};
use crate::reconciler::{MutationReconciler, ReconcileOutcome, SharedPlanState};
use crate::undo::{ActionHistory, ActionRecord, HistoryError};

/// Editing session bound to one plan.
pub struct PlanSession {
    store: Arc<dyn PlanStore>,
    config: EditorConfig,
    history: ActionHistory,
    notifications: NotificationCenter,
    reconciler: MutationReconciler,
    preview: ValidationPreviewPipeline,
}

impl std::fmt::Debug for PlanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanSession")
            .field("plan", &self.plan())
            .field("reconciler", &self.reconciler)
            .field("preview", &self.preview)
            .finish_non_exhaustive()
    }
}

impl PlanSession {
    /// Load `plan` and start an empty history for it.
    pub async fn open(
        store: Arc<dyn PlanStore>,
        plan: PlanId,
        config: EditorConfig,
    ) -> RemoteResult<Self> {
        let snapshot = store.load_plan(plan).await?;
        let history = ActionHistory::for_plan(plan, config.history.clone());
        let notifications = NotificationCenter::new(config.notifications.clone());
        let reconciler = MutationReconciler::new(
            plan,
            Arc::clone(&store),
            history.clone(),
            SharedPlanState::new(&snapshot),
            notifications.clone(),
        );
        let preview = ValidationPreviewPipeline::new(plan, Arc::clone(&store), config.preview.clone());

        tracing::info!(
            target: "skillplan.session",
            plan = %plan,
            entries = snapshot.entries.len(),
            "plan opened"
        );
        let session = Self {
            store,
            config,
            history,
            notifications,
            reconciler,
            preview,
        };
        session.refresh_validation().await;
        Ok(session)
    }

    /// Move the session to another plan. History never crosses plans.
    ///
    /// On a load failure the session stays on the current plan.
    pub async fn switch_plan(&mut self, plan: PlanId) -> RemoteResult<()> {
        if plan == self.plan() {
            return Ok(());
        }
        let snapshot = self.store.load_plan(plan).await?;
        self.history.bind_plan(plan);
        self.reconciler = MutationReconciler::new(
            plan,
            Arc::clone(&self.store),
            self.history.clone(),
            SharedPlanState::new(&snapshot),
            self.notifications.clone(),
        );
        self.preview =
            ValidationPreviewPipeline::new(plan, Arc::clone(&self.store), self.config.preview.clone());

        tracing::info!(
            target: "skillplan.session",
            plan = %plan,
            entries = snapshot.entries.len(),
            "plan switched"
        );
        self.refresh_validation().await;
        Ok(())
    }

    #[must_use]
    pub fn plan(&self) -> PlanId {
        self.reconciler.plan()
    }

    #[must_use]
    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    // ========================================================================
    // Render state
    // ========================================================================

    /// Order to render right now.
    #[must_use]
    pub fn draft_order(&self) -> OrderedCollection {
        self.reconciler.state().draft()
    }

    /// Last order the store acknowledged.
    #[must_use]
    pub fn committed_order(&self) -> OrderedCollection {
        self.reconciler.state().committed()
    }

    /// Entries in draft order.
    #[must_use]
    pub fn entries(&self) -> Vec<Entry> {
        self.reconciler.state().entries()
    }

    #[must_use]
    pub fn payload(&self, id: EntryId) -> Option<EntryPayload> {
        let live = self.reconciler.identities().resolve(id);
        self.reconciler.state().payload(live)
    }

    /// The id `id` currently lives under, after any re-creation.
    #[must_use]
    pub fn resolve(&self, id: EntryId) -> EntryId {
        self.reconciler.identities().resolve(id)
    }

    #[must_use]
    pub fn validation(&self) -> Option<TaggedValidation> {
        self.preview.current()
    }

    /// Badge state per entry key.
    #[must_use]
    pub fn validation_by_key(&self) -> HashMap<SkillKey, IssueSeverity> {
        self.preview.status_by_key()
    }

    #[must_use]
    pub fn preview(&self) -> &ValidationPreviewPipeline {
        &self.preview
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.history.is_busy()
    }

    #[must_use]
    pub fn history(&self) -> &ActionHistory {
        &self.history
    }

    #[must_use]
    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        self.reconciler.state().with_draft(|draft| draft.is_dragging())
    }

    // ========================================================================
    // Drag lifecycle
    // ========================================================================

    /// Start dragging from the committed order.
    pub fn begin_drag(&mut self) -> bool {
        let state = self.reconciler.state();
        let snapshot = state.committed();
        if !state.with_draft(|draft| draft.begin_drag(snapshot)) {
            return false;
        }
        self.preview.set_dragging(true);
        true
    }

    /// Replace the draft; restarts the preview debounce when it changed.
    pub fn update_drag(&mut self, candidate: OrderedCollection) -> bool {
        let changed = self
            .reconciler
            .state()
            .with_draft(|draft| draft.update_drag(candidate));
        if changed {
            let draft = self.draft_order();
            self.preview.on_draft_changed(&draft);
        }
        changed
    }

    /// Move one entry within the draft.
    pub fn move_entry(&mut self, id: EntryId, to_index: usize) -> bool {
        let changed = self
            .reconciler
            .state()
            .with_draft(|draft| draft.move_entry(id, to_index));
        if changed {
            let draft = self.draft_order();
            self.preview.on_draft_changed(&draft);
        }
        changed
    }

    /// Finish the drag and commit the dropped order if it changed.
    pub async fn end_drag(&mut self, outcome: DropOutcome) -> ReconcileOutcome {
        self.preview.set_dragging(false);
        let result = self.reconciler.finish_drag(outcome).await;
        self.after_edit(&result).await;
        result
    }

    // ========================================================================
    // Edits
    // ========================================================================

    /// Commit an explicit order without a drag.
    pub async fn reorder(&self, order: OrderedCollection) -> ReconcileOutcome {
        let result = self.reconciler.reorder_to(order).await;
        self.after_edit(&result).await;
        result
    }

    pub async fn add(&self, payload: EntryPayload) -> ReconcileOutcome {
        let result = self.reconciler.add_entry(payload).await;
        self.after_edit(&result).await;
        result
    }

    pub async fn update(&self, id: EntryId, patch: EntryPatch) -> ReconcileOutcome {
        let result = self.reconciler.update_entry(id, patch).await;
        self.after_edit(&result).await;
        result
    }

    pub async fn delete(&self, id: EntryId) -> ReconcileOutcome {
        let result = self.reconciler.delete_entry(id).await;
        self.after_edit(&result).await;
        result
    }

    /// Track a caller-defined reversible action.
    pub async fn track<C, CF, R, RF>(
        &self,
        label: impl Into<String>,
        commit: C,
        rollback: R,
    ) -> ReconcileOutcome
    where
        C: Fn() -> CF + Send + Sync + 'static,
        CF: Future<Output = RemoteResult<()>> + Send + 'static,
        R: Fn() -> RF + Send + Sync + 'static,
        RF: Future<Output = RemoteResult<()>> + Send + 'static,
    {
        let record = ActionRecord::new(label, commit, rollback);
        let result = self.reconciler.track(record).await;
        self.after_edit(&result).await;
        result
    }

    pub async fn undo(&self) -> Option<Result<String, HistoryError>> {
        let result = self.reconciler.undo().await?;
        if result.is_ok() {
            self.refresh_validation().await;
        }
        Some(result)
    }

    pub async fn redo(&self) -> Option<Result<String, HistoryError>> {
        let result = self.reconciler.redo().await?;
        if result.is_ok() {
            self.refresh_validation().await;
        }
        Some(result)
    }

    /// Re-validate the committed order. Failures are logged only.
    pub async fn refresh_validation(&self) {
        let committed = self.committed_order();
        if let Err(err) = self.preview.refresh_committed(&committed).await {
            tracing::warn!(
                target: "skillplan.session",
                plan = %self.plan(),
                error = %err,
                "committed validation failed"
            );
        }
    }

    async fn after_edit(&self, outcome: &ReconcileOutcome) {
        if outcome.is_committed() {
            self.refresh_validation().await;
        }
    }
}
