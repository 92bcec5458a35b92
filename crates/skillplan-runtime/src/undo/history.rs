#![forbid(unsafe_code)]

//! History stacks and the busy flag.
//!
//! [`ActionHistory`] is the per-plan history context. It holds the undo and
//! redo stacks plus a single busy flag that serializes every tracked remote
//! mutation: `track`, `undo` and `redo` never overlap.
//!
//! # Invariants
//!
//! 1. A record reaches the undo stack only after its commit succeeded.
//! 2. The redo stack is cleared whenever a new record is pushed.
//! 3. `undo_stack.len() <= config.max_depth` after any operation.
//! 4. The busy flag is released on every exit path, including when the
//!    awaiting future is dropped mid-flight.
//! 5. Stacks never cross plan boundaries: binding a different plan clears
//!    them, and an action still in flight across a clear is not recorded.
//!
//! # Failure Modes
//!
//! | Call | On failure |
//! |------|------------|
//! | `track` | record not added, redo stack untouched |
//! | `undo`  | record dropped from both stacks, no retry |
//! | `redo`  | record dropped from both stacks, no retry |
//!
//! ```text
//! track(a), track(b), track(c)
//! ┌───────────────────────────────────────────────┐
//! │ Undo Stack: [a, b, c]      Redo Stack: []      │
//! └───────────────────────────────────────────────┘
//! undo() x2
//! ┌───────────────────────────────────────────────┐
//! │ Undo Stack: [a]            Redo Stack: [c, b]  │
//! └───────────────────────────────────────────────┘
//! track(d)  <-- new branch, clears redo
//! ┌───────────────────────────────────────────────┐
//! │ Undo Stack: [a, d]         Redo Stack: []      │
//! └───────────────────────────────────────────────┘
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use skillplan_core::{PlanId, RemoteError, RemoteResult};
use thiserror::Error;

use super::action::ActionRecord;
use crate::effect::{ActionPhase, trace_action};

/// Configuration for the action history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Maximum number of records kept for undo. Oldest are evicted first.
    pub max_depth: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_depth: 100 }
    }
}

impl HistoryConfig {
    #[must_use]
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Effectively unlimited depth. Capped at `i64::MAX` so the value still
    /// fits a TOML integer.
    #[must_use]
    pub fn unlimited() -> Self {
        Self {
            max_depth: i64::MAX as usize,
        }
    }
}

/// Why a tracked action did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("'{label}' ignored: another edit is still in progress")]
    Busy { label: String },

    #[error("'{label}' failed: {source}")]
    Commit { label: String, source: RemoteError },

    #[error("undo of '{label}' failed: {source}")]
    Rollback { label: String, source: RemoteError },

    #[error("redo of '{label}' failed: {source}")]
    Redo { label: String, source: RemoteError },
}

impl HistoryError {
    /// Label of the action the error belongs to.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Busy { label }
            | Self::Commit { label, .. }
            | Self::Rollback { label, .. }
            | Self::Redo { label, .. } => label,
        }
    }

    /// Underlying remote failure, if there was one.
    #[must_use]
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Self::Busy { .. } => None,
            Self::Commit { source, .. }
            | Self::Rollback { source, .. }
            | Self::Redo { source, .. } => Some(source),
        }
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy { .. })
    }
}

struct HistoryState {
    /// Records available for undo (newest at back).
    undo_stack: VecDeque<ActionRecord>,
    /// Records available for redo (most recently undone at back).
    redo_stack: VecDeque<ActionRecord>,
    busy: bool,
    plan: Option<PlanId>,
    /// Bumped by every clear; in-flight actions from an older epoch are dropped.
    epoch: u64,
    config: HistoryConfig,
}

impl HistoryState {
    fn push_undo(&mut self, record: ActionRecord) {
        self.undo_stack.push_back(record);
        while self.undo_stack.len() > self.config.max_depth {
            self.undo_stack.pop_front();
        }
    }

    fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// Per-plan undo/redo history with a single busy flag.
///
/// Cloning yields another handle to the same history.
#[derive(Clone)]
pub struct ActionHistory {
    inner: Arc<Mutex<HistoryState>>,
}

impl fmt::Debug for ActionHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("ActionHistory")
            .field("plan", &state.plan)
            .field("undo_depth", &state.undo_stack.len())
            .field("redo_depth", &state.redo_stack.len())
            .field("busy", &state.busy)
            .field("config", &state.config)
            .finish()
    }
}

impl Default for ActionHistory {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

/// Holds the busy flag; releases it on drop.
struct BusyGuard {
    inner: Arc<Mutex<HistoryState>>,
    epoch: u64,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .busy = false;
    }
}

impl ActionHistory {
    #[must_use]
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HistoryState {
                undo_stack: VecDeque::new(),
                redo_stack: VecDeque::new(),
                busy: false,
                plan: None,
                epoch: 0,
                config,
            })),
        }
    }

    /// Create a history already bound to `plan`.
    #[must_use]
    pub fn for_plan(plan: PlanId, config: HistoryConfig) -> Self {
        let history = Self::new(config);
        history.lock().plan = Some(plan);
        history
    }

    fn lock(&self) -> MutexGuard<'_, HistoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_acquire(&self) -> Option<BusyGuard> {
        let mut state = self.lock();
        if state.busy {
            return None;
        }
        state.busy = true;
        Some(BusyGuard {
            inner: Arc::clone(&self.inner),
            epoch: state.epoch,
        })
    }

    // ========================================================================
    // Core Operations
    // ========================================================================

    /// Commit an edit and, on success, record it for undo.
    ///
    /// Rejected with [`HistoryError::Busy`] without calling `commit` when
    /// another tracked action is in flight.
    pub async fn track<C, CF, R, RF>(
        &self,
        label: impl Into<String>,
        commit: C,
        rollback: R,
    ) -> Result<(), HistoryError>
    where
        C: Fn() -> CF + Send + Sync + 'static,
        CF: Future<Output = RemoteResult<()>> + Send + 'static,
        R: Fn() -> RF + Send + Sync + 'static,
        RF: Future<Output = RemoteResult<()>> + Send + 'static,
    {
        self.track_record(ActionRecord::new(label, commit, rollback))
            .await
    }

    /// [`track`](Self::track) for a prebuilt record.
    pub async fn track_record(&self, record: ActionRecord) -> Result<(), HistoryError> {
        let Some(guard) = self.try_acquire() else {
            tracing::debug!(
                target: "skillplan.history",
                label = record.label(),
                "track rejected while busy"
            );
            return Err(HistoryError::Busy {
                label: record.label().to_owned(),
            });
        };

        match trace_action(record.label(), ActionPhase::Commit, record.commit()).await {
            Ok(()) => {
                let mut state = self.lock();
                if state.epoch == guard.epoch {
                    state.redo_stack.clear();
                    state.push_undo(record);
                } else {
                    tracing::debug!(
                        target: "skillplan.history",
                        label = record.label(),
                        "history cleared while committing; action not recorded"
                    );
                }
                Ok(())
            }
            Err(source) => Err(HistoryError::Commit {
                label: record.label().to_owned(),
                source,
            }),
        }
    }

    /// Undo the most recent action.
    ///
    /// # Returns
    ///
    /// - `None` if there is nothing to undo or another action is in flight
    /// - `Some(Ok(label))` if the rollback succeeded
    /// - `Some(Err(error))` if it failed; the record is discarded
    pub async fn undo(&self) -> Option<Result<String, HistoryError>> {
        let (record, guard) = {
            let mut state = self.lock();
            if state.busy {
                return None;
            }
            let record = state.undo_stack.pop_back()?;
            state.busy = true;
            let guard = BusyGuard {
                inner: Arc::clone(&self.inner),
                epoch: state.epoch,
            };
            (record, guard)
        };

        let label = record.label().to_owned();
        match trace_action(&label, ActionPhase::Rollback, record.rollback()).await {
            Ok(()) => {
                let mut state = self.lock();
                if state.epoch == guard.epoch {
                    state.redo_stack.push_back(record);
                }
                Some(Ok(label))
            }
            Err(source) => Some(Err(HistoryError::Rollback { label, source })),
        }
    }

    /// Redo the most recently undone action.
    ///
    /// Same return contract as [`undo`](Self::undo).
    pub async fn redo(&self) -> Option<Result<String, HistoryError>> {
        let (record, guard) = {
            let mut state = self.lock();
            if state.busy {
                return None;
            }
            let record = state.redo_stack.pop_back()?;
            state.busy = true;
            let guard = BusyGuard {
                inner: Arc::clone(&self.inner),
                epoch: state.epoch,
            };
            (record, guard)
        };

        let label = record.label().to_owned();
        match trace_action(&label, ActionPhase::Redo, record.commit()).await {
            Ok(()) => {
                let mut state = self.lock();
                if state.epoch == guard.epoch {
                    state.push_undo(record);
                }
                Some(Ok(label))
            }
            Err(source) => Some(Err(HistoryError::Redo { label, source })),
        }
    }

    /// Check if undo is available.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.lock().undo_stack.is_empty()
    }

    /// Check if redo is available.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.lock().redo_stack.is_empty()
    }

    /// Whether a tracked action is currently in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    // ========================================================================
    // Plan binding
    // ========================================================================

    /// Bind the history to `plan`, clearing it if the plan changed.
    ///
    /// Returns `true` when the stacks were cleared.
    pub fn bind_plan(&self, plan: PlanId) -> bool {
        let mut state = self.lock();
        if state.plan == Some(plan) {
            return false;
        }
        let had_plan = state.plan.replace(plan);
        state.clear();
        tracing::debug!(
            target: "skillplan.history",
            from = ?had_plan,
            to = %plan,
            "history bound to plan"
        );
        true
    }

    /// Plan the history currently belongs to.
    #[must_use]
    pub fn plan(&self) -> Option<PlanId> {
        self.lock().plan
    }

    // ========================================================================
    // Info
    // ========================================================================

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.lock().undo_stack.len()
    }

    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.lock().redo_stack.len()
    }

    /// Labels of undoable actions (most recent first).
    #[must_use]
    pub fn undo_labels(&self, limit: usize) -> Vec<String> {
        self.lock()
            .undo_stack
            .iter()
            .rev()
            .take(limit)
            .map(|record| record.label().to_owned())
            .collect()
    }

    /// Labels of redoable actions (most recent first).
    #[must_use]
    pub fn redo_labels(&self, limit: usize) -> Vec<String> {
        self.lock()
            .redo_stack
            .iter()
            .rev()
            .take(limit)
            .map(|record| record.label().to_owned())
            .collect()
    }

    #[must_use]
    pub fn next_undo_label(&self) -> Option<String> {
        self.lock()
            .undo_stack
            .back()
            .map(|record| record.label().to_owned())
    }

    #[must_use]
    pub fn next_redo_label(&self) -> Option<String> {
        self.lock()
            .redo_stack
            .back()
            .map(|record| record.label().to_owned())
    }

    #[must_use]
    pub fn config(&self) -> HistoryConfig {
        self.lock().config.clone()
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Clear all history (both undo and redo).
    pub fn clear(&self) {
        self.lock().clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokio::sync::Notify;

    /// Shared list the test actions push to and pop from.
    type Log = Arc<Mutex<Vec<i32>>>;

    async fn track_push(history: &ActionHistory, log: &Log, value: i32) -> Result<(), HistoryError> {
        let up = Arc::clone(log);
        let down = Arc::clone(log);
        history
            .track(
                format!("push {value}"),
                move || {
                    let up = Arc::clone(&up);
                    async move {
                        up.lock().unwrap().push(value);
                        Ok::<(), RemoteError>(())
                    }
                },
                move || {
                    let down = Arc::clone(&down);
                    async move {
                        down.lock().unwrap().pop();
                        Ok::<(), RemoteError>(())
                    }
                },
            )
            .await
    }

    fn failing() -> impl Fn() -> std::future::Ready<RemoteResult<()>> + Send + Sync + 'static {
        || std::future::ready(Err(RemoteError::transport("offline")))
    }

    fn succeeding() -> impl Fn() -> std::future::Ready<RemoteResult<()>> + Send + Sync + 'static {
        || std::future::ready(Ok(()))
    }

    #[tokio::test]
    async fn new_history_is_empty() {
        let history = ActionHistory::default();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert!(!history.is_busy());
        assert_eq!(history.undo_depth(), 0);
        assert_eq!(history.redo_depth(), 0);
    }

    #[tokio::test]
    async fn track_enables_undo() {
        let history = ActionHistory::default();
        let log = Log::default();
        track_push(&history, &log, 1).await.unwrap();

        assert!(history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(*log.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn undo_then_redo_moves_between_stacks() {
        let history = ActionHistory::default();
        let log = Log::default();
        track_push(&history, &log, 1).await.unwrap();

        assert_eq!(history.undo().await, Some(Ok("push 1".to_owned())));
        assert!(log.lock().unwrap().is_empty());
        assert!(!history.can_undo());
        assert!(history.can_redo());

        assert_eq!(history.redo().await, Some(Ok("push 1".to_owned())));
        assert_eq!(*log.lock().unwrap(), vec![1]);
        assert!(history.can_undo());
        assert!(!history.can_redo());
    }

    #[tokio::test]
    async fn new_track_clears_redo() {
        let history = ActionHistory::default();
        let log = Log::default();
        track_push(&history, &log, 1).await.unwrap();
        track_push(&history, &log, 2).await.unwrap();
        history.undo().await;
        assert!(history.can_redo());

        track_push(&history, &log, 3).await.unwrap();
        assert!(!history.can_redo());
        assert_eq!(history.undo_labels(5), vec!["push 3", "push 1"]);
        assert_eq!(*log.lock().unwrap(), vec![1, 3]);
    }

    #[tokio::test]
    async fn failed_commit_is_not_recorded() {
        let history = ActionHistory::default();
        let log = Log::default();
        track_push(&history, &log, 1).await.unwrap();
        history.undo().await;

        let err = history
            .track("broken", failing(), succeeding())
            .await
            .unwrap_err();
        assert_eq!(err.label(), "broken");
        assert!(matches!(err, HistoryError::Commit { .. }));
        assert!(!history.is_busy());
        assert_eq!(history.undo_depth(), 0);
        // A failed commit does not fork the timeline.
        assert!(history.can_redo());
    }

    #[tokio::test]
    async fn failed_undo_discards_record() {
        let history = ActionHistory::default();
        history
            .track("a", succeeding(), succeeding())
            .await
            .unwrap();
        history.track("b", succeeding(), failing()).await.unwrap();

        let result = history.undo().await;
        assert!(matches!(result, Some(Err(HistoryError::Rollback { .. }))));
        assert!(!history.is_busy());
        assert_eq!(history.undo_labels(5), vec!["a"]);
        assert_eq!(history.redo_depth(), 0);
    }

    #[tokio::test]
    async fn failed_redo_discards_record() {
        let history = ActionHistory::default();
        let fail_next = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fail_next);
        history
            .track(
                "flaky",
                move || {
                    let fail = flag.load(Ordering::SeqCst);
                    async move {
                        if fail {
                            Err(RemoteError::transport("offline"))
                        } else {
                            Ok::<(), RemoteError>(())
                        }
                    }
                },
                succeeding(),
            )
            .await
            .unwrap();
        history.undo().await;
        fail_next.store(true, Ordering::SeqCst);

        let result = history.redo().await;
        assert!(matches!(result, Some(Err(HistoryError::Redo { .. }))));
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[tokio::test]
    async fn undo_and_redo_on_empty_are_noops() {
        let history = ActionHistory::default();
        assert!(history.undo().await.is_none());
        assert!(history.redo().await.is_none());
    }

    #[tokio::test]
    async fn busy_rejects_overlapping_actions() {
        let history = ActionHistory::default();
        history
            .track("first", succeeding(), succeeding())
            .await
            .unwrap();

        let gate = Arc::new(Notify::new());
        let waiter = Arc::clone(&gate);
        let pending = {
            let history = history.clone();
            tokio::spawn(async move {
                history
                    .track(
                        "slow",
                        move || {
                            let waiter = Arc::clone(&waiter);
                            async move {
                                waiter.notified().await;
                                Ok::<(), RemoteError>(())
                            }
                        },
                        succeeding(),
                    )
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert!(history.is_busy());

        assert!(history.undo().await.is_none());
        assert!(history.redo().await.is_none());
        let rejected = history.track("other", succeeding(), succeeding()).await;
        assert!(matches!(rejected, Err(HistoryError::Busy { .. })));
        assert_eq!(history.undo_labels(5), vec!["first"]);

        gate.notify_one();
        pending.await.unwrap().unwrap();
        assert!(!history.is_busy());
        assert_eq!(history.undo_labels(5), vec!["slow", "first"]);
    }

    #[tokio::test]
    async fn dropped_future_releases_busy() {
        let history = ActionHistory::default();
        let never = history.track(
            "never",
            || std::future::pending::<RemoteResult<()>>(),
            succeeding(),
        );
        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(10), never).await;
        assert!(timed_out.is_err());
        assert!(!history.is_busy());
        assert!(!history.can_undo());
    }

    #[tokio::test]
    async fn max_depth_enforced() {
        let history = ActionHistory::new(HistoryConfig::new(3));
        let log = Log::default();
        for i in 0..5 {
            track_push(&history, &log, i).await.unwrap();
        }
        assert_eq!(history.undo_depth(), 3);
        assert_eq!(history.next_undo_label().as_deref(), Some("push 4"));
    }

    #[tokio::test]
    async fn bind_plan_clears_on_change_only() {
        let history = ActionHistory::for_plan(PlanId::new(1), HistoryConfig::default());
        history
            .track("a", succeeding(), succeeding())
            .await
            .unwrap();

        assert!(!history.bind_plan(PlanId::new(1)));
        assert!(history.can_undo());

        assert!(history.bind_plan(PlanId::new(2)));
        assert!(!history.can_undo());
        assert_eq!(history.plan(), Some(PlanId::new(2)));
    }

    #[tokio::test]
    async fn action_in_flight_across_clear_is_not_recorded() {
        let history = ActionHistory::default();
        let gate = Arc::new(Notify::new());
        let waiter = Arc::clone(&gate);
        let pending = {
            let history = history.clone();
            tokio::spawn(async move {
                history
                    .track(
                        "late",
                        move || {
                            let waiter = Arc::clone(&waiter);
                            async move {
                                waiter.notified().await;
                                Ok::<(), RemoteError>(())
                            }
                        },
                        succeeding(),
                    )
                    .await
            })
        };
        tokio::task::yield_now().await;
        history.clear();
        gate.notify_one();
        pending.await.unwrap().unwrap();

        assert!(!history.can_undo());
        assert!(!history.is_busy());
    }

    #[tokio::test]
    async fn labels_and_descriptions() {
        let history = ActionHistory::default();
        let log = Log::default();
        track_push(&history, &log, 1).await.unwrap();
        track_push(&history, &log, 2).await.unwrap();

        assert_eq!(history.next_undo_label().as_deref(), Some("push 2"));
        assert_eq!(history.next_redo_label(), None);
        assert_eq!(history.undo_labels(1), vec!["push 2"]);

        history.undo().await;
        assert_eq!(history.next_redo_label().as_deref(), Some("push 2"));
        assert_eq!(history.redo_labels(5), vec!["push 2"]);
    }

    #[test]
    fn config_default_and_unlimited() {
        assert_eq!(HistoryConfig::default().max_depth, 100);
        assert_eq!(HistoryConfig::unlimited().max_depth, i64::MAX as usize);
    }

    #[test]
    fn debug_impl() {
        let debug = format!("{:?}", ActionHistory::default());
        assert!(debug.contains("ActionHistory"));
        assert!(debug.contains("undo_depth"));
    }

    #[test]
    fn error_accessors() {
        let err = HistoryError::Rollback {
            label: "Reorder plan".into(),
            source: RemoteError::transport("reset"),
        };
        assert_eq!(err.label(), "Reorder plan");
        assert_eq!(err.remote(), Some(&RemoteError::transport("reset")));
        assert!(!err.is_busy());
        assert_eq!(
            err.to_string(),
            "undo of 'Reorder plan' failed: transport failure: reset"
        );
    }
}
