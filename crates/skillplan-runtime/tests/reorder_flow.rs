#![forbid(unsafe_code)]

//! End-to-end drag reorder through a `PlanSession` and the in-memory store.
//!
//! Covers:
//! - Drag, drop, commit and undo of a reorder.
//! - No-op drops never reach the store or the history.
//! - Cancelled drops restore the baseline.
//! - A failed commit snaps the draft back and raises one notification.
//!
//! Run:
//!   cargo test -p skillplan-runtime --test reorder_flow

use std::sync::Arc;

use skillplan_core::{EntryId, EntryPayload, OrderedCollection, PlanId, PlanStore, RemoteError, SkillKey};
use skillplan_harness::{InMemoryPlanStore, RemoteOp};
use skillplan_runtime::{
    DropOutcome, EditorConfig, HistoryError, NotificationLevel, PlanSession, ReconcileOutcome,
};
use tracing_test::traced_test;

const PLAN: PlanId = PlanId::new(1);

// ============================================================================
// Helpers
// ============================================================================

/// Plan `[A, B, C]`.
async fn open_abc() -> (PlanSession, Arc<InMemoryPlanStore>, [EntryId; 3]) {
    let store = Arc::new(InMemoryPlanStore::new());
    let ids = store.seed_plan(
        PLAN,
        (1..=3)
            .map(|skill| EntryPayload::new(SkillKey::new(skill, 1)))
            .collect(),
    );
    let session = PlanSession::open(
        Arc::clone(&store) as Arc<dyn PlanStore>,
        PLAN,
        EditorConfig::default(),
    )
    .await
    .unwrap();
    store.clear_calls();
    (session, store, [ids[0], ids[1], ids[2]])
}

fn order(ids: &[EntryId]) -> OrderedCollection {
    OrderedCollection::new(ids.to_vec())
}

// ============================================================================
// Commit and undo
// ============================================================================

#[tokio::test]
async fn drag_to_front_then_undo() {
    let (mut session, store, [a, b, c]) = open_abc().await;

    assert!(session.begin_drag());
    assert!(session.move_entry(c, 0));
    assert_eq!(session.draft_order(), order(&[c, a, b]));
    // Nothing is sent while dragging.
    assert!(store.reorder_calls().is_empty());

    let outcome = session.end_drag(DropOutcome::Dropped).await;
    assert_eq!(outcome, ReconcileOutcome::Committed);
    assert_eq!(store.reorder_calls(), vec![vec![c, a, b]]);
    assert_eq!(session.committed_order(), order(&[c, a, b]));
    assert!(session.can_undo());

    assert_eq!(session.undo().await, Some(Ok("Reorder plan".to_owned())));
    assert_eq!(store.reorder_calls().last(), Some(&vec![a, b, c]));
    assert_eq!(session.draft_order(), order(&[a, b, c]));
    assert_eq!(store.order(PLAN), order(&[a, b, c]));
    assert!(!session.can_undo());
    assert!(session.can_redo());

    assert_eq!(session.redo().await, Some(Ok("Reorder plan".to_owned())));
    assert_eq!(session.draft_order(), order(&[c, a, b]));
    assert_eq!(store.reorder_calls().len(), 3);
}

#[tokio::test]
async fn new_edit_truncates_redo() {
    let (session, store, [a, b, c]) = open_abc().await;

    session.reorder(order(&[b, a, c])).await;
    session.undo().await;
    assert!(session.can_redo());

    assert!(session.reorder(order(&[c, b, a])).await.is_committed());
    assert!(!session.can_redo());
    assert_eq!(session.history().undo_labels(10), vec!["Reorder plan"]);
    assert_eq!(store.order(PLAN), order(&[c, b, a]));
}

// ============================================================================
// No-op and cancel
// ============================================================================

#[tokio::test]
async fn identical_order_is_discarded() {
    let (mut session, store, [a, _, _]) = open_abc().await;

    assert!(session.begin_drag());
    assert!(!session.move_entry(a, 0));
    assert_eq!(
        session.end_drag(DropOutcome::Dropped).await,
        ReconcileOutcome::Unchanged
    );
    assert!(store.reorder_calls().is_empty());
    assert!(!session.can_undo());
}

#[tokio::test]
async fn drag_away_and_back_is_discarded() {
    let (mut session, store, [a, b, c]) = open_abc().await;

    session.begin_drag();
    assert!(session.move_entry(c, 0));
    assert!(session.move_entry(c, 2));
    assert_eq!(session.draft_order(), order(&[a, b, c]));
    assert_eq!(
        session.end_drag(DropOutcome::Dropped).await,
        ReconcileOutcome::Unchanged
    );
    assert!(store.reorder_calls().is_empty());
    assert!(!session.can_undo());
}

#[tokio::test]
async fn cancelled_drop_restores_baseline() {
    let (mut session, store, [a, b, c]) = open_abc().await;

    session.begin_drag();
    session.move_entry(a, 2);
    assert_eq!(
        session.end_drag(DropOutcome::Cancelled).await,
        ReconcileOutcome::Cancelled
    );
    assert_eq!(session.draft_order(), order(&[a, b, c]));
    assert!(!session.is_dragging());
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn update_drag_rejects_foreign_ids() {
    let (mut session, _store, [a, b, _]) = open_abc().await;

    session.begin_drag();
    assert!(!session.update_drag(order(&[b, a])));
    assert!(!session.update_drag(order(&[b, a, EntryId::new(99)])));
    assert_eq!(session.draft_order(), session.committed_order());
}

// ============================================================================
// Failure
// ============================================================================

#[tokio::test]
#[traced_test]
async fn failed_commit_snaps_back_and_notifies_once() {
    let (mut session, store, [a, b, c]) = open_abc().await;
    store.fail_next(RemoteOp::Reorder, RemoteError::transport("connection reset"));

    session.begin_drag();
    session.move_entry(c, 0);
    let outcome = session.end_drag(DropOutcome::Dropped).await;

    match outcome {
        ReconcileOutcome::Failed(HistoryError::Commit { label, source }) => {
            assert_eq!(label, "Reorder plan");
            assert_eq!(source, RemoteError::transport("connection reset"));
        }
        other => panic!("expected commit failure, got {other:?}"),
    }
    assert_eq!(session.draft_order(), order(&[a, b, c]));
    assert_eq!(store.order(PLAN), order(&[a, b, c]));
    assert!(!session.can_undo());
    assert!(!session.is_busy());

    let notes = session.notifications().active();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].level, NotificationLevel::Error);
    assert_eq!(notes[0].action, "Reorder plan");
    assert!(logs_contain("remote action failed"));
}

#[tokio::test]
async fn failed_undo_is_reported_and_discarded() {
    let (session, store, [a, b, c]) = open_abc().await;
    session.reorder(order(&[c, b, a])).await;
    store.fail_next(RemoteOp::Reorder, RemoteError::Timeout { millis: 3000 });

    let result = session.undo().await;
    assert!(matches!(result, Some(Err(HistoryError::Rollback { .. }))));
    assert!(!session.can_undo());
    assert!(!session.can_redo());
    assert_eq!(session.draft_order(), order(&[c, b, a]));
    assert_eq!(session.notifications().len(), 1);
}
