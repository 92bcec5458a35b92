#![forbid(unsafe_code)]

//! Debounced validation preview during a drag.
//!
//! All tests run on paused tokio time: sleeps advance the clock instantly and
//! timers fire in order, so debounce windows can be asserted exactly.
//!
//! | Scenario | Expectation |
//! |----------|-------------|
//! | moves at 0/50/90ms | one request, for the 90ms order |
//! | slow first response | discarded once a newer draft exists |
//! | request failure | committed result stays visible |
//! | drop | committed view replaces the preview |
//!
//! Run:
//!   cargo test -p skillplan-runtime --test preview_debounce

use std::sync::Arc;
use std::time::Duration;

use skillplan_core::{
    EntryId, EntryPayload, IssueSeverity, OrderedCollection, PlanId, PlanStore, RemoteError,
    SkillKey,
};
use skillplan_harness::{InMemoryPlanStore, PrerequisiteRules, RemoteOp};
use skillplan_runtime::{DropOutcome, EditorConfig, PlanSession, PreviewConfig, ValidationSource};
use tokio::time::sleep;

const PLAN: PlanId = PlanId::new(11);

/// Plan `[A = 1:1, B = 2:1, C = 3:1]` where skill 2 needs skill 1 at
/// levels 1 and 2. Level 2 is never planned, so B always carries a warning;
/// moving B before A adds an ordering error.
async fn open_abc(config: EditorConfig) -> (PlanSession, Arc<InMemoryPlanStore>, [EntryId; 3]) {
    let rules = PrerequisiteRules::new()
        .require(2, SkillKey::new(1, 1))
        .require(2, SkillKey::new(1, 2));
    let store = Arc::new(InMemoryPlanStore::with_rules(rules));
    let ids = store.seed_plan(
        PLAN,
        (1..=3)
            .map(|skill| EntryPayload::new(SkillKey::new(skill, 1)))
            .collect(),
    );
    let session = PlanSession::open(Arc::clone(&store) as Arc<dyn PlanStore>, PLAN, config)
        .await
        .unwrap();
    store.clear_calls();
    (session, store, [ids[0], ids[1], ids[2]])
}

fn order(ids: &[EntryId]) -> OrderedCollection {
    OrderedCollection::new(ids.to_vec())
}

// ============================================================================
// Debounce window
// ============================================================================

#[tokio::test(start_paused = true)]
async fn rapid_moves_send_one_request_for_last_draft() {
    let (mut session, store, [a, b, c]) = open_abc(EditorConfig::default()).await;

    session.begin_drag();
    assert!(session.move_entry(c, 0)); // t = 0
    sleep(Duration::from_millis(50)).await;
    assert!(session.move_entry(b, 0)); // t = 50
    sleep(Duration::from_millis(40)).await;
    assert!(session.move_entry(a, 1)); // t = 90
    let last = session.draft_order();
    assert_eq!(last, order(&[b, a, c]));

    // Quiet until t = 289: nothing sent yet.
    sleep(Duration::from_millis(199)).await;
    assert!(store.validate_calls().is_empty());

    sleep(Duration::from_millis(100)).await;
    assert_eq!(store.validate_calls(), vec![last.ids().to_vec()]);

    let shown = session.validation().unwrap();
    assert_eq!(shown.source, ValidationSource::Preview);
    assert_eq!(shown.order, last);
}

#[tokio::test(start_paused = true)]
async fn configured_debounce_is_honored() {
    let config = EditorConfig {
        preview: PreviewConfig {
            debounce_ms: 20,
            enabled: true,
        },
        ..EditorConfig::default()
    };
    let (mut session, store, [_, b, _]) = open_abc(config).await;

    session.begin_drag();
    session.move_entry(b, 0);
    sleep(Duration::from_millis(25)).await;
    assert_eq!(store.validate_calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn disabled_preview_sends_nothing() {
    let config = EditorConfig {
        preview: PreviewConfig {
            debounce_ms: 200,
            enabled: false,
        },
        ..EditorConfig::default()
    };
    let (mut session, store, [_, b, _]) = open_abc(config).await;

    session.begin_drag();
    session.move_entry(b, 0);
    sleep(Duration::from_secs(1)).await;
    assert!(store.validate_calls().is_empty());
    assert_eq!(
        session.validation().map(|shown| shown.source),
        Some(ValidationSource::Committed)
    );
}

// ============================================================================
// Badges
// ============================================================================

#[tokio::test(start_paused = true)]
async fn badges_follow_preview_with_error_precedence() {
    let (mut session, _store, [a, b, _]) = open_abc(EditorConfig::default()).await;

    // Committed order: B only misses level 2 of skill 1.
    let badges = session.validation_by_key();
    assert_eq!(badges.get(&SkillKey::new(2, 1)), Some(&IssueSeverity::Warning));
    assert_eq!(badges.get(&SkillKey::new(1, 1)), None);

    session.begin_drag();
    session.move_entry(b, 0);
    sleep(Duration::from_millis(250)).await;

    // Preview: B is now also ahead of A, and the error wins.
    let badges = session.validation_by_key();
    assert_eq!(badges.get(&SkillKey::new(2, 1)), Some(&IssueSeverity::Error));
    assert_eq!(session.draft_order().position(a), Some(1));
}

// ============================================================================
// Stale responses and failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn slow_response_for_old_draft_is_discarded() {
    let (mut session, store, [a, b, c]) = open_abc(EditorConfig::default()).await;
    store.set_latency(RemoteOp::ValidateOrder, Duration::from_millis(500));

    session.begin_drag();
    session.move_entry(c, 0); // request at t = 200, answers at 700
    sleep(Duration::from_millis(250)).await;
    session.move_entry(b, 0); // request at t = 450, answers at 950
    let newest = session.draft_order();
    assert_eq!(newest, order(&[b, c, a]));

    sleep(Duration::from_millis(500)).await; // t = 750
    assert_eq!(store.validate_calls().len(), 2);
    assert_eq!(session.preview().stale_discarded(), 1);
    assert_eq!(
        session.validation().map(|shown| shown.source),
        Some(ValidationSource::Committed)
    );

    sleep(Duration::from_millis(250)).await; // t = 1000
    let shown = session.validation().unwrap();
    assert_eq!(shown.source, ValidationSource::Preview);
    assert_eq!(shown.order, newest);
}

#[tokio::test(start_paused = true)]
async fn failed_preview_keeps_committed_result() {
    let (mut session, store, [_, _, c]) = open_abc(EditorConfig::default()).await;
    let committed = session.committed_order();
    store.fail_next(RemoteOp::ValidateOrder, RemoteError::transport("reset"));

    session.begin_drag();
    session.move_entry(c, 0);
    sleep(Duration::from_millis(300)).await;

    assert_eq!(store.validate_calls().len(), 1);
    let shown = session.validation().unwrap();
    assert_eq!(shown.source, ValidationSource::Committed);
    assert_eq!(shown.order, committed);
}

// ============================================================================
// Drop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn drop_replaces_preview_with_committed_validation() {
    let (mut session, store, [a, b, c]) = open_abc(EditorConfig::default()).await;

    session.begin_drag();
    session.move_entry(b, 0);
    sleep(Duration::from_millis(250)).await;
    assert_eq!(
        session.validation().map(|shown| shown.source),
        Some(ValidationSource::Preview)
    );

    assert!(session.end_drag(DropOutcome::Dropped).await.is_committed());
    let shown = session.validation().unwrap();
    assert_eq!(shown.source, ValidationSource::Committed);
    assert_eq!(shown.order, order(&[b, a, c]));
    assert_eq!(
        session.validation_by_key().get(&SkillKey::new(2, 1)),
        Some(&IssueSeverity::Error)
    );
    // One preview request plus the post-commit validation.
    assert_eq!(store.validate_calls().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn pending_timer_is_dropped_when_drag_ends() {
    let (mut session, store, [_, b, _]) = open_abc(EditorConfig::default()).await;

    session.begin_drag();
    session.move_entry(b, 0);
    sleep(Duration::from_millis(100)).await;
    session.end_drag(DropOutcome::Cancelled).await;
    sleep(Duration::from_millis(500)).await;

    assert!(store.validate_calls().is_empty());
    assert_eq!(session.draft_order(), session.committed_order());
}
