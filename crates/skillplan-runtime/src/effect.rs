#![forbid(unsafe_code)]

//! Remote-action observability.
//!
//! This module provides:
//!
//! - **Tracing spans**: every commit, rollback and redo runs inside a
//!   `history.action` span carrying `label`, `phase`, `duration_us` and
//!   `result`.
//! - **Counters**: monotonic process-wide totals per phase and for failures.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use skillplan_core::RemoteResult;
use tracing::Instrument;
use web_time::Instant;

// ---------------------------------------------------------------------------
// Monotonic counters
// ---------------------------------------------------------------------------

static ACTIONS_COMMITTED_TOTAL: AtomicU64 = AtomicU64::new(0);
static ACTIONS_ROLLED_BACK_TOTAL: AtomicU64 = AtomicU64::new(0);
static ACTIONS_REDONE_TOTAL: AtomicU64 = AtomicU64::new(0);
static ACTIONS_FAILED_TOTAL: AtomicU64 = AtomicU64::new(0);

/// Successful first commits.
#[must_use]
pub fn actions_committed_total() -> u64 {
    ACTIONS_COMMITTED_TOTAL.load(Ordering::Relaxed)
}

/// Successful rollbacks (undo).
#[must_use]
pub fn actions_rolled_back_total() -> u64 {
    ACTIONS_ROLLED_BACK_TOTAL.load(Ordering::Relaxed)
}

/// Successful re-commits (redo).
#[must_use]
pub fn actions_redone_total() -> u64 {
    ACTIONS_REDONE_TOTAL.load(Ordering::Relaxed)
}

/// Failed runs of any phase.
#[must_use]
pub fn actions_failed_total() -> u64 {
    ACTIONS_FAILED_TOTAL.load(Ordering::Relaxed)
}

/// Which half of an action is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionPhase {
    Commit,
    Rollback,
    Redo,
}

impl ActionPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Commit => "commit",
            Self::Rollback => "rollback",
            Self::Redo => "redo",
        }
    }

    fn counter(self) -> &'static AtomicU64 {
        match self {
            Self::Commit => &ACTIONS_COMMITTED_TOTAL,
            Self::Rollback => &ACTIONS_ROLLED_BACK_TOTAL,
            Self::Redo => &ACTIONS_REDONE_TOTAL,
        }
    }
}

// ---------------------------------------------------------------------------
// Action instrumentation
// ---------------------------------------------------------------------------

/// Run one phase of a tracked action inside a `history.action` span.
pub async fn trace_action<F>(label: &str, phase: ActionPhase, action: F) -> RemoteResult<()>
where
    F: Future<Output = RemoteResult<()>>,
{
    let span = tracing::debug_span!(
        "history.action",
        label = %label,
        phase = phase.as_str(),
        duration_us = tracing::field::Empty,
        result = tracing::field::Empty,
    );

    let start = Instant::now();
    let result = action.instrument(span.clone()).await;
    let duration_us = start.elapsed().as_micros() as u64;

    span.record("duration_us", duration_us);
    match &result {
        Ok(()) => {
            phase.counter().fetch_add(1, Ordering::Relaxed);
            span.record("result", "ok");
            tracing::debug!(
                target: "skillplan.history",
                label = %label,
                phase = phase.as_str(),
                duration_us,
                "action completed"
            );
        }
        Err(err) => {
            ACTIONS_FAILED_TOTAL.fetch_add(1, Ordering::Relaxed);
            span.record("result", "err");
            tracing::warn!(
                target: "skillplan.history",
                label = %label,
                phase = phase.as_str(),
                duration_us,
                error = %err,
                "action failed"
            );
        }
    }
    result
}
