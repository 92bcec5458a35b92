#![forbid(unsafe_code)]

//! Reversible action records.
//!
//! An [`ActionRecord`] is created only after its `commit` succeeded once.
//! From then on the history may call `rollback` (undo) and `commit` again
//! (redo) any number of times, so both halves are `Fn`, not `FnOnce`.
//!
//! # Invariants
//!
//! - `commit` followed by `rollback` restores the prior remote state.
//! - `rollback` followed by `commit` restores the committed remote state.
//! - Each call produces a fresh future; nothing is shared between runs
//!   except what the closures capture.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use skillplan_core::RemoteResult;
use web_time::Instant;

/// Boxed future returned by one half of an action.
pub type ActionFuture = Pin<Box<dyn Future<Output = RemoteResult<()>> + Send + 'static>>;

/// Shareable, re-runnable half of an action.
pub type ActionFn = Arc<dyn Fn() -> ActionFuture + Send + Sync + 'static>;

/// Wrap a closure that returns any `Send` future into an [`ActionFn`].
pub fn action_fn<F, Fut>(f: F) -> ActionFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = RemoteResult<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()) as ActionFuture)
}

/// A committed edit and the means to reverse and replay it.
pub struct ActionRecord {
    label: String,
    commit: ActionFn,
    rollback: ActionFn,
    created_at: Instant,
}

impl fmt::Debug for ActionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRecord")
            .field("label", &self.label)
            .field("age_ms", &self.created_at.elapsed().as_millis())
            .finish_non_exhaustive()
    }
}

impl ActionRecord {
    /// Build a record from two closures returning futures.
    pub fn new<C, CF, R, RF>(label: impl Into<String>, commit: C, rollback: R) -> Self
    where
        C: Fn() -> CF + Send + Sync + 'static,
        CF: Future<Output = RemoteResult<()>> + Send + 'static,
        R: Fn() -> RF + Send + Sync + 'static,
        RF: Future<Output = RemoteResult<()>> + Send + 'static,
    {
        Self::from_parts(label, action_fn(commit), action_fn(rollback))
    }

    /// Build a record from already-boxed halves.
    #[must_use]
    pub fn from_parts(label: impl Into<String>, commit: ActionFn, rollback: ActionFn) -> Self {
        Self {
            label: label.into(),
            commit,
            rollback,
            created_at: Instant::now(),
        }
    }

    /// Human-readable label for UI display ("Reorder plan", "Delete entry").
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Start a fresh run of the forward half.
    #[must_use]
    pub fn commit(&self) -> ActionFuture {
        (self.commit)()
    }

    /// Start a fresh run of the reverse half.
    #[must_use]
    pub fn rollback(&self) -> ActionFuture {
        (self.rollback)()
    }
}
