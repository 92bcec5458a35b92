#![forbid(unsafe_code)]

//! Contract for the remote plan store.
//!
//! Every mutation the editor makes is authoritative only once the store has
//! acknowledged it. Implementations may sit behind HTTP, IPC or an in-memory
//! fake; the runtime only sequences calls and never assumes a transport.
//!
//! # Requirements on implementors
//!
//! - `reorder` must be idempotent when given the current order.
//! - `validate_order` must be read-only and safe to call speculatively.
//! - Timeouts are the implementor's concern; the runtime applies none.

use async_trait::async_trait;
use thiserror::Error;

use crate::collection::PlanSnapshot;
use crate::entry::{EntryId, EntryPatch, EntryPayload, PlanId};
use crate::validation::ValidationResult;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failure of a remote call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected by store: {0}")]
    Rejected(String),

    #[error("timed out after {millis}ms")]
    Timeout { millis: u64 },
}

impl RemoteError {
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Whether retrying the same call could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout { .. })
    }
}

/// Asynchronous request/response interface to the authoritative store.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// Fetch the current plan.
    async fn load_plan(&self, plan: PlanId) -> RemoteResult<PlanSnapshot>;

    /// Replace the plan order. `order` is a permutation of the current ids.
    async fn reorder(&self, plan: PlanId, order: &[EntryId]) -> RemoteResult<PlanSnapshot>;

    /// Validate an order without committing it.
    async fn validate_order(&self, plan: PlanId, order: &[EntryId])
    -> RemoteResult<ValidationResult>;

    /// Append a new entry. The store assigns its id.
    async fn add_entry(&self, plan: PlanId, payload: EntryPayload) -> RemoteResult<PlanSnapshot>;

    /// Apply a partial update to one entry.
    async fn update_entry(&self, entry: EntryId, patch: EntryPatch) -> RemoteResult<PlanSnapshot>;

    /// Remove one entry.
    async fn delete_entry(&self, entry: EntryId) -> RemoteResult<()>;
}
