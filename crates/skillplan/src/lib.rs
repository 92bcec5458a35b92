#![forbid(unsafe_code)]

//! SkillPlan public facade crate.
//!
//! This crate provides the stable surface area for editor front ends. It
//! re-exports common types from the internal crates and offers a prelude
//! for day-to-day usage.

use thiserror::Error;

// --- Core re-exports -------------------------------------------------------

pub use skillplan_core::{
    Entry, EntryId, EntryPatch, EntryPayload, IssueSeverity, OrderedCollection, PlanId,
    PlanSnapshot, PlanStore, RemoteError, RemoteResult, SkillKey, ValidationIssue,
    ValidationResult,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use skillplan_runtime::{
    ActionHistory, ActionRecord, ConfigError, DropOutcome, EditorConfig, HistoryError,
    Notification, NotificationCenter, NotificationLevel, PlanSession, ReconcileOutcome,
    TaggedValidation, ValidationSource,
};

// --- Errors ---------------------------------------------------------------

/// Top-level error type for SkillPlan hosts.
#[derive(Debug, Error)]
pub enum Error {
    /// A remote store call failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// A tracked edit, undo or redo failed.
    #[cfg(feature = "runtime")]
    #[error(transparent)]
    History(#[from] HistoryError),
    /// Configuration could not be loaded.
    #[cfg(feature = "runtime")]
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Standard result type for SkillPlan APIs.
pub type Result<T> = std::result::Result<T, Error>;

// --- Session bootstrap ----------------------------------------------------

/// Load a TOML config, initialize logging and open `plan`.
#[cfg(feature = "runtime")]
pub async fn open_with_config_file(
    store: std::sync::Arc<dyn PlanStore>,
    plan: PlanId,
    path: impl AsRef<std::path::Path>,
) -> Result<PlanSession> {
    let config = EditorConfig::load_validated_toml_file(path)?;
    skillplan_runtime::logging::init(&config.logging)?;
    Ok(PlanSession::open(store, plan, config).await?)
}

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        Entry, EntryId, EntryPatch, EntryPayload, Error, IssueSeverity, OrderedCollection, PlanId,
        PlanStore, Result, SkillKey,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{DropOutcome, EditorConfig, PlanSession, ReconcileOutcome};

    pub use crate::core;
    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use skillplan_core as core;
#[cfg(feature = "harness")]
pub use skillplan_harness as testing;
#[cfg(feature = "runtime")]
pub use skillplan_runtime as runtime;
