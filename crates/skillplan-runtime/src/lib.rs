#![forbid(unsafe_code)]

//! SkillPlan Runtime
//!
//! This crate provides the optimistic reorder and reversible-action layer
//! that sits between a plan editor UI and the remote plan store.
//!
//! # Key Components
//!
//! - [`DraftReorderController`] - Committed and draft order, drag lifecycle
//! - [`ValidationPreviewPipeline`] - Debounced validation of the live draft
//! - [`ActionHistory`] - Async undo/redo with a single busy flag
//! - [`MutationReconciler`] - Turns edits into tracked remote mutations
//! - [`PlanSession`] - UI-facing surface tying the above together
//! - [`EditorConfig`] - TOML/JSON configuration
//!
//! # Role in SkillPlan
//! `skillplan-runtime` is the orchestrator. It consumes drag input and edit
//! requests, renders nothing itself, and delegates every mutation to a
//! [`skillplan_core::PlanStore`].
//!
//! # How it fits in the system
//! The UI reads `draft_order()` and `validation_by_key()` from a session and
//! awaits its edit operations. The store is injected as `Arc<dyn PlanStore>`;
//! tests use the in-memory store from `skillplan-harness`.

pub mod config;
pub mod draft;
pub mod effect;
pub mod identity;
pub mod logging;
pub mod notification;
pub mod preview;
pub mod reconciler;
pub mod session;
pub mod undo;

pub use config::{ConfigError, EditorConfig, LoggingConfig};
pub use draft::{DraftReorderController, DropOutcome};
pub use identity::IdentityMap;
pub use notification::{
    Notification, NotificationCenter, NotificationConfig, NotificationId, NotificationLevel,
    NotificationStats,
};
pub use preview::{PreviewConfig, TaggedValidation, ValidationPreviewPipeline, ValidationSource};
pub use reconciler::{MutationReconciler, ReconcileOutcome, SharedPlanState};
pub use session::PlanSession;
pub use undo::{ActionFn, ActionFuture, ActionHistory, ActionRecord, HistoryConfig, HistoryError};
