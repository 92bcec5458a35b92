#![forbid(unsafe_code)]

//! Core: plan entries, ordered collections, validation results, and the
//! remote store contract.
//!
//! # Role in SkillPlan
//! `skillplan-core` is the data layer. It owns the identity types, the
//! ordered collection used for the committed / draft / proposed views of a
//! plan, the validation result shape, and the [`PlanStore`] trait every
//! remote backend implements.
//!
//! # How it fits in the system
//! The runtime (`skillplan-runtime`) sequences calls against a `PlanStore`
//! and reconciles the three order views. Nothing in this crate performs I/O
//! or depends on an async executor.

pub mod collection;
pub mod entry;
pub mod remote;
pub mod validation;

pub use collection::{OrderedCollection, PlanSnapshot};
pub use entry::{Entry, EntryId, EntryPatch, EntryPayload, PlanId, SkillKey};
pub use remote::{PlanStore, RemoteError, RemoteResult};
pub use validation::{IssueSeverity, ValidationIssue, ValidationResult};
