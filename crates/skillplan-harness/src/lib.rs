#![forbid(unsafe_code)]

//! Test harness for SkillPlan.
//!
//! - [`InMemoryPlanStore`] - authoritative store with a call log, per-op
//!   fault injection and artificial latency
//! - [`PrerequisiteRules`] - reference validator behind `validate_order`
//!
//! Not meant for production use; integration tests of `skillplan-runtime`
//! drive a real `PlanSession` against this store.

pub mod store;
pub mod validator;

pub use store::{InMemoryPlanStore, RemoteCall, RemoteOp};
pub use validator::PrerequisiteRules;
