#![forbid(unsafe_code)]

//! Undo/redo history for asynchronous, remote-backed edits.
//!
//! Every edit the user makes is a round trip to the plan store. This module
//! records each edit only after its remote commit succeeded, together with a
//! rollback that reverses it remotely.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        ActionHistory                         │
//! │  ┌──────────────────┐          ┌──────────────────┐          │
//! │  │   Undo Stack     │ undo()   │   Redo Stack     │          │
//! │  │  ┌────────────┐  │ rollback │  ┌────────────┐  │          │
//! │  │  │ ActionN    │  │ ───────► │  │ Action1    │  │          │
//! │  │  ├────────────┤  │          │  ├────────────┤  │          │
//! │  │  │ Action1    │  │ ◄─────── │  │ ActionN    │  │          │
//! │  │  └────────────┘  │ redo()   │  └────────────┘  │          │
//! │  └──────────────────┘ commit   └──────────────────┘          │
//! │                  busy flag: one action at a time             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Structure
//!
//! - [`action`]: [`ActionRecord`], the label + commit + rollback triple
//! - [`history`]: [`ActionHistory`], the stacks and the busy flag
//!
//! # Design Notes
//!
//! Actions are closure pairs rather than one type per edit kind. Reorders,
//! adds, updates and deletes all reduce to "call the store, then apply the
//! returned snapshot", so the history never needs to inspect what it holds.

pub mod action;
pub mod history;

pub use action::{ActionFn, ActionFuture, ActionRecord};
pub use history::{ActionHistory, HistoryConfig, HistoryError};
