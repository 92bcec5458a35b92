#![forbid(unsafe_code)]

//! Identity and payload types for plan entries.
//!
//! An [`Entry`] pairs an opaque [`EntryId`] assigned by the remote store with
//! the domain payload the user edits. Ids are unique within one plan; the
//! payload's [`SkillKey`] is what validation issues and badges are keyed by.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a plan (the collection being edited).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanId(pub u64);

impl PlanId {
    /// Create a plan id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plan#{}", self.0)
    }
}

/// Opaque identifier of one entry, assigned by the remote store.
///
/// A re-created entry may come back under a different id; callers that hold
/// ids across a delete/re-add must resolve them through an alias table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub u64);

impl EntryId {
    /// Create an entry id from a raw value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Domain key of an entry: which skill, trained to which level.
///
/// This is the "entry key" validation results are projected onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SkillKey {
    pub skill_id: u32,
    pub level: u8,
}

impl SkillKey {
    #[must_use]
    pub const fn new(skill_id: u32, level: u8) -> Self {
        Self { skill_id, level }
    }

    /// The key of the level directly below this one, if any.
    #[must_use]
    pub fn previous_level(self) -> Option<Self> {
        (self.level > 1).then(|| Self::new(self.skill_id, self.level - 1))
    }
}

impl fmt::Display for SkillKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.skill_id, self.level)
    }
}

/// User-editable content of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPayload {
    pub skill: SkillKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl EntryPayload {
    #[must_use]
    pub fn new(skill: SkillKey) -> Self {
        Self { skill, note: None }
    }

    #[must_use]
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &EntryPatch) {
        if let Some(level) = patch.level {
            self.skill.level = level;
        }
        if let Some(note) = &patch.note {
            self.note.clone_from(note);
        }
    }

    /// Return a copy with `patch` applied.
    #[must_use]
    pub fn patched(&self, patch: &EntryPatch) -> Self {
        let mut next = self.clone();
        next.apply(patch);
        next
    }
}

/// An identity-bearing element of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub payload: EntryPayload,
}

impl Entry {
    #[must_use]
    pub fn new(id: EntryId, payload: EntryPayload) -> Self {
        Self { id, payload }
    }

    #[must_use]
    pub fn key(&self) -> SkillKey {
        self.payload.skill
    }
}

/// Partial update of an entry's payload.
///
/// `None` leaves a field untouched. `note: Some(None)` clears the note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<Option<String>>,
}

impl EntryPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn level(mut self, level: u8) -> Self {
        self.level = Some(level);
        self
    }

    #[must_use]
    pub fn note(mut self, note: Option<String>) -> Self {
        self.note = Some(note);
        self
    }

    /// True when the patch touches no field.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.level.is_none() && self.note.is_none()
    }

    /// Capture the prior values of exactly the fields this patch touches.
    ///
    /// Applying `self` and then the returned patch to `current` yields
    /// `current` again.
    #[must_use]
    pub fn inverse_for(&self, current: &EntryPayload) -> Self {
        Self {
            level: self.level.map(|_| current.skill.level),
            note: self.note.as_ref().map(|_| current.note.clone()),
        }
    }
}
