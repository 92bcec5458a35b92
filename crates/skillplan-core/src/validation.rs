#![forbid(unsafe_code)]

//! Validation results for a candidate plan order.
//!
//! The validator itself lives behind [`PlanStore::validate_order`]; this
//! module only defines the result shape and its projection onto per-key
//! badge states.
//!
//! # Precedence
//!
//! When the same [`SkillKey`] appears in both `errors` and `warnings`, the
//! projected status is [`IssueSeverity::Error`], independent of list order.
//!
//! [`PlanStore::validate_order`]: crate::remote::PlanStore::validate_order

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entry::SkillKey;

/// Badge state for one entry key. `Error` outranks `Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Warning,
    Error,
}

/// One domain-rule violation reported by the validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    /// The entry participates in a prerequisite cycle.
    Cycle { entry: SkillKey },
    /// `related` is required before `entry` but is not in the plan.
    MissingPrerequisite { entry: SkillKey, related: SkillKey },
    /// `related` is in the plan but ordered after `entry`.
    OrderingViolation { entry: SkillKey, related: SkillKey },
}

impl ValidationIssue {
    /// The offending entry's key.
    #[must_use]
    pub fn entry(&self) -> SkillKey {
        match self {
            Self::Cycle { entry }
            | Self::MissingPrerequisite { entry, .. }
            | Self::OrderingViolation { entry, .. } => *entry,
        }
    }

    /// The related entry's key, for relational variants.
    #[must_use]
    pub fn related(&self) -> Option<SkillKey> {
        match self {
            Self::Cycle { .. } => None,
            Self::MissingPrerequisite { related, .. } | Self::OrderingViolation { related, .. } => {
                Some(*related)
            }
        }
    }
}

/// Outcome of validating one order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    #[serde(default)]
    pub errors: Vec<ValidationIssue>,
    #[serde(default)]
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// A result with no issues.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Build a result; validity is derived from the error list.
    #[must_use]
    pub fn from_issues(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    #[must_use]
    pub fn issue_count(&self) -> usize {
        self.errors.len() + self.warnings.len()
    }

    /// Project onto `entry key -> severity`, errors winning over warnings.
    #[must_use]
    pub fn status_by_key(&self) -> HashMap<SkillKey, IssueSeverity> {
        let mut map = HashMap::with_capacity(self.issue_count());
        let tagged = self
            .warnings
            .iter()
            .map(|issue| (issue, IssueSeverity::Warning))
            .chain(self.errors.iter().map(|issue| (issue, IssueSeverity::Error)));
        for (issue, severity) in tagged {
            map.entry(issue.entry())
                .and_modify(|current: &mut IssueSeverity| *current = (*current).max(severity))
                .or_insert(severity);
        }
        map
    }

    /// Severity for a single key, if any issue names it.
    #[must_use]
    pub fn status_of(&self, key: SkillKey) -> Option<IssueSeverity> {
        if self.errors.iter().any(|issue| issue.entry() == key) {
            Some(IssueSeverity::Error)
        } else if self.warnings.iter().any(|issue| issue.entry() == key) {
            Some(IssueSeverity::Warning)
        } else {
            None
        }
    }
}
