#![forbid(unsafe_code)]

//! Reference prerequisite validator.
//!
//! A small rule set good enough to drive badges in tests:
//!
//! | Rule | Severity |
//! |------|----------|
//! | lower level of the same skill ordered later | error ([`ValidationIssue::OrderingViolation`]) |
//! | lower level of the same skill not planned | warning ([`ValidationIssue::MissingPrerequisite`]) |
//! | required skill ordered later | error ([`ValidationIssue::OrderingViolation`]) |
//! | required skill not planned | warning ([`ValidationIssue::MissingPrerequisite`]) |
//! | skill on a requirement cycle | error ([`ValidationIssue::Cycle`]) |
//!
//! A missing prerequisite is only a warning because the character may
//! already have trained it outside the plan.

use std::collections::{HashMap, HashSet};

use skillplan_core::{Entry, SkillKey, ValidationIssue, ValidationResult};

/// Cross-skill requirements keyed by the dependent skill id.
#[derive(Debug, Clone, Default)]
pub struct PrerequisiteRules {
    requires: HashMap<u32, Vec<SkillKey>>,
}

impl PrerequisiteRules {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Training any level of `skill_id` requires `prerequisite` first.
    #[must_use]
    pub fn require(mut self, skill_id: u32, prerequisite: SkillKey) -> Self {
        self.requires.entry(skill_id).or_default().push(prerequisite);
        self
    }

    /// Validate `entries` in the given order.
    #[must_use]
    pub fn validate(&self, entries: &[Entry]) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let mut first_position: HashMap<SkillKey, usize> = HashMap::new();
        for (index, entry) in entries.iter().enumerate() {
            first_position.entry(entry.key()).or_insert(index);
        }
        // Earliest slot at which each skill reaches at least a given level.
        let reaches = |required: SkillKey| -> Option<usize> {
            first_position
                .iter()
                .filter(|(key, _)| key.skill_id == required.skill_id && key.level >= required.level)
                .map(|(_, index)| *index)
                .min()
        };

        for (index, entry) in entries.iter().enumerate() {
            let key = entry.key();

            if let Some(lower) = key.previous_level() {
                match first_position.get(&lower) {
                    Some(at) if *at > index => {
                        errors.push(ValidationIssue::OrderingViolation { entry: key, related: lower });
                    }
                    Some(_) => {}
                    None => {
                        warnings.push(ValidationIssue::MissingPrerequisite { entry: key, related: lower });
                    }
                }
            }

            for required in self.requires.get(&key.skill_id).into_iter().flatten() {
                match reaches(*required) {
                    Some(at) if at > index => errors.push(ValidationIssue::OrderingViolation {
                        entry: key,
                        related: *required,
                    }),
                    Some(_) => {}
                    None => warnings.push(ValidationIssue::MissingPrerequisite {
                        entry: key,
                        related: *required,
                    }),
                }
            }
        }

        let cyclic = self.cyclic_skills(entries);
        let mut flagged = HashSet::new();
        for entry in entries {
            if cyclic.contains(&entry.key().skill_id) && flagged.insert(entry.key()) {
                errors.push(ValidationIssue::Cycle { entry: entry.key() });
            }
        }

        ValidationResult::from_issues(errors, warnings)
    }

    /// Requirement edges from `skill` to other planned skills.
    fn edges<'a>(&'a self, skill: u32, planned: &'a HashSet<u32>) -> impl Iterator<Item = u32> + 'a {
        self.requires
            .get(&skill)
            .into_iter()
            .flatten()
            .map(|required| required.skill_id)
            .filter(move |next| planned.contains(next))
    }

    /// Planned skills that can reach themselves through requirements among
    /// planned skills.
    fn cyclic_skills(&self, entries: &[Entry]) -> HashSet<u32> {
        let planned: HashSet<u32> = entries.iter().map(|entry| entry.key().skill_id).collect();
        planned
            .iter()
            .copied()
            .filter(|start| {
                let mut seen = HashSet::new();
                let mut stack: Vec<u32> = self.edges(*start, &planned).collect();
                while let Some(skill) = stack.pop() {
                    if skill == *start {
                        return true;
                    }
                    if seen.insert(skill) {
                        stack.extend(self.edges(skill, &planned));
                    }
                }
                false
            })
            .collect()
    }
}
