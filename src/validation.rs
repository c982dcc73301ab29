// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Validation aggregation
//!
//! Categories are independent: a pass replaces only the categories it
//! re-evaluated and leaves every other recorded judgment in place.

use crate::types::{Validation, ValidationCategory};
use std::collections::BTreeMap;

/// Merge freshly computed validations over the recorded ones
#[must_use]
pub fn aggregate(existing: Vec<Validation>, new: Vec<Validation>) -> Vec<Validation> {
    let mut by_category: BTreeMap<ValidationCategory, Validation> = BTreeMap::new();
    for validation in existing.into_iter().chain(new) {
        by_category.insert(validation.category, validation);
    }
    by_category.into_values().collect()
}

/// Collects validations produced while processing one version
#[derive(Debug, Default)]
pub struct ValidationSet {
    entries: BTreeMap<ValidationCategory, Validation>,
}

impl ValidationSet {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pass for `category` unless a failure is already recorded
    pub fn pass(&mut self, category: ValidationCategory) {
        self.entries
            .entry(category)
            .or_insert_with(|| Validation::valid(category));
    }

    /// Record a failure; messages for the same category are joined
    pub fn fail(&mut self, category: ValidationCategory, message: impl Into<String>) {
        let message = message.into();
        match self.entries.get_mut(&category) {
            Some(existing) if !existing.is_valid => {
                existing.message.push_str("; ");
                existing.message.push_str(&message);
            }
            _ => {
                self.entries
                    .insert(category, Validation::invalid(category, message));
            }
        }
    }

    /// Consume into a list ordered by category
    #[must_use]
    pub fn into_vec(self) -> Vec<Validation> {
        self.entries.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DescriptorLanguage;

    #[test]
    fn test_replaces_same_category() {
        let existing = vec![Validation::invalid(ValidationCategory::Manifest, "bad")];
        let new = vec![Validation::valid(ValidationCategory::Manifest)];
        let merged = aggregate(existing, new);
        assert_eq!(merged, vec![Validation::valid(ValidationCategory::Manifest)]);
    }

    #[test]
    fn test_keeps_untouched_categories() {
        let existing = vec![
            Validation::invalid(ValidationCategory::TestParameterFile, "missing /t.json"),
            Validation::valid(ValidationCategory::Manifest),
        ];
        let new = vec![Validation::invalid(
            ValidationCategory::Descriptor(DescriptorLanguage::Wdl),
            "unbalanced braces",
        )];
        let merged = aggregate(existing, new);
        assert_eq!(merged.len(), 3);
        assert!(merged
            .iter()
            .any(|v| v.category == ValidationCategory::TestParameterFile && !v.is_valid));
    }

    #[test]
    fn test_set_failure_wins_over_pass() {
        let mut set = ValidationSet::new();
        set.fail(ValidationCategory::Imports, "a.wdl not found");
        set.pass(ValidationCategory::Imports);
        set.fail(ValidationCategory::Imports, "b.wdl not found");
        let list = set.into_vec();
        assert_eq!(list.len(), 1);
        assert!(!list[0].is_valid);
        assert_eq!(list[0].message, "a.wdl not found; b.wdl not found");
    }
}
