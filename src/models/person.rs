//! Canonical person entity

use serde::Serialize;

use super::types::{Gender, PersonId, RowRef};

/// One individual across all register files
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Person {
    /// Canonical key
    pub id: PersonId,
    /// Raw status-register identifier the key was assigned from
    pub raw_id: String,
    /// Birth year; the first reported value wins
    pub birth_cohort: Option<i32>,
    /// Gender; the first reported non-unknown value wins
    pub gender: Gender,
    /// First status row that mentioned this person
    pub first_seen: RowRef,
}

impl Person {
    /// Age in whole years at `year`, if the cohort is known
    #[must_use]
    pub fn age_in(&self, year: i32) -> Option<i32> {
        self.birth_cohort.and_then(|cohort| year.checked_sub(cohort))
    }
}
