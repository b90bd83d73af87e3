//! Status spells and annotated coverage gaps

use serde::Serialize;

use super::types::{PersonId, SpellId, Status};

/// How a spell came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpellOrigin {
    /// Built from status rows present in the register
    Observed,
    /// Synthesized by forward-filling a short gap
    Inserted,
    /// Synthesized with unknown status over a gap
    Imputed,
}

/// A continuous interval of constant status for one person
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Spell {
    /// Spell key
    pub id: SpellId,
    /// First covered year
    pub start_year: i32,
    /// Last covered year (inclusive)
    pub end_year: i32,
    /// Status during the spell
    pub status: Status,
    /// Age at `start_year`, if the cohort is known
    pub age_at_start: Option<i32>,
    /// Observed or synthesized
    pub origin: SpellOrigin,
}

impl Spell {
    /// Owner of the spell
    #[must_use]
    pub const fn person(&self) -> PersonId {
        self.id.person
    }

    /// Whether the spell covers `year`
    #[must_use]
    pub const fn covers(&self, year: i32) -> bool {
        self.start_year <= year && year <= self.end_year
    }

    /// Number of covered years
    #[must_use]
    pub const fn years(&self) -> u64 {
        (self.end_year as i64 - self.start_year as i64 + 1) as u64
    }

    /// Whether the spell was synthesized by gap repair
    #[must_use]
    pub const fn is_synthesized(&self) -> bool {
        !matches!(self.origin, SpellOrigin::Observed)
    }
}

/// Why a gap inside the observed span was left open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GapReason {
    /// The configured policy leaves gaps open
    PolicyLeaveGap,
}

/// A run of years inside a person's observed span with no coverage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnobservedGap {
    /// Owner of the gap
    pub person: PersonId,
    /// First uncovered year
    pub start_year: i32,
    /// Last uncovered year (inclusive)
    pub end_year: i32,
    /// Why the gap was not filled
    pub reason: GapReason,
}

impl UnobservedGap {
    /// Whether the gap contains `year`
    #[must_use]
    pub const fn contains(&self, year: i32) -> bool {
        self.start_year <= year && year <= self.end_year
    }
}
